use std::num::NonZeroUsize;

use crate::{config::Config, error::AnalyzeError};

pub mod aggregate;
pub mod batch;
pub mod classify;
pub(crate) mod orchestrator;
pub mod parse;
pub mod redact;
pub mod rollup;
pub mod types;

pub use orchestrator::PipelineOrchestrator;

/// 1 回の解析で使うパラメータ。オーケストレーターが設定から解決し、各ステージへ明示的に渡す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisSettings {
    pub model: String,
    pub max_output_tokens: u32,
    pub max_batches: NonZeroUsize,
    pub batch_size: NonZeroUsize,
}

impl AnalysisSettings {
    /// # Errors
    /// 補完サービスの認証情報が未設定の場合は [`AnalyzeError::MissingCredential`] を返す。
    pub fn resolve(config: &Config) -> Result<Self, AnalyzeError> {
        if config.openai_api_key().is_none() {
            return Err(AnalyzeError::MissingCredential);
        }

        Ok(Self {
            model: config.llm_model().to_string(),
            max_output_tokens: config.max_output_tokens(),
            max_batches: config.max_batches(),
            batch_size: batch::BATCH_SIZE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_requires_credential() {
        let error = AnalysisSettings::resolve(&Config::default()).expect_err("no key");
        assert!(matches!(error, AnalyzeError::MissingCredential));
    }

    #[test]
    fn resolve_carries_configured_budgets() {
        let config = Config::default()
            .with_openai_api_key("sk-test")
            .with_llm_model("gpt-4o")
            .with_max_output_tokens(64)
            .with_max_batches(NonZeroUsize::new(2).expect("non-zero"));

        let settings = AnalysisSettings::resolve(&config).expect("settings resolve");

        assert_eq!(settings.model, "gpt-4o");
        assert_eq!(settings.max_output_tokens, 64);
        assert_eq!(settings.max_batches.get(), 2);
        assert_eq!(settings.batch_size.get(), 30);
    }
}
