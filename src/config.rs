use std::{env, net::SocketAddr, num::NonZeroUsize};

use thiserror::Error;

const DEFAULT_HTTP_BIND: &str = "0.0.0.0:9010";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1/";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 120;
const DEFAULT_MAX_BATCHES: usize = 4;
const DEFAULT_GITHUB_API_BASE_URL: &str = "https://api.github.com/";
const DEFAULT_REQUEST_BODY_LIMIT_BYTES: usize = 20_000_000;

/// プロセス起動時に一度だけ構築される設定値。
///
/// 各コンポーネントは環境変数を直接読まず、この値を引数として受け取る。
#[derive(Clone, PartialEq)]
pub struct Config {
    http_bind: SocketAddr,
    openai_api_key: Option<String>,
    openai_base_url: String,
    llm_model: String,
    max_output_tokens: u32,
    max_batches: NonZeroUsize,
    github_api_base_url: String,
    github_token: Option<String>,
    slack_webhook_url: Option<String>,
    request_body_limit: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_bind: SocketAddr::from(([0, 0, 0, 0], 9010)),
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            max_batches: NonZeroUsize::new(DEFAULT_MAX_BATCHES).unwrap_or(NonZeroUsize::MIN),
            github_api_base_url: DEFAULT_GITHUB_API_BASE_URL.to_string(),
            github_token: None,
            slack_webhook_url: None,
            request_body_limit: DEFAULT_REQUEST_BODY_LIMIT_BYTES,
        }
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("http_bind", &self.http_bind)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "***"))
            .field("openai_base_url", &self.openai_base_url)
            .field("llm_model", &self.llm_model)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("max_batches", &self.max_batches)
            .field("github_api_base_url", &self.github_api_base_url)
            .field("github_token", &self.github_token.as_ref().map(|_| "***"))
            .field("slack_webhook_url", &self.slack_webhook_url.as_ref().map(|_| "***"))
            .field("request_body_limit", &self.request_body_limit)
            .finish()
    }
}

impl Config {
    /// 環境変数から設定値を読み込み、検証する。
    ///
    /// 認証情報 `OPENAI_API_KEY` は起動時には必須ではない。未設定の場合は
    /// 解析リクエストごとに設定エラーとして報告される。
    ///
    /// # Errors
    /// 数値やアドレスのパースに失敗した場合は [`ConfigError`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_bind = parse_socket_addr("SUPPORT_SIGNAL_HTTP_BIND", DEFAULT_HTTP_BIND)?;
        let openai_api_key = optional_env("OPENAI_API_KEY");
        let openai_base_url = optional_env("OPENAI_BASE_URL")
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
        let llm_model =
            optional_env("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string());

        // Per-invocation budgets
        let max_output_tokens = parse_positive_u32("MAX_OUTPUT_TOKENS", DEFAULT_MAX_OUTPUT_TOKENS)?;
        let max_batches = parse_non_zero_usize("MAX_BATCHES", DEFAULT_MAX_BATCHES)?;

        // Collaborators
        let github_api_base_url = optional_env("GITHUB_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_GITHUB_API_BASE_URL.to_string());
        let github_token = optional_env("GITHUB_TOKEN");
        let slack_webhook_url = optional_env("SLACK_WEBHOOK_URL");

        let request_body_limit =
            parse_usize("REQUEST_BODY_LIMIT_BYTES", DEFAULT_REQUEST_BODY_LIMIT_BYTES)?;

        Ok(Self {
            http_bind,
            openai_api_key,
            openai_base_url,
            llm_model,
            max_output_tokens,
            max_batches,
            github_api_base_url,
            github_token,
            slack_webhook_url,
            request_body_limit,
        })
    }

    #[must_use]
    pub fn http_bind(&self) -> SocketAddr {
        self.http_bind
    }

    #[must_use]
    pub fn openai_api_key(&self) -> Option<&str> {
        self.openai_api_key.as_deref()
    }

    #[must_use]
    pub fn openai_base_url(&self) -> &str {
        &self.openai_base_url
    }

    #[must_use]
    pub fn llm_model(&self) -> &str {
        &self.llm_model
    }

    #[must_use]
    pub fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }

    #[must_use]
    pub fn max_batches(&self) -> NonZeroUsize {
        self.max_batches
    }

    #[must_use]
    pub fn github_api_base_url(&self) -> &str {
        &self.github_api_base_url
    }

    #[must_use]
    pub fn github_token(&self) -> Option<&str> {
        self.github_token.as_deref()
    }

    #[must_use]
    pub fn slack_webhook_url(&self) -> Option<&str> {
        self.slack_webhook_url.as_deref()
    }

    #[must_use]
    pub fn request_body_limit(&self) -> usize {
        self.request_body_limit
    }

    #[must_use]
    pub fn with_openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.openai_api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn without_openai_api_key(mut self) -> Self {
        self.openai_api_key = None;
        self
    }

    #[must_use]
    pub fn with_openai_base_url(mut self, url: impl Into<String>) -> Self {
        self.openai_base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_llm_model(mut self, model: impl Into<String>) -> Self {
        self.llm_model = model.into();
        self
    }

    #[must_use]
    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    #[must_use]
    pub fn with_max_batches(mut self, max_batches: NonZeroUsize) -> Self {
        self.max_batches = max_batches;
        self
    }

    #[must_use]
    pub fn with_github_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.github_api_base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_slack_webhook_url(mut self, url: impl Into<String>) -> Self {
        self.slack_webhook_url = Some(url.into());
        self
    }
}

/// 空文字列は未設定として扱う。
fn optional_env(name: &'static str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_socket_addr(name: &'static str, default: &str) -> Result<SocketAddr, ConfigError> {
    let raw = optional_env(name).unwrap_or_else(|| default.to_string());
    raw.parse::<SocketAddr>()
        .map_err(|error| ConfigError::Invalid {
            name,
            source: anyhow::Error::new(error),
        })
}

fn parse_usize(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    let raw = optional_env(name).unwrap_or_else(|| default.to_string());
    raw.parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_non_zero_usize(name: &'static str, default: usize) -> Result<NonZeroUsize, ConfigError> {
    let value = parse_usize(name, default)?;
    NonZeroUsize::new(value).ok_or_else(|| ConfigError::Invalid {
        name,
        source: anyhow::anyhow!("value must be greater than zero"),
    })
}

fn parse_positive_u32(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    let raw = optional_env(name).unwrap_or_else(|| default.to_string());
    let parsed = raw.parse::<u32>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })?;
    if parsed == 0 {
        return Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("value must be greater than zero"),
        });
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_VARS: [&str; 10] = [
        "SUPPORT_SIGNAL_HTTP_BIND",
        "OPENAI_API_KEY",
        "OPENAI_BASE_URL",
        "LLM_MODEL",
        "MAX_OUTPUT_TOKENS",
        "MAX_BATCHES",
        "GITHUB_API_BASE_URL",
        "GITHUB_TOKEN",
        "SLACK_WEBHOOK_URL",
        "REQUEST_BODY_LIMIT_BYTES",
    ];

    fn cleared_with<'a>(overrides: &[(&'a str, &'a str)]) -> Vec<(&'a str, Option<&'a str>)> {
        ALL_VARS
            .iter()
            .map(|name| {
                let value = overrides
                    .iter()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| *value);
                (*name, value)
            })
            .collect()
    }

    #[test]
    fn from_env_uses_defaults_when_optional_missing() {
        temp_env::with_vars(cleared_with(&[]), || {
            let config = Config::from_env().expect("config should load");

            assert_eq!(config.http_bind(), "0.0.0.0:9010".parse().unwrap());
            assert!(config.openai_api_key().is_none());
            assert_eq!(config.openai_base_url(), "https://api.openai.com/v1/");
            assert_eq!(config.llm_model(), "gpt-4o-mini");
            assert_eq!(config.max_output_tokens(), 120);
            assert_eq!(config.max_batches().get(), 4);
            assert_eq!(config.github_api_base_url(), "https://api.github.com/");
            assert!(config.github_token().is_none());
            assert!(config.slack_webhook_url().is_none());
            assert_eq!(config.request_body_limit(), 20_000_000);
            assert_eq!(config, Config::default());
        });
    }

    #[test]
    fn from_env_overrides_values() {
        temp_env::with_vars(
            cleared_with(&[
                ("SUPPORT_SIGNAL_HTTP_BIND", "127.0.0.1:8088"),
                ("OPENAI_API_KEY", "sk-test"),
                ("OPENAI_BASE_URL", "http://localhost:7000/v1/"),
                ("LLM_MODEL", "gpt-4o"),
                ("MAX_OUTPUT_TOKENS", "300"),
                ("MAX_BATCHES", "2"),
                ("SLACK_WEBHOOK_URL", "https://hooks.example.com/T000"),
            ]),
            || {
                let config = Config::from_env().expect("config should load");

                assert_eq!(config.http_bind(), "127.0.0.1:8088".parse().unwrap());
                assert_eq!(config.openai_api_key(), Some("sk-test"));
                assert_eq!(config.openai_base_url(), "http://localhost:7000/v1/");
                assert_eq!(config.llm_model(), "gpt-4o");
                assert_eq!(config.max_output_tokens(), 300);
                assert_eq!(config.max_batches().get(), 2);
                assert_eq!(
                    config.slack_webhook_url(),
                    Some("https://hooks.example.com/T000")
                );
            },
        );
    }

    #[test]
    fn empty_values_are_treated_as_unset() {
        temp_env::with_vars(
            cleared_with(&[("OPENAI_API_KEY", ""), ("LLM_MODEL", "  ")]),
            || {
                let config = Config::from_env().expect("config should load");
                assert!(config.openai_api_key().is_none());
                assert_eq!(config.llm_model(), "gpt-4o-mini");
            },
        );
    }

    #[test]
    fn from_env_rejects_zero_batch_cap() {
        temp_env::with_vars(cleared_with(&[("MAX_BATCHES", "0")]), || {
            let error = Config::from_env().expect_err("zero cap should fail");
            assert!(matches!(
                error,
                ConfigError::Invalid {
                    name: "MAX_BATCHES",
                    ..
                }
            ));
        });
    }

    #[test]
    fn from_env_rejects_non_numeric_token_budget() {
        temp_env::with_vars(cleared_with(&[("MAX_OUTPUT_TOKENS", "lots")]), || {
            let error = Config::from_env().expect_err("garbage budget should fail");
            assert!(error.to_string().contains("MAX_OUTPUT_TOKENS"));
        });
    }

    #[test]
    fn debug_output_masks_secrets() {
        let config = Config::default().with_openai_api_key("sk-very-secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("***"));
    }
}
