use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::clients::openai::{ChatCompletionRequest, ChatMessage, CompletionClient};

use super::{AnalysisSettings, classify::SAMPLING_TEMPERATURE, types::Aggregate};

pub(crate) const ROLLUP_SYSTEM_PROMPT: &str = "You produce concise executive insights.";

pub(crate) const ROLLUP_INSTRUCTIONS: &str = "Summarize patterns across items:
- Top 3 categories with % share
- 2–3 root causes
- 2 measurable actions
- 2–3 sentence exec summary
<= 180 tokens. Crisp, no fluff.";

pub(crate) const ROLLUP_MAX_TOKENS: u32 = 180;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollupOutcome {
    pub summary: String,
    pub failed: bool,
}

impl RollupOutcome {
    fn degraded() -> Self {
        Self {
            summary: String::new(),
            failed: true,
        }
    }
}

/// 集計結果から短い要約を作るステージ。
///
/// ベストエフォート。失敗しても呼び出し元へエラーは返さず、空の要約に落とす。
#[async_trait]
pub trait RollupStage: Send + Sync {
    async fn summarize(&self, aggregate: &Aggregate) -> RollupOutcome;
}

/// # Errors
/// 集計値のシリアライズに失敗した場合はエラーを返す。
pub fn build_rollup_prompt(aggregate: &Aggregate) -> Result<String, serde_json::Error> {
    let serialized = serde_json::to_string(aggregate)?;
    Ok(format!("Aggregates: {serialized}\n\n{ROLLUP_INSTRUCTIONS}"))
}

#[derive(Clone)]
pub(crate) struct LlmRollupStage {
    client: Arc<dyn CompletionClient>,
    model: String,
}

impl LlmRollupStage {
    pub(crate) fn new(client: Arc<dyn CompletionClient>, settings: &AnalysisSettings) -> Self {
        Self {
            client,
            model: settings.model.clone(),
        }
    }
}

#[async_trait]
impl RollupStage for LlmRollupStage {
    async fn summarize(&self, aggregate: &Aggregate) -> RollupOutcome {
        let prompt = match build_rollup_prompt(aggregate) {
            Ok(prompt) => prompt,
            Err(error) => {
                warn!(%error, "failed to serialize aggregate for roll-up");
                return RollupOutcome::degraded();
            }
        };

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(ROLLUP_SYSTEM_PROMPT),
                ChatMessage::user(prompt),
            ],
            max_tokens: ROLLUP_MAX_TOKENS,
            temperature: SAMPLING_TEMPERATURE,
        };

        match self.client.complete(&request).await {
            Ok(summary) => RollupOutcome {
                summary,
                failed: false,
            },
            Err(error) => {
                warn!(error = %format!("{error:#}"), "roll-up summarization failed; returning empty summary");
                RollupOutcome::degraded()
            }
        }
    }
}
