use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    clients::openai::{ChatCompletionRequest, ChatMessage, CompletionClient, CompletionError},
    error::AnalyzeError,
};

use super::{AnalysisSettings, batch::Batch};

pub(crate) const CLASSIFY_SYSTEM_PROMPT: &str = "Return compact JSONL only.";

pub(crate) const CLASSIFY_INSTRUCTIONS: &str = r#"You are a support analyst. For each item, output JSONL with:
{"category":"Login/Access|Billing|Performance/Outage|Bugs|UX/Usability|Feature Request|Other",
 "sentiment":"Negative|Neutral|Positive",
 "rootCause":"<=8 words",
 "action":"<=10 words"}
Return strictly valid JSONL. Keep fields terse."#;

/// 分類・要約ともに固定の低温度を使う。
pub(crate) const SAMPLING_TEMPERATURE: f32 = 0.2;

/// 1 バッチ分の分類を行うステージ。
///
/// 失敗は致命的で、呼び出し元はパイプライン全体を中断する。部分結果へのフォールバックはない。
#[async_trait]
pub trait ClassifyStage: Send + Sync {
    async fn classify(&self, batch: &Batch) -> Result<String, AnalyzeError>;
}

/// `Issues:` の見出しに続けて番号付きの `title` と `body` を並べ、最後に指示ブロックを置く。
#[must_use]
pub fn build_classify_prompt(batch: &Batch) -> String {
    let items = batch
        .issues()
        .iter()
        .enumerate()
        .map(|(i, issue)| format!("{}. {}\n{}", i + 1, issue.title(), issue.body()))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("Issues:\n{items}\n\n{CLASSIFY_INSTRUCTIONS}")
}

#[derive(Clone)]
pub(crate) struct LlmClassifyStage {
    client: Arc<dyn CompletionClient>,
    model: String,
    max_output_tokens: u32,
}

impl LlmClassifyStage {
    pub(crate) fn new(client: Arc<dyn CompletionClient>, settings: &AnalysisSettings) -> Self {
        Self {
            client,
            model: settings.model.clone(),
            max_output_tokens: settings.max_output_tokens,
        }
    }

    pub(crate) fn build_request(&self, batch: &Batch) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(CLASSIFY_SYSTEM_PROMPT),
                ChatMessage::user(build_classify_prompt(batch)),
            ],
            max_tokens: self.max_output_tokens,
            temperature: SAMPLING_TEMPERATURE,
        }
    }
}

#[async_trait]
impl ClassifyStage for LlmClassifyStage {
    async fn classify(&self, batch: &Batch) -> Result<String, AnalyzeError> {
        let request = self.build_request(batch);
        match self.client.complete(&request).await {
            Ok(text) => Ok(text),
            Err(CompletionError::Status(status)) => Err(AnalyzeError::Upstream {
                service: "OpenAI",
                status,
            }),
            Err(CompletionError::Request(source)) => Err(AnalyzeError::Internal(source)),
        }
    }
}
