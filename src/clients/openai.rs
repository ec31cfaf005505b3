use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::util::text::truncate_error_message;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// チャット補完リクエスト。分類と要約の 2 種類がこの形を共有する。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionResponse {
    fn into_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default()
    }
}

#[derive(Debug, Error)]
pub enum CompletionError {
    /// 補完サービスが非成功ステータスを返した。
    #[error("completion service returned error status {0}")]
    Status(StatusCode),

    /// 送信・受信・デコードのいずれかに失敗した。
    #[error(transparent)]
    Request(#[from] anyhow::Error),
}

/// テキスト補完サービスへの 1 回の同期呼び出し。リトライはしない。
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &ChatCompletionRequest) -> Result<String, CompletionError>;
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl OpenAiClient {
    /// # Errors
    /// ベース URL が不正、または HTTP クライアントの構築に失敗した場合はエラーを返す。
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> anyhow::Result<Self> {
        // No explicit timeout: the transport default applies.
        let client = Client::builder()
            .build()
            .context("failed to build completion client")?;

        let base_url = Url::parse(&base_url.into()).context("invalid completion base URL")?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &ChatCompletionRequest) -> Result<String, CompletionError> {
        let url = self
            .base_url
            .join("chat/completions")
            .context("failed to build chat completions URL")?;

        let mut builder = self.client.post(url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .context("completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(
                %status,
                body = %truncate_error_message(&body),
                "completion service returned error status"
            );
            return Err(CompletionError::Status(status));
        }

        let payload = response
            .json::<ChatCompletionResponse>()
            .await
            .context("failed to deserialize completion response")?;

        Ok(payload.into_text())
    }
}
