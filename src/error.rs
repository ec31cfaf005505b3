use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// 解析パイプラインおよび周辺エンドポイントのエラー分類。
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("No issues provided")]
    NoIssues,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Missing OPENAI_API_KEY")]
    MissingCredential,

    /// 上流サービスの非成功ステータス。受け取ったステータスをそのまま呼び出し元へ返す。
    #[error("{service} {}", .status.as_u16())]
    Upstream {
        service: &'static str,
        status: StatusCode,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    pub(crate) error: String,
}

impl ErrorBody {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

impl AnalyzeError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NoIssues | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::MissingCredential | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream { status, .. } => *status,
        }
    }

    fn message(&self) -> String {
        match self {
            // The anyhow chain carries context only; no backtrace is rendered.
            Self::Internal(source) => {
                let rendered = format!("{source:#}");
                if rendered.is_empty() {
                    "Server error".to_string()
                } else {
                    rendered
                }
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AnalyzeError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, error = %self.message(), "request failed");
        }
        (status, Json(ErrorBody::new(self.message()))).into_response()
    }
}
