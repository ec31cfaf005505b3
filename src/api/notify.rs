use std::collections::BTreeMap;

use axum::{Json, body::Bytes, extract::State};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    app::AppState, clients::slack::format_message, error::AnalyzeError,
    pipeline::types::SentimentTally,
};

use super::decode_body;

pub(crate) const SKIPPED_NOTE: &str = "No SLACK_WEBHOOK_URL configured; skipping.";

/// 解析結果をそのまま受け取れる形。どのフィールドも省略可能。
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotifyRequest {
    #[serde(default)]
    counts: Option<BTreeMap<String, u64>>,
    #[serde(default)]
    sentiments: Option<SentimentTally>,
    #[serde(default)]
    exec_summary: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NotifyResponse {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'static str>,
}

pub(crate) async fn notify(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<NotifyResponse>, AnalyzeError> {
    let request = decode_body::<NotifyRequest>(&body)?;

    let Some(notifier) = state.notifier() else {
        info!("notification skipped because no webhook is configured");
        return Ok(Json(NotifyResponse {
            ok: true,
            note: Some(SKIPPED_NOTE),
        }));
    };

    let text = format_message(
        &request.counts.unwrap_or_default(),
        &request.sentiments.unwrap_or_default(),
        request.exec_summary.as_deref().unwrap_or_default(),
    );
    notifier.post(&text).await?;
    info!("notification posted");

    Ok(Json(NotifyResponse {
        ok: true,
        note: None,
    }))
}
