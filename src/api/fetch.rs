use axum::{Json, body::Bytes, extract::State};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    app::AppState, clients::github::GithubIssue, error::AnalyzeError,
    pipeline::redact::MAX_BODY_CHARS, util::text::truncate_chars,
};

use super::decode_body;

pub(crate) const MAX_TITLE_CHARS: usize = 200;

#[derive(Debug, Default, Deserialize)]
struct FetchRequest {
    #[serde(default)]
    repo: Option<String>,
    #[serde(default)]
    since: Option<String>,
    #[serde(default)]
    until: Option<String>,
}

/// 解析パイプラインへそのまま渡せる形に整えた Issue。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct FetchedIssue {
    id: u64,
    number: u64,
    title: String,
    body: String,
    url: String,
    created_at: DateTime<Utc>,
}

impl From<GithubIssue> for FetchedIssue {
    fn from(issue: GithubIssue) -> Self {
        Self {
            id: issue.id,
            number: issue.number,
            title: truncate_chars(issue.title.as_deref().unwrap_or_default(), MAX_TITLE_CHARS),
            body: truncate_chars(issue.body.as_deref().unwrap_or_default(), MAX_BODY_CHARS),
            url: issue.html_url,
            created_at: issue.created_at,
        }
    }
}

/// RFC 3339 のタイムスタンプ、または `YYYY-MM-DD`（UTC の 0 時）を受け付ける。
fn parse_bound(name: &str, value: &str) -> Result<DateTime<Utc>, AnalyzeError> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| {
            AnalyzeError::InvalidRequest(format!(
                "Invalid {name}: expected an RFC 3339 timestamp or YYYY-MM-DD"
            ))
        })
}

fn optional_bound(name: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>, AnalyzeError> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => parse_bound(name, value).map(Some),
        None => Ok(None),
    }
}

/// プルリクエストと `until` より後に作成されたものを除外する。
fn select_issues(items: Vec<GithubIssue>, until: Option<DateTime<Utc>>) -> Vec<FetchedIssue> {
    items
        .into_iter()
        .filter(|issue| !issue.is_pull_request())
        .filter(|issue| until.is_none_or(|until| issue.created_at <= until))
        .map(FetchedIssue::from)
        .collect()
}

pub(crate) async fn fetch_issues(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Vec<FetchedIssue>>, AnalyzeError> {
    let request = decode_body::<FetchRequest>(&body)?;

    let repo = request.repo.as_deref().map(str::trim).unwrap_or_default();
    if repo.is_empty() || !repo.contains('/') {
        return Err(AnalyzeError::InvalidRequest(
            "Provide repo as owner/repo".to_string(),
        ));
    }
    let since = optional_bound("since", request.since.as_deref())?;
    let until = optional_bound("until", request.until.as_deref())?;

    let items = state.github_client().fetch_open_issues(repo, since).await?;
    let fetched = items.len();
    let issues = select_issues(items, until);
    info!(repo, fetched, returned = issues.len(), "fetched issues for analysis");

    Ok(Json(issues))
}
