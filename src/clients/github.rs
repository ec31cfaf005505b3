//! GitHub Issues API から open な Issue を取得するクライアント。
use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, StatusCode, Url, header::ACCEPT};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::{error::AnalyzeError, util::text::truncate_error_message};

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const USER_AGENT: &str = concat!("support-signal/", env!("CARGO_PKG_VERSION"));
pub(crate) const PER_PAGE: &str = "50";

/// GitHub が返す Issue の必要なフィールドだけを受け取る。
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GithubIssue {
    pub id: u64,
    pub number: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    /// プルリクエストの場合だけ存在する。中身は使わない。
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

impl GithubIssue {
    #[must_use]
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("issue tracker returned error status {0}")]
    Status(StatusCode),

    #[error(transparent)]
    Request(#[from] anyhow::Error),
}

impl From<TrackerError> for AnalyzeError {
    fn from(error: TrackerError) -> Self {
        match error {
            TrackerError::Status(status) => AnalyzeError::Upstream {
                service: "GitHub",
                status,
            },
            TrackerError::Request(source) => AnalyzeError::Internal(source),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GithubClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl GithubClient {
    /// # Errors
    /// ベース URL が不正、または HTTP クライアントの構築に失敗した場合はエラーを返す。
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build GitHub HTTP client")?;

        let base_url = Url::parse(&base_url.into()).context("invalid GitHub base URL")?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// `repo`（`owner/repo` 形式）の open な Issue を 1 ページ分取得する。
    ///
    /// プルリクエストも含めてそのまま返す。絞り込みは呼び出し側で行う。
    ///
    /// # Errors
    /// 非成功ステータスは [`TrackerError::Status`]、通信やデコードの失敗は
    /// [`TrackerError::Request`] を返す。
    pub async fn fetch_open_issues(
        &self,
        repo: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<GithubIssue>, TrackerError> {
        let mut url = self
            .base_url
            .join(&format!("repos/{repo}/issues"))
            .context("failed to build issues URL")?;

        {
            let mut query_pairs = url.query_pairs_mut();
            query_pairs.append_pair("state", "open");
            query_pairs.append_pair("per_page", PER_PAGE);
            if let Some(since) = since {
                query_pairs.append_pair(
                    "since",
                    &since.to_rfc3339_opts(SecondsFormat::Millis, true),
                );
            }
        }

        let mut builder = self.client.get(url).header(ACCEPT, GITHUB_ACCEPT);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .context("GitHub issues request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(
                %status,
                repo,
                body = %truncate_error_message(&body),
                "GitHub returned error status"
            );
            return Err(TrackerError::Status(status));
        }

        let issues = response
            .json::<Vec<GithubIssue>>()
            .await
            .context("failed to deserialize GitHub issues response")?;

        debug!(repo, fetched = issues.len(), "fetched open issues");
        Ok(issues)
    }
}
