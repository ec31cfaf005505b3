use std::collections::BTreeMap;

use anyhow::Context;
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::{
    error::AnalyzeError, pipeline::types::SentimentTally, util::text::truncate_error_message,
};

/// 通知に載せるカテゴリ数の上限
pub(crate) const TOP_CATEGORIES: usize = 3;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook returned error status {0}")]
    Status(StatusCode),

    #[error(transparent)]
    Request(#[from] anyhow::Error),
}

impl From<WebhookError> for AnalyzeError {
    fn from(error: WebhookError) -> Self {
        match error {
            WebhookError::Status(status) => AnalyzeError::Upstream {
                service: "Slack",
                status,
            },
            WebhookError::Request(source) => AnalyzeError::Internal(source),
        }
    }
}

/// 件数の多い順に上位カテゴリを選ぶ。同数ならキーの辞書順。
#[must_use]
pub fn top_categories(counts: &BTreeMap<String, u64>, limit: usize) -> Vec<(&str, u64)> {
    let mut entries: Vec<(&str, u64)> = counts
        .iter()
        .map(|(category, count)| (category.as_str(), *count))
        .collect();
    // BTreeMap の順序を保つ安定ソート
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries.truncate(limit);
    entries
}

/// Slack 向けの通知本文を組み立てる。
#[must_use]
pub fn format_message(
    counts: &BTreeMap<String, u64>,
    sentiments: &SentimentTally,
    exec_summary: &str,
) -> String {
    let top = top_categories(counts, TOP_CATEGORIES)
        .into_iter()
        .map(|(category, count)| format!("{category} ({count})"))
        .collect::<Vec<_>>()
        .join(", ");
    let top = if top.is_empty() { "n/a".to_string() } else { top };

    format!(
        "*Support Signal*\nTop categories: {top}\nSentiment: Neg {} | Neu {} | Pos {}\n\n{exec_summary}",
        sentiments.negative, sentiments.neutral, sentiments.positive
    )
}

#[derive(Debug, Clone)]
pub struct SlackNotifier {
    client: Client,
    webhook_url: Url,
}

impl SlackNotifier {
    /// # Errors
    /// Webhook URL が不正、または HTTP クライアントの構築に失敗した場合はエラーを返す。
    pub fn new(webhook_url: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .build()
            .context("failed to build webhook HTTP client")?;
        let webhook_url = Url::parse(webhook_url).context("invalid SLACK_WEBHOOK_URL")?;

        Ok(Self {
            client,
            webhook_url,
        })
    }

    /// # Errors
    /// 非成功ステータスは [`WebhookError::Status`]、送信失敗は [`WebhookError::Request`] を返す。
    pub async fn post(&self, text: &str) -> Result<(), WebhookError> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&WebhookPayload { text })
            .send()
            .await
            .context("webhook request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, body = %truncate_error_message(&body), "webhook returned error status");
            return Err(WebhookError::Status(status));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn counts(entries: &[(&str, u64)]) -> BTreeMap<String, u64> {
        entries
            .iter()
            .map(|(category, count)| ((*category).to_string(), *count))
            .collect()
    }

    #[rstest]
    #[case::ordered_by_count(&[("Bugs", 2), ("Billing", 5), ("Other", 1), ("UX/Usability", 3)], vec![("Billing", 5), ("UX/Usability", 3), ("Bugs", 2)])]
    #[case::ties_by_key(&[("Other", 2), ("Bugs", 2), ("Billing", 2), ("Login/Access", 2)], vec![("Billing", 2), ("Bugs", 2), ("Login/Access", 2)])]
    #[case::fewer_than_limit(&[("Bugs", 1)], vec![("Bugs", 1)])]
    fn top_categories_picks_highest_counts(
        #[case] entries: &[(&str, u64)],
        #[case] expected: Vec<(&str, u64)>,
    ) {
        let counts = counts(entries);
        assert_eq!(top_categories(&counts, TOP_CATEGORIES), expected);
    }

    #[test]
    fn message_lists_top_categories_and_sentiment() {
        let sentiments = SentimentTally {
            negative: 4,
            neutral: 1,
            positive: 0,
        };
        let text = format_message(
            &counts(&[("Billing", 3), ("Bugs", 2)]),
            &sentiments,
            "Billing drives volume.",
        );

        assert_eq!(
            text,
            "*Support Signal*\nTop categories: Billing (3), Bugs (2)\nSentiment: Neg 4 | Neu 1 | Pos 0\n\nBilling drives volume."
        );
    }

    #[test]
    fn message_without_categories_says_na() {
        let text = format_message(&BTreeMap::new(), &SentimentTally::default(), "");
        assert!(text.contains("Top categories: n/a\n"));
        assert!(text.ends_with("Pos 0\n\n"));
    }

    #[tokio::test]
    async fn post_sends_text_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/T000"))
            .and(body_json(serde_json::json!({"text": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = SlackNotifier::new(&format!("{}/hooks/T000", server.uri()))
            .expect("notifier should build");
        notifier.post("hello").await.expect("post succeeds");
    }

    #[tokio::test]
    async fn post_error_status_maps_to_upstream_slack_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("invalid_token"))
            .mount(&server)
            .await;

        let notifier =
            SlackNotifier::new(&format!("{}/hooks/T000", server.uri())).expect("notifier");
        let error = AnalyzeError::from(notifier.post("hello").await.expect_err("should fail"));

        assert_eq!(error.status(), StatusCode::FORBIDDEN);
        assert_eq!(error.to_string(), "Slack 403");
    }
}
