use axum::{Json, body::Bytes, extract::State};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    app::AppState,
    error::AnalyzeError,
    pipeline::types::{PipelineResult, RawIssue},
};

use super::decode_body;

#[derive(Debug, Default, Deserialize)]
struct AnalyzeRequest {
    #[serde(default)]
    issues: Value,
}

impl AnalyzeRequest {
    /// 配列以外の `issues` は空リストとして扱う。
    ///
    /// オブジェクト以外の要素はタイトルも本文も空の Issue になる。
    fn into_issues(self) -> Result<Vec<RawIssue>, AnalyzeError> {
        let Value::Array(items) = self.issues else {
            return Ok(Vec::new());
        };
        items
            .into_iter()
            .map(|item| match item {
                Value::Object(_) => serde_json::from_value(item).map_err(|error| {
                    AnalyzeError::InvalidRequest(format!("Invalid issue: {error}"))
                }),
                _ => Ok(RawIssue::default()),
            })
            .collect()
    }
}

pub(crate) async fn analyze(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PipelineResult>, AnalyzeError> {
    let issues = decode_body::<AnalyzeRequest>(&body)?.into_issues()?;
    let outcome = state.orchestrator().run(issues).await?;
    Ok(Json(outcome.result))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::test_support::{router, send};
    use crate::config::Config;

    fn completion(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        }))
    }

    fn config(server: &MockServer) -> Config {
        Config::default()
            .with_openai_api_key("sk-test")
            .with_openai_base_url(format!("{}/v1/", server.uri()))
    }

    #[tokio::test]
    async fn missing_issues_is_bad_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(completion(""))
            .expect(0)
            .mount(&server)
            .await;

        for body in ["", "{}", r#"{"issues":[]}"#, r#"{"issues":"nope"}"#] {
            let (status, value) =
                send(router(config(&server)), Method::POST, "/api/analyze", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {body:?}");
            assert_eq!(value["error"], "No issues provided");
        }
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let (status, value) = send(
            router(Config::default().with_openai_api_key("sk-test")),
            Method::POST,
            "/api/analyze",
            "{not json",
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(
            value["error"]
                .as_str()
                .expect("error string")
                .starts_with("Invalid JSON body")
        );
    }

    #[test]
    fn non_object_issue_entries_become_empty_issues() {
        let request: AnalyzeRequest =
            serde_json::from_str(r#"{"issues":["text",null,{"title":"Login loop"}]}"#)
                .expect("request decodes");

        let issues = request.into_issues().expect("issues decode");

        assert_eq!(
            issues,
            vec![
                RawIssue::default(),
                RawIssue::default(),
                RawIssue::new("Login loop", ""),
            ]
        );
    }

    #[test]
    fn mistyped_issue_fields_are_rejected() {
        let request: AnalyzeRequest =
            serde_json::from_str(r#"{"issues":[{"title":42}]}"#).expect("request decodes");

        let error = request.into_issues().expect_err("title must be a string");

        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert!(error.to_string().starts_with("Invalid issue"));
    }

    #[tokio::test]
    async fn missing_credential_is_server_error() {
        let (status, value) = send(
            router(Config::default()),
            Method::POST,
            "/api/analyze",
            r#"{"issues":[{"title":"a","body":"b"}]}"#,
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(value, json!({"error": "Missing OPENAI_API_KEY"}));
    }

    #[tokio::test]
    async fn successful_analysis_returns_result_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(completion(
                "{\"category\":\"Billing\",\"sentiment\":\"Negative\",\"rootCause\":\"double charge\",\"action\":\"refund\"}",
            ))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(completion("Billing is the only driver."))
            .mount(&server)
            .await;

        let (status, value) = send(
            router(config(&server)),
            Method::POST,
            "/api/analyze",
            r#"{"issues":[{"title":"Charged twice","body":null}]}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            value,
            json!({
                "parsed": [{"category":"Billing","sentiment":"Negative","rootCause":"double charge","action":"refund"}],
                "counts": {"Billing": 1},
                "sentiments": {"Negative": 1, "Neutral": 0, "Positive": 0},
                "execSummary": "Billing is the only driver."
            })
        );
    }

    #[tokio::test]
    async fn upstream_status_is_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let (status, value) = send(
            router(config(&server)),
            Method::POST,
            "/api/analyze",
            r#"{"issues":[{"title":"a","body":"b"}]}"#,
        )
        .await;

        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(value, json!({"error": "OpenAI 429"}));
    }
}
