pub(crate) mod analyze;
pub(crate) mod fetch;
pub(crate) mod health;
pub(crate) mod metrics;
pub(crate) mod notify;

use axum::{
    Json, Router,
    body::Bytes,
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::de::DeserializeOwned;

use crate::{
    app::AppState,
    error::{AnalyzeError, ErrorBody},
};

pub(crate) fn router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.config().request_body_limit());

    Router::new()
        .route("/health/ready", get(health::ready))
        .route("/health/live", get(health::live))
        .route("/metrics", get(metrics::exporter))
        .route("/api/analyze", post(analyze::analyze).fallback(use_post))
        .route("/api/fetch", post(fetch::fetch_issues).fallback(use_post))
        .route("/api/notify", post(notify::notify).fallback(use_post))
        .layer(body_limit)
        .with_state(state)
}

async fn use_post() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorBody::new("Use POST")),
    )
        .into_response()
}

/// 空ボディは `{}` として扱う。
pub(crate) fn decode_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, AnalyzeError> {
    let raw: &[u8] = if body.is_empty() { b"{}" } else { body.as_ref() };
    serde_json::from_slice(raw)
        .map_err(|error| AnalyzeError::InvalidRequest(format!("Invalid JSON body: {error}")))
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::{
        app::{ComponentRegistry, build_router},
        config::Config,
    };

    pub(crate) fn router(config: Config) -> Router {
        build_router(ComponentRegistry::build(config).expect("registry builds"))
    }

    pub(crate) async fn send(
        router: Router,
        method: Method,
        uri: &str,
        body: impl Into<Body>,
    ) -> (StatusCode, Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(body.into())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Method;
    use rstest::rstest;

    use super::test_support::{router, send};
    use super::*;
    use crate::config::Config;

    #[rstest]
    #[case::analyze("/api/analyze")]
    #[case::fetch("/api/fetch")]
    #[case::notify("/api/notify")]
    #[tokio::test]
    async fn non_post_methods_are_rejected(#[case] uri: &str) {
        let (status, body) = send(router(Config::default()), Method::GET, uri, "").await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["error"], "Use POST");
    }

    #[test]
    fn empty_body_decodes_as_empty_object() {
        let value: serde_json::Value = decode_body(&Bytes::new()).expect("decodes");
        assert_eq!(value, serde_json::json!({}));
    }

    #[test]
    fn malformed_body_is_invalid_request() {
        let error = decode_body::<serde_json::Value>(&Bytes::from_static(b"{oops"))
            .expect_err("malformed");
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert!(error.to_string().starts_with("Invalid JSON body"));
    }
}
