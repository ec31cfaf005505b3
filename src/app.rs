use std::{any::Any, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::error;

use crate::{
    api,
    clients::{CompletionClient, GithubClient, OpenAiClient, SlackNotifier},
    config::Config,
    error::ErrorBody,
    observability::Telemetry,
    pipeline::PipelineOrchestrator,
};

#[derive(Clone)]
pub(crate) struct AppState {
    registry: Arc<ComponentRegistry>,
}

pub struct ComponentRegistry {
    config: Arc<Config>,
    telemetry: Telemetry,
    orchestrator: Arc<PipelineOrchestrator>,
    github_client: Arc<GithubClient>,
    notifier: Option<Arc<SlackNotifier>>,
}

impl AppState {
    pub(crate) fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub(crate) fn telemetry(&self) -> &Telemetry {
        &self.registry.telemetry
    }

    pub(crate) fn config(&self) -> &Config {
        &self.registry.config
    }

    pub(crate) fn orchestrator(&self) -> Arc<PipelineOrchestrator> {
        Arc::clone(&self.registry.orchestrator)
    }

    pub(crate) fn github_client(&self) -> Arc<GithubClient> {
        Arc::clone(&self.registry.github_client)
    }

    pub(crate) fn notifier(&self) -> Option<Arc<SlackNotifier>> {
        self.registry.notifier.clone()
    }
}

impl ComponentRegistry {
    /// 構成情報から各クライアントとパイプラインを組み立てる。
    ///
    /// # Errors
    /// Telemetry の初期化や HTTP クライアント構築が失敗した場合はエラーを返す。
    pub fn build(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let telemetry = Telemetry::new()?;

        let completion_client: Arc<dyn CompletionClient> = Arc::new(OpenAiClient::new(
            config.openai_base_url(),
            config.openai_api_key().map(str::to_string),
        )?);
        let orchestrator = Arc::new(PipelineOrchestrator::new(
            Arc::clone(&config),
            completion_client,
            telemetry.metrics_arc(),
        )?);

        let github_client = Arc::new(GithubClient::new(
            config.github_api_base_url(),
            config.github_token().map(str::to_string),
        )?);

        let notifier = config
            .slack_webhook_url()
            .map(SlackNotifier::new)
            .transpose()
            .context("failed to configure Slack notifier")?
            .map(Arc::new);

        Ok(Self {
            config,
            telemetry,
            orchestrator,
            github_client,
            notifier,
        })
    }

    #[must_use]
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    #[must_use]
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    #[must_use]
    pub fn orchestrator(&self) -> Arc<PipelineOrchestrator> {
        Arc::clone(&self.orchestrator)
    }
}

fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic payload");
    error!(message, "request handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new("Server error")),
    )
        .into_response()
}

pub fn build_router(registry: ComponentRegistry) -> Router {
    let state = AppState::new(registry);
    api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_registry_builds_without_credentials() {
        let registry = ComponentRegistry::build(Config::default()).expect("registry builds");
        assert!(registry.config().openai_api_key().is_none());
        assert!(registry.notifier.is_none());
    }

    #[test]
    fn invalid_webhook_url_fails_registry_build() {
        let config = Config::default().with_slack_webhook_url("not a url");
        let error = ComponentRegistry::build(config)
            .err()
            .expect("invalid webhook should fail");
        assert!(format!("{error:#}").contains("Slack"));
    }

    #[test]
    fn panic_handler_returns_generic_error() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
