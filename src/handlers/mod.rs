//! HTTP request handlers for the Dunder API

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::middleware::request_id_middleware;
use crate::router::Orchestrator;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod agents;
pub mod chat;
pub mod health;
pub mod metrics;

/// Application state shared across all handlers
///
/// Contains configuration, the orchestrator and the metrics collector.
/// All fields are Arc'd for cheap cloning across Axum handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    orchestrator: Arc<Orchestrator>,
    metrics: Arc<Metrics>,
}

impl AppState {
    /// Create a new AppState from configuration
    ///
    /// Builds the persona roster and the orchestrator over the configured
    /// LLM endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if metrics registration fails or the roster cannot be built.
    pub fn new(config: Arc<Config>) -> AppResult<Self> {
        let metrics = Arc::new(Metrics::new().map_err(|e| {
            AppError::Internal(format!("Failed to initialize metrics: {}", e))
        })?);
        let orchestrator = Orchestrator::from_config(&config)?.with_metrics(metrics.clone());
        Ok(Self::from_parts(config, Arc::new(orchestrator), metrics))
    }

    /// Assemble state from prebuilt parts
    pub fn from_parts(
        config: Arc<Config>,
        orchestrator: Arc<Orchestrator>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            metrics,
        }
    }

    /// Get reference to the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get reference to the orchestrator
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Get reference to the metrics collector
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}

/// Build the HTTP router with request-id and trace layers
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat::handler))
        .route("/agents", get(agents::handler))
        .route("/health", get(health::handler))
        .route("/metrics", get(metrics::handler))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::REQUEST_ID_HEADER;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[test]
    fn test_appstate_is_clonable() {
        let state = testing::state(Vec::new());
        let state2 = state.clone();
        assert_eq!(state2.config().server.port, 3000);
        assert_eq!(state2.orchestrator().registry().len(), 2);
    }

    #[tokio::test]
    async fn test_app_sets_request_id_header() {
        let response = app(testing::state(Vec::new()))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = app(testing::state(Vec::new()))
            .oneshot(Request::get("/v1/models").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
