//! Prometheus metrics endpoint
//!
//! Exposes metrics in Prometheus text format for scraping.

use axum::{extract::State, http::StatusCode};

use crate::handlers::AppState;

/// Metrics handler for Prometheus scraping
///
/// # Response
///
/// - `200 OK` with metrics in Prometheus text format
/// - `500 Internal Server Error` if metrics collection fails
///
/// # Example
///
/// ```bash
/// curl http://localhost:3000/metrics
/// # HELP dunder_classifications_total Total number of intent classifications by outcome
/// # TYPE dunder_classifications_total counter
/// dunder_classifications_total{outcome="matched"} 42
/// ```
pub async fn handler(State(state): State<AppState>) -> (StatusCode, String) {
    match state.metrics().gather() {
        Ok(output) => (StatusCode::OK, output),
        Err(e) => {
            tracing::error!(error = %e, "Failed to gather metrics for Prometheus scraping");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to gather metrics: {}", e),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentRequest;
    use crate::handlers::testing;

    #[tokio::test]
    async fn test_metrics_reflect_routing() {
        let state = testing::state(vec!["PamAgent"]);
        state
            .orchestrator()
            .route(&AgentRequest::new("schedule lunch"))
            .await;

        let (status, body) = handler(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("# TYPE dunder_classifications_total counter"));
        assert!(body.contains("dunder_classifications_total{outcome=\"matched\"} 1"));
        assert!(body.contains("dunder_dispatch_total{agent=\"PamAgent\",result=\"success\"} 1"));
    }

    #[tokio::test]
    async fn test_concurrent_scrapes_agree() {
        let state = testing::state(Vec::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = state.clone();
                tokio::spawn(async move { handler(State(state)).await })
            })
            .collect();

        let results: Vec<(StatusCode, String)> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.expect("scrape task should not panic"))
            .collect();

        assert!(results.iter().all(|(status, _)| *status == StatusCode::OK));
        assert!(results.iter().all(|(_, body)| body == &results[0].1));
    }
}
