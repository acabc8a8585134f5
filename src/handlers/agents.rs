//! Agent listing endpoint

use crate::agents::AgentDescriptor;
use crate::handlers::AppState;
use axum::{Json, extract::State};

/// GET /agents handler
///
/// Lists the registered agents in registration order.
pub async fn handler(State(state): State<AppState>) -> Json<Vec<AgentDescriptor>> {
    let snapshot = state.orchestrator().registry().snapshot();
    Json(
        snapshot
            .iter()
            .map(|agent| agent.descriptor().clone())
            .collect(),
    )
}
