//! Chat endpoint handler
//!
//! Handles POST /chat: one user turn in, one routed agent reply out.

use crate::agents::{AgentRequest, ConversationTurn, DEFAULT_SESSION_ID, DEFAULT_USER_ID};
use crate::error::{AppError, AppResult};
use crate::handlers::AppState;
use crate::middleware::RequestId;
use crate::router::{RouteOutcome, RouteResponse};
use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maximum allowed message length in characters (100K chars)
const MAX_MESSAGE_LENGTH: usize = 100_000;

/// Chat request from client
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl ChatRequest {
    /// Reject empty and oversized messages
    pub fn validate(&self) -> AppResult<()> {
        if self.message.trim().is_empty() {
            return Err(AppError::Validation(
                "message cannot be empty or contain only whitespace".to_string(),
            ));
        }

        // Count Unicode characters, not bytes
        let char_count = self.message.chars().count();
        if char_count > MAX_MESSAGE_LENGTH {
            return Err(AppError::Validation(format!(
                "message exceeds maximum length of {} characters (got {})",
                MAX_MESSAGE_LENGTH, char_count
            )));
        }

        Ok(())
    }

    /// Convert into the turn handed to the orchestrator
    pub fn into_agent_request(self) -> AgentRequest {
        AgentRequest::new(self.message)
            .with_user(self.user_id.unwrap_or_else(|| DEFAULT_USER_ID.to_string()))
            .with_session(
                self.session_id
                    .unwrap_or_else(|| DEFAULT_SESSION_ID.to_string()),
            )
            .with_history(self.history)
            .with_params(self.params)
    }
}

/// Chat response to client
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    /// Agent reply, or the configured fallback message
    pub response: String,
    /// Agent that produced the reply, if any
    pub agent: Option<String>,
    pub confidence: f32,
    pub outcome: RouteOutcome,
    pub attempts: usize,
}

impl From<RouteResponse> for ChatResponse {
    fn from(route: RouteResponse) -> Self {
        Self {
            response: route.content,
            agent: route.agent,
            confidence: route.confidence,
            outcome: route.outcome,
            attempts: route.attempts,
        }
    }
}

/// POST /chat handler
///
/// Every routing outcome is a 200: classification failures, unmatched input
/// and agent failures come back as the configured user-facing message with
/// the outcome field set accordingly. Only invalid requests are errors.
pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<ChatRequest>,
) -> AppResult<Json<ChatResponse>> {
    request.validate()?;

    tracing::debug!(
        request_id = %request_id,
        message_length = request.message.len(),
        history_turns = request.history.len(),
        "Received chat request"
    );

    let agent_request = request.into_agent_request();
    let started = std::time::Instant::now();
    let route = state.orchestrator().route(&agent_request).await;

    tracing::info!(
        request_id = %request_id,
        session_id = %agent_request.session_id,
        agent = route.agent.as_deref().unwrap_or("none"),
        outcome = route.outcome.as_str(),
        attempts = route.attempts,
        duration_ms = started.elapsed().as_millis() as u64,
        "Chat request routed"
    );

    Ok(Json(route.into()))
}
