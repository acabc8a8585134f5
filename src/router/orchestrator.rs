//! Router/orchestrator
//!
//! One routing call walks: classify (bounded by the classification timeout) →
//! match → dispatch to the selected agent, or a configured fallback message.
//! Every failure resolves to reply text; callers only ever render strings.
//!
//! Retryable failures (transient LLM errors, classification timeouts,
//! transient agent backend errors) re-run the whole classify+dispatch sequence
//! with exponential backoff. A no-match answer is final: asking the same
//! question again is not expected to help, the default-agent policy is the
//! fallback for that.

use super::classifier::LlmClassifier;
use super::prompt::PromptTemplate;
use super::registry::AgentRegistry;
use super::{RouteOutcome, RouteResponse};
use crate::agents::{Agent, AgentRequest, build_agents};
use crate::config::{Config, MessagesConfig, RoutingConfig};
use crate::error::{AppError, AppResult};
use crate::llm::client::CLASSIFIER_MAX_RESPONSE_BYTES;
use crate::llm::{CompletionClient, OpenAgentClient};
use crate::metrics::{ClassificationOutcome, DispatchResult, Metrics};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Maximum backoff duration in milliseconds (30 seconds)
///
/// With base=100ms attempt 10 would be 51.2 seconds, capped to 30s.
pub const MAX_BACKOFF_MS: u64 = 30_000;

/// Exponential backoff `base * 2^(attempt-1)` with overflow protection
///
/// With base=100ms:
/// - Attempt 1: 100ms
/// - Attempt 2: 200ms
/// - Attempt 3: 400ms
/// - Attempt 10+: 30,000ms (capped)
pub fn calculate_backoff(retry_backoff_ms: u64, attempt: usize) -> u64 {
    let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
    retry_backoff_ms
        .saturating_mul(2_u64.saturating_pow(exponent))
        .min(MAX_BACKOFF_MS)
}

/// Result of one classify+dispatch attempt
enum Attempt {
    /// Terminal, return to the caller
    Final(RouteResponse),
    /// Retryable failure; this reply is used if no attempts remain
    Retry(RouteResponse),
}

/// Routes user turns to agents
pub struct Orchestrator {
    classifier: LlmClassifier,
    messages: MessagesConfig,
    max_retries: usize,
    retry_backoff_ms: u64,
    classification_timeout: Duration,
    default_agent: Option<String>,
    metrics: Option<Arc<Metrics>>,
}

impl Orchestrator {
    pub fn new(
        classifier: LlmClassifier,
        routing: &RoutingConfig,
        messages: MessagesConfig,
    ) -> Self {
        let default_agent = if routing.use_default_agent {
            routing.default_agent.clone()
        } else {
            None
        };

        Self {
            classifier,
            messages,
            max_retries: routing.max_retries.max(1),
            retry_backoff_ms: routing.retry_backoff_ms,
            classification_timeout: Duration::from_secs(routing.classification_timeout_seconds),
            default_agent,
            metrics: None,
        }
    }

    /// Wire the configured roster, classifier and completion clients together
    ///
    /// The classifier gets its own client with a small response budget; the
    /// personas share one with the default budget.
    ///
    /// # Errors
    /// Fails when a persona cannot open its state or the roster does not
    /// register (empty or duplicate names).
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let persona_llm: Arc<dyn CompletionClient> =
            Arc::new(OpenAgentClient::new(config.llm.clone()));
        let classifier_llm: Arc<dyn CompletionClient> = Arc::new(
            OpenAgentClient::new(config.llm.clone())
                .with_max_response_bytes(CLASSIFIER_MAX_RESPONSE_BYTES),
        );

        let agents = build_agents(config, persona_llm)?;
        let registry = Arc::new(AgentRegistry::with_agents(agents)?);
        tracing::info!(
            agents = registry.len(),
            model = %config.llm.name(),
            "Agent roster registered"
        );

        let classifier = LlmClassifier::new(
            registry,
            classifier_llm,
            PromptTemplate::from_routing(&config.routing),
        );
        Ok(Self::new(classifier, &config.routing, config.messages.clone()))
    }

    /// Record classification, dispatch and retry metrics
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        self.classifier.registry()
    }

    pub fn messages(&self) -> &MessagesConfig {
        &self.messages
    }

    /// Route one turn to the best agent
    ///
    /// # Cancellation Safety
    /// Dropping the future aborts the in-flight LLM call or agent handler.
    /// Use [`Orchestrator::route_cancellable`] to get an explicit error instead.
    pub async fn route(&self, request: &AgentRequest) -> RouteResponse {
        let mut attempt = 1;
        loop {
            tracing::debug!(
                session_id = %request.session_id,
                attempt = attempt,
                max_retries = self.max_retries,
                "Routing attempt"
            );

            match self.attempt(request).await {
                Attempt::Final(response) => return response.with_attempts(attempt),
                Attempt::Retry(response) if attempt >= self.max_retries => {
                    tracing::warn!(
                        session_id = %request.session_id,
                        attempts = attempt,
                        outcome = response.outcome.as_str(),
                        "Routing failed after all retry attempts"
                    );
                    return response.with_attempts(attempt);
                }
                Attempt::Retry(response) => {
                    let backoff_ms = calculate_backoff(self.retry_backoff_ms, attempt);
                    tracing::info!(
                        session_id = %request.session_id,
                        attempt = attempt,
                        max_retries = self.max_retries,
                        outcome = response.outcome.as_str(),
                        backoff_ms = backoff_ms,
                        "Retrying routing after retryable failure"
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.route_retry();
                    }
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Route one turn, failing with [`AppError::Cancelled`] if `cancel` completes first
    ///
    /// The in-flight LLM call or agent handler is dropped when cancellation wins.
    pub async fn route_cancellable<F>(
        &self,
        request: &AgentRequest,
        cancel: F,
    ) -> AppResult<RouteResponse>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            response = self.route(request) => Ok(response),
            _ = cancel => {
                tracing::info!(
                    session_id = %request.session_id,
                    "Routing cancelled before completion"
                );
                Err(AppError::Cancelled)
            }
        }
    }

    /// Send a turn straight to the named agent, skipping classification
    ///
    /// Unknown names get the configured no-agent message.
    pub async fn dispatch_to(&self, name: &str, request: &AgentRequest) -> RouteResponse {
        let Some(agent) = self.registry().get(name) else {
            tracing::info!(agent = %name, "Direct dispatch to unknown agent");
            return RouteResponse::new(
                self.messages.no_agent.clone(),
                None,
                0.0,
                RouteOutcome::NoAgent,
            )
            .with_attempts(1);
        };

        match self.dispatch(agent, request, RouteOutcome::Dispatched, 1.0).await {
            Attempt::Final(response) | Attempt::Retry(response) => response.with_attempts(1),
        }
    }

    async fn attempt(&self, request: &AgentRequest) -> Attempt {
        let started = Instant::now();
        let classification = tokio::time::timeout(
            self.classification_timeout,
            self.classifier.classify(&request.input),
        )
        .await;

        let result = match classification {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                self.record_classification(ClassificationOutcome::Failed, started);
                tracing::warn!(
                    session_id = %request.session_id,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Classification backend failed"
                );
                let response = self.classification_failed();
                return if e.is_retryable() {
                    Attempt::Retry(response)
                } else {
                    Attempt::Final(response)
                };
            }
            Err(_elapsed) => {
                self.record_classification(ClassificationOutcome::TimedOut, started);
                tracing::warn!(
                    session_id = %request.session_id,
                    timeout_seconds = self.classification_timeout.as_secs(),
                    "Classification timed out"
                );
                return Attempt::Retry(self.classification_failed());
            }
        };

        let outcome = if result.is_match() {
            ClassificationOutcome::Matched
        } else if self.registry().is_empty() {
            ClassificationOutcome::Skipped
        } else {
            ClassificationOutcome::Unmatched
        };
        self.record_classification(outcome, started);

        if let Some(agent) = result.selected() {
            return self
                .dispatch(agent.clone(), request, RouteOutcome::Dispatched, result.confidence())
                .await;
        }

        match self.default_agent() {
            Some(agent) => {
                tracing::info!(
                    session_id = %request.session_id,
                    agent = %agent.name(),
                    "No agent identified, using default agent"
                );
                self.dispatch(agent, request, RouteOutcome::DefaultAgent, result.confidence())
                    .await
            }
            None => Attempt::Final(RouteResponse::new(
                self.messages.no_agent.clone(),
                None,
                0.0,
                RouteOutcome::NoAgent,
            )),
        }
    }

    async fn dispatch(
        &self,
        agent: Arc<dyn Agent>,
        request: &AgentRequest,
        outcome: RouteOutcome,
        confidence: f32,
    ) -> Attempt {
        let name = agent.name().to_string();
        tracing::debug!(
            agent = %name,
            session_id = %request.session_id,
            user_id = %request.user_id,
            history_turns = request.history.len(),
            "Dispatching to agent"
        );

        match agent.handle(request).await {
            Ok(content) => {
                self.record_dispatch(&name, DispatchResult::Success);
                Attempt::Final(RouteResponse::new(content, Some(name), confidence, outcome))
            }
            Err(e) => {
                self.record_dispatch(&name, DispatchResult::Error);
                tracing::error!(
                    agent = %name,
                    session_id = %request.session_id,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Agent handler failed"
                );
                let response = RouteResponse::new(
                    self.messages.routing_error.clone(),
                    Some(name),
                    confidence,
                    RouteOutcome::DispatchFailed,
                );
                if e.is_retryable() {
                    Attempt::Retry(response)
                } else {
                    Attempt::Final(response)
                }
            }
        }
    }

    fn default_agent(&self) -> Option<Arc<dyn Agent>> {
        let name = self.default_agent.as_deref()?;
        let agent = self.registry().get(name);
        if agent.is_none() {
            tracing::warn!(
                default_agent = %name,
                "Configured default agent is not registered"
            );
        }
        agent
    }

    fn classification_failed(&self) -> RouteResponse {
        RouteResponse::new(
            self.messages.classification_error.clone(),
            None,
            0.0,
            RouteOutcome::ClassificationFailed,
        )
    }

    fn record_classification(&self, outcome: ClassificationOutcome, started: Instant) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        if let Err(e) = metrics.record_classification(outcome, duration_ms) {
            tracing::warn!(
                error = %e,
                outcome = outcome.as_str(),
                "Failed to record classification metric"
            );
            metrics.metrics_recording_failure("record_classification");
        }
    }

    fn record_dispatch(&self, agent: &str, result: DispatchResult) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        if let Err(e) = metrics.record_dispatch(agent, result) {
            tracing::warn!(
                error = %e,
                agent = %agent,
                "Failed to record dispatch metric"
            );
            metrics.metrics_recording_failure("record_dispatch");
        }
    }
}
