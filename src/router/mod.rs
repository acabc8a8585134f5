//! Natural-language agent routing for Dunder
//!
//! Free text goes in, one registered agent is picked by an LLM classifier, and
//! that agent's reply comes out. The pieces, leaves first:
//!
//! - [`AgentRegistry`]: the agents that may be picked
//! - [`prompt`]: renders the classification prompt
//! - [`normalize`](normalize::normalize) / [`match_agent`]: exact matching of the answer
//! - [`LlmClassifier`]: prompt → completion → match
//! - [`Orchestrator`]: classify, dispatch, fall back, retry

pub mod classifier;
pub mod normalize;
pub mod orchestrator;
pub mod prompt;
pub mod registry;

pub use classifier::LlmClassifier;
pub use normalize::{match_agent, normalize};
pub use orchestrator::Orchestrator;
pub use prompt::{FewShotExample, PromptTemplate, build_classification_prompt};
pub use registry::{AgentRegistry, NO_AGENTS_AVAILABLE, RegistryError, RegistrySnapshot};

use crate::agents::Agent;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Outcome of one classification
///
/// Confidence is binary: `1.0` when the answer named a registered agent
/// exactly (after normalization), `0.0` otherwise.
#[derive(Clone)]
pub struct ClassificationResult {
    selected: Option<Arc<dyn Agent>>,
    confidence: f32,
}

impl ClassificationResult {
    pub fn matched(agent: Arc<dyn Agent>) -> Self {
        Self {
            selected: Some(agent),
            confidence: 1.0,
        }
    }

    pub fn unmatched() -> Self {
        Self {
            selected: None,
            confidence: 0.0,
        }
    }

    pub fn selected(&self) -> Option<&Arc<dyn Agent>> {
        self.selected.as_ref()
    }

    pub fn selected_name(&self) -> Option<&str> {
        self.selected.as_ref().map(|agent| agent.name())
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn is_match(&self) -> bool {
        self.selected.is_some()
    }
}

impl fmt::Debug for ClassificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassificationResult")
            .field("selected", &self.selected_name())
            .field("confidence", &self.confidence)
            .finish()
    }
}

/// How a routing call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteOutcome {
    /// The classifier picked an agent and it answered
    Dispatched,
    /// Nobody matched; the configured default agent answered
    DefaultAgent,
    /// Nobody matched and no default agent applies
    NoAgent,
    /// The classifier backend failed or timed out
    ClassificationFailed,
    /// The selected agent failed
    DispatchFailed,
}

impl RouteOutcome {
    /// Convert to string representation for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dispatched => "dispatched",
            Self::DefaultAgent => "default_agent",
            Self::NoAgent => "no_agent",
            Self::ClassificationFailed => "classification_failed",
            Self::DispatchFailed => "dispatch_failed",
        }
    }

    /// True when an agent produced the reply
    pub fn is_agent_reply(&self) -> bool {
        matches!(self, Self::Dispatched | Self::DefaultAgent)
    }
}

/// Reply of a routing call, tagged with the agent that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteResponse {
    pub content: String,
    pub agent: Option<String>,
    pub confidence: f32,
    pub outcome: RouteOutcome,
    /// Classify+dispatch attempts made (at least 1)
    pub attempts: usize,
}

impl RouteResponse {
    pub fn new(
        content: String,
        agent: Option<String>,
        confidence: f32,
        outcome: RouteOutcome,
    ) -> Self {
        Self {
            content,
            agent,
            confidence,
            outcome,
            attempts: 1,
        }
    }

    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts;
        self
    }
}
