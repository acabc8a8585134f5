//! LLM-based intent classifier
//!
//! Renders the classification prompt from one registry snapshot, asks the
//! completion client for an agent name, and matches the normalized answer
//! against the same snapshot.

use super::ClassificationResult;
use super::normalize::{match_agent, normalize};
use super::prompt::PromptTemplate;
use super::registry::AgentRegistry;
use crate::llm::{CompletionClient, LlmError};
use std::sync::Arc;

/// Classifier over an injected registry and completion client
pub struct LlmClassifier {
    registry: Arc<AgentRegistry>,
    client: Arc<dyn CompletionClient>,
    template: PromptTemplate,
}

impl LlmClassifier {
    pub fn new(
        registry: Arc<AgentRegistry>,
        client: Arc<dyn CompletionClient>,
        template: PromptTemplate,
    ) -> Self {
        Self {
            registry,
            client,
            template,
        }
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    /// Pick an agent for `user_input`
    ///
    /// An empty registry yields `{none, 0.0}` without calling the LLM, which is
    /// what a real round trip would produce since no answer can match. An
    /// answer over the client's response budget is unmatched too: no agent
    /// name comes close to that length.
    ///
    /// # Errors
    /// Returns the client's [`LlmError`] when the completion fails for any
    /// other reason.
    ///
    /// # Cancellation Safety
    /// Dropping the future aborts the in-flight completion; nothing is mutated.
    pub async fn classify(&self, user_input: &str) -> Result<ClassificationResult, LlmError> {
        let snapshot = self.registry.snapshot();
        if snapshot.is_empty() {
            tracing::debug!("Registry is empty, skipping classification call");
            return Ok(ClassificationResult::unmatched());
        }

        let prompt = self.template.render(user_input, &snapshot.describe_all());
        tracing::debug!(
            prompt_length = prompt.len(),
            user_input_length = user_input.len(),
            agent_count = snapshot.len(),
            "Built classification prompt"
        );

        let raw = match self.client.complete(&prompt).await {
            Ok(raw) => raw,
            Err(LlmError::SizeExceeded { size, max_size, .. }) => {
                tracing::info!(
                    size,
                    max_size,
                    "Classifier answer overran the response budget, treating as unmatched"
                );
                return Ok(ClassificationResult::unmatched());
            }
            Err(e) => return Err(e),
        };
        let normalized = normalize(&raw);
        let result = match_agent(&normalized, &snapshot);

        match result.selected_name() {
            Some(agent) => tracing::debug!(
                agent = %agent,
                confidence = result.confidence(),
                "Classifier selected agent"
            ),
            None => {
                let preview: String = raw.chars().take(100).collect();
                tracing::info!(
                    response_preview = %preview,
                    normalized = %normalized,
                    "Classifier answer matched no registered agent"
                );
            }
        }

        Ok(result)
    }
}
