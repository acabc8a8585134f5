//! Completion client over open-agent-sdk
//!
//! Talks to any OpenAI-compatible endpoint (ollama serves one at `/v1`).
//! Each call builds fresh `AgentOptions`, streams the answer with a timeout and
//! a size budget, and maps every failure onto [`LlmError`].

use super::{CompletionClient, LlmError};
use crate::config::LlmEndpoint;
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;

/// Default response budget for persona replies (64 KiB)
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 64 * 1024;

/// Response budget for classification answers
///
/// A classification answer is a single agent name. Anything past 1KB means the
/// model is ignoring the instruction, so the stream is cut off early.
pub const CLASSIFIER_MAX_RESPONSE_BYTES: usize = 1024;

/// [`CompletionClient`] backed by `open_agent::query`
#[derive(Debug, Clone)]
pub struct OpenAgentClient {
    endpoint: LlmEndpoint,
    max_response_bytes: usize,
}

impl OpenAgentClient {
    /// Create a client for the configured endpoint
    pub fn new(endpoint: LlmEndpoint) -> Self {
        Self {
            endpoint,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }

    /// Override the response size budget
    pub fn with_max_response_bytes(mut self, max_response_bytes: usize) -> Self {
        self.max_response_bytes = max_response_bytes;
        self
    }

    /// Get the endpoint configuration
    pub fn endpoint(&self) -> &LlmEndpoint {
        &self.endpoint
    }

    fn options(&self) -> Result<open_agent::AgentOptions, LlmError> {
        open_agent::AgentOptions::builder()
            .model(self.endpoint.name())
            .base_url(self.endpoint.base_url())
            .max_tokens(self.endpoint.max_tokens())
            .temperature(self.endpoint.temperature())
            .build()
            .map_err(|e| {
                tracing::error!(
                    model = %self.endpoint.name(),
                    endpoint_url = %self.endpoint.base_url(),
                    max_tokens = self.endpoint.max_tokens(),
                    temperature = self.endpoint.temperature(),
                    error = %e,
                    "Failed to build AgentOptions for completion"
                );
                LlmError::OptionsConfig {
                    endpoint: self.endpoint.base_url().to_string(),
                    details: format!(
                        "{}. Check [llm]: name='{}' (must be non-empty), base_url='{}' (must end with /v1)",
                        e,
                        self.endpoint.name(),
                        self.endpoint.base_url()
                    ),
                }
            })
    }

    async fn collect(
        &self,
        prompt: &str,
        options: &open_agent::AgentOptions,
    ) -> Result<String, LlmError> {
        let endpoint = self.endpoint.base_url();

        let mut stream = open_agent::query(prompt, options).await.map_err(|e| {
            tracing::error!(
                endpoint_url = %endpoint,
                error = %e,
                "Completion query failed to connect or initialize stream"
            );
            LlmError::Connection {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            }
        })?;

        let mut response_text = String::new();
        while let Some(result) = stream.next().await {
            match result {
                Ok(open_agent::ContentBlock::Text(text_block)) => {
                    let size = response_text.len() + text_block.text.len();
                    if size > self.max_response_bytes {
                        let preview: String = response_text.chars().take(200).collect();
                        tracing::error!(
                            endpoint_url = %endpoint,
                            size = size,
                            max_allowed = self.max_response_bytes,
                            response_preview = %preview,
                            "Completion exceeded response budget"
                        );
                        return Err(LlmError::SizeExceeded {
                            endpoint: endpoint.to_string(),
                            size,
                            max_size: self.max_response_bytes,
                        });
                    }
                    response_text.push_str(&text_block.text);
                }
                Ok(other_block) => {
                    tracing::debug!(
                        block_type = ?other_block,
                        "Skipping non-text content block"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        endpoint_url = %endpoint,
                        error = %e,
                        partial_response_length = response_text.len(),
                        "Completion stream error after {} bytes",
                        response_text.len()
                    );
                    return Err(LlmError::Stream {
                        endpoint: endpoint.to_string(),
                        bytes_received: response_text.len(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(response_text)
    }
}

#[async_trait]
impl CompletionClient for OpenAgentClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let options = self.options()?;
        let timeout_seconds = self.endpoint.timeout_seconds();

        tracing::debug!(
            model = %self.endpoint.name(),
            prompt_length = prompt.len(),
            timeout_seconds = timeout_seconds,
            "Starting completion"
        );

        let response_text = tokio::time::timeout(
            Duration::from_secs(timeout_seconds),
            self.collect(prompt, &options),
        )
        .await
        .map_err(|_elapsed| {
            tracing::error!(
                model = %self.endpoint.name(),
                endpoint_url = %self.endpoint.base_url(),
                timeout_seconds = timeout_seconds,
                "Completion timed out"
            );
            LlmError::Timeout {
                endpoint: self.endpoint.base_url().to_string(),
                timeout_seconds,
            }
        })??;

        if response_text.trim().is_empty() {
            tracing::warn!(
                model = %self.endpoint.name(),
                "Completion returned no text"
            );
            return Err(LlmError::EmptyResponse {
                endpoint: self.endpoint.base_url().to_string(),
            });
        }

        tracing::debug!(
            model = %self.endpoint.name(),
            response_length = response_text.len(),
            "Completion finished"
        );

        Ok(response_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> LlmEndpoint {
        serde_json::from_str(
            r#"{
                "name": "gemma3:1b",
                "base_url": "http://localhost:11434/v1",
                "max_tokens": 512,
                "temperature": 0.2,
                "timeout_seconds": 5
            }"#,
        )
        .expect("should deserialize LlmEndpoint")
    }

    #[test]
    fn test_client_defaults_to_persona_budget() {
        let client = OpenAgentClient::new(endpoint());
        assert_eq!(client.max_response_bytes, DEFAULT_MAX_RESPONSE_BYTES);
        assert_eq!(client.endpoint().name(), "gemma3:1b");
    }

    #[test]
    fn test_client_budget_override() {
        let client =
            OpenAgentClient::new(endpoint()).with_max_response_bytes(CLASSIFIER_MAX_RESPONSE_BYTES);
        assert_eq!(client.max_response_bytes, 1024);
    }
}
