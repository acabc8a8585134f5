//! LLM completion layer
//!
//! The routing core and the personas only see [`CompletionClient`]: a prompt goes
//! in, generated text comes out. [`OpenAgentClient`] is the production
//! implementation over `open-agent-sdk`; tests substitute scripted clients.

pub mod client;
pub mod structured;

pub use client::OpenAgentClient;
pub use structured::{StructuredOutput, parse_structured};

use async_trait::async_trait;

/// Text-generation backend consumed by the classifier and the personas
///
/// Implementations may be slow and may fail; callers treat every call as an
/// await point and handle [`LlmError`] explicitly.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send a single-turn prompt and return the generated text
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Failures of a completion call
///
/// Split into transient errors (network, timeout, interrupted stream) that a
/// fresh attempt may fix, and systemic ones (misconfiguration, empty or runaway
/// output) where retrying the same prompt is pointless.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    /// Endpoint did not answer within the configured timeout
    #[error("LLM query to {endpoint} timed out after {timeout_seconds}s")]
    Timeout {
        endpoint: String,
        timeout_seconds: u64,
    },

    /// Could not connect to the endpoint or open the response stream
    #[error("Failed to reach LLM at {endpoint}: {message}")]
    Connection { endpoint: String, message: String },

    /// Stream broke after it started
    #[error("LLM stream from {endpoint} failed after {bytes_received} bytes: {message}")]
    Stream {
        endpoint: String,
        bytes_received: usize,
        message: String,
    },

    /// Model returned no text at all
    #[error("LLM at {endpoint} returned an empty response")]
    EmptyResponse { endpoint: String },

    /// Model kept generating past the response budget
    #[error("LLM response from {endpoint} exceeded {max_size} bytes (got {size})")]
    SizeExceeded {
        endpoint: String,
        size: usize,
        max_size: usize,
    },

    /// Request options were rejected before anything was sent
    #[error("Invalid LLM options for {endpoint}: {details}")]
    OptionsConfig { endpoint: String, details: String },
}

impl LlmError {
    /// Returns true if a fresh attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::Timeout { .. } | LlmError::Connection { .. } | LlmError::Stream { .. }
        )
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_are_retryable() {
        let endpoint = "http://localhost:11434/v1".to_string();
        assert!(
            LlmError::Timeout {
                endpoint: endpoint.clone(),
                timeout_seconds: 10
            }
            .is_retryable()
        );
        assert!(
            LlmError::Connection {
                endpoint: endpoint.clone(),
                message: "connection refused".to_string()
            }
            .is_retryable()
        );
        assert!(
            LlmError::Stream {
                endpoint,
                bytes_received: 12,
                message: "reset".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_systemic_errors_are_not_retryable() {
        let endpoint = "http://localhost:11434/v1".to_string();
        assert!(
            !LlmError::EmptyResponse {
                endpoint: endpoint.clone()
            }
            .is_retryable()
        );
        assert!(
            !LlmError::SizeExceeded {
                endpoint: endpoint.clone(),
                size: 2048,
                max_size: 1024
            }
            .is_retryable()
        );
        assert!(
            !LlmError::OptionsConfig {
                endpoint,
                details: "empty model".to_string()
            }
            .is_retryable()
        );
    }
}
