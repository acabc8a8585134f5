//! Shared fixtures for integration tests
//!
//! Each test binary compiles this module separately, so not every helper is
//! used everywhere.
#![allow(dead_code)]

use async_trait::async_trait;
use dunder::agents::{Agent, AgentDescriptor, AgentError, AgentRequest};
use dunder::llm::{CompletionClient, LlmError};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Replays queued answers in order; answers "" once they run out
pub struct ScriptedClient {
    answers: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new(answers: Vec<Result<String, LlmError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(answers: &[&str]) -> Self {
        Self::new(answers.iter().map(|a| Ok(a.to_string())).collect())
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

pub fn timeout_error() -> LlmError {
    LlmError::Timeout {
        endpoint: "http://localhost:11434/v1".to_string(),
        timeout_seconds: 1,
    }
}

/// Replies `"{name} handled: {input}"` and counts calls
pub struct EchoAgent {
    descriptor: AgentDescriptor,
    calls: AtomicUsize,
}

impl EchoAgent {
    pub fn new(name: &str, description: &str) -> Arc<Self> {
        Arc::new(Self {
            descriptor: AgentDescriptor::new(name, description),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for EchoAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn handle(&self, request: &AgentRequest) -> Result<String, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{} handled: {}", self.descriptor.name, request.input))
    }
}

pub const MINIMAL_CONFIG: &str = r#"
[llm]
name = "gemma3:1b"
base_url = "http://localhost:11434/v1"
"#;
