//! DarrylAgent: coding help from the warehouse

use super::{Agent, AgentDescriptor, AgentError, AgentRequest};
use crate::llm::CompletionClient;
use async_trait::async_trait;
use std::sync::Arc;

/// What kind of coding help a request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodingTask {
    Debug,
    Optimize,
    Generate,
}

impl CodingTask {
    /// Pick the task from the leading verb of the request
    pub fn detect(input: &str) -> Self {
        let lowered = input.trim_start().to_lowercase();
        if lowered.starts_with("debug") {
            CodingTask::Debug
        } else if lowered.starts_with("optimize")
            || lowered.starts_with("optimise")
            || lowered.starts_with("refactor")
        {
            CodingTask::Optimize
        } else {
            CodingTask::Generate
        }
    }

    fn prompt(&self, input: &str) -> String {
        match self {
            CodingTask::Debug => format!(
                "Analyze and debug the following code:\n\n{}\n\n\
                 Provide insights on potential issues and suggest fixes.",
                strip_verb(input)
            ),
            CodingTask::Optimize => format!(
                "Refactor and optimize the following code:\n\n{}\n\n\
                 Ensure the updated code maintains functionality while improving \
                 efficiency and readability.",
                strip_verb(input)
            ),
            CodingTask::Generate => input.trim().to_string(),
        }
    }
}

/// Drop the leading command word ("debug", "optimize: ", ...)
fn strip_verb(input: &str) -> &str {
    let trimmed = input.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some((_, rest)) => rest.trim_start_matches(':').trim(),
        None => trimmed,
    }
}

pub struct DarrylAgent {
    descriptor: AgentDescriptor,
    llm: Arc<dyn CompletionClient>,
}

impl DarrylAgent {
    pub fn new(descriptor: AgentDescriptor, llm: Arc<dyn CompletionClient>) -> Self {
        Self { descriptor, llm }
    }
}

#[async_trait]
impl Agent for DarrylAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn handle(&self, request: &AgentRequest) -> Result<String, AgentError> {
        if request.input.trim().is_empty() {
            return Ok("You gotta give me some code to work with, man.".to_string());
        }

        let task = CodingTask::detect(&request.input);
        tracing::debug!(
            task = ?task,
            session_id = %request.session_id,
            "Darryl handling coding request"
        );
        Ok(self.llm.complete(&task.prompt(&request.input)).await?)
    }
}
