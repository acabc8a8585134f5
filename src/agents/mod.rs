//! Office persona agents
//!
//! Every agent satisfies the same small contract: a descriptor (name,
//! description, keywords) the router renders into its classification prompt,
//! and an async `handle` that turns one conversation turn into reply text.
//! Which implementation backs a configured agent is chosen by its [`Persona`].

pub mod darryl;
pub mod jim;
pub mod oscar;
pub mod pam;
pub mod schrute;
pub mod search;

pub use darryl::DarrylAgent;
pub use jim::JimsterAgent;
pub use oscar::OscarAgent;
pub use pam::PamAgent;
pub use schrute::{SchruteBot, TaskStore};
pub use search::{SearchError, SearchHit, SearchProvider, SerperSearch};

use crate::config::{AgentConfig, Config};
use crate::llm::{CompletionClient, LlmError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Which persona implementation backs a configured agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    /// Code generation, debugging and optimization (DarrylAgent)
    Coding,
    /// SQLite task tracking (SchruteBot)
    Tasks,
    /// Prank mode and task list pranks (JimsterAgent)
    Pranks,
    /// Research summaries (OscarAgent)
    Research,
    /// Scheduling, reminders and small talk (PamAgent)
    Reception,
}

/// Name, description and keywords of a registered agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentDescriptor {
    pub name: String,
    pub description: String,
    pub keywords: Vec<String>,
}

impl AgentDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            keywords: Vec::new(),
        }
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }
}

impl From<&AgentConfig> for AgentDescriptor {
    fn from(config: &AgentConfig) -> Self {
        Self::new(config.name.clone(), config.description.clone())
            .with_keywords(config.keywords.iter().cloned())
    }
}

/// Who spoke a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// One prior turn of a conversation
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConversationTurn {
    pub role: Role,
    /// Agent that produced the turn (agent turns only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            agent: None,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn agent(agent: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            agent: Some(agent.into()),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

pub const DEFAULT_USER_ID: &str = "default_user";
pub const DEFAULT_SESSION_ID: &str = "default_session";

/// A single turn handed to the router and on to the selected agent
///
/// The input is passed through unmodified; agents never see the
/// classification prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRequest {
    pub input: String,
    pub user_id: String,
    pub session_id: String,
    pub history: Vec<ConversationTurn>,
    pub params: HashMap<String, String>,
}

impl AgentRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            user_id: DEFAULT_USER_ID.to_string(),
            session_id: DEFAULT_SESSION_ID.to_string(),
            history: Vec::new(),
            params: HashMap::new(),
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }
}

/// Infrastructure failures of an agent handler
///
/// Unrecognized commands are not errors: agents answer those with a
/// user-facing string.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Backend(#[from] LlmError),

    #[error("Task store failed: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("Failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt state file {path}: {source}")]
    State {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl AgentError {
    /// Returns true if a fresh attempt may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            AgentError::Backend(e) => e.is_retryable(),
            AgentError::Search(e) => e.is_retryable(),
            AgentError::Storage(_) | AgentError::Io { .. } | AgentError::State { .. } => false,
        }
    }
}

/// Capability contract every persona implements
#[async_trait]
pub trait Agent: Send + Sync {
    /// Descriptor rendered into the classification prompt
    fn descriptor(&self) -> &AgentDescriptor;

    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Produce the reply for one conversation turn
    async fn handle(&self, request: &AgentRequest) -> Result<String, AgentError>;
}

/// Build the configured roster, in configuration order
///
/// SchruteBot and JimsterAgent share one task store, opened once.
pub fn build_agents(
    config: &Config,
    llm: Arc<dyn CompletionClient>,
) -> Result<Vec<Arc<dyn Agent>>, AgentError> {
    let mut task_store: Option<TaskStore> = None;
    let mut open_task_store = || -> Result<TaskStore, AgentError> {
        if let Some(store) = &task_store {
            return Ok(store.clone());
        }
        let store = TaskStore::open(&config.tasks.database_path)?;
        task_store = Some(store.clone());
        Ok(store)
    };

    let mut agents: Vec<Arc<dyn Agent>> = Vec::with_capacity(config.agents.len());
    for agent_config in &config.agents {
        let descriptor = AgentDescriptor::from(agent_config);
        let agent: Arc<dyn Agent> = match agent_config.persona {
            Persona::Coding => Arc::new(DarrylAgent::new(descriptor, llm.clone())),
            Persona::Tasks => Arc::new(SchruteBot::new(descriptor, open_task_store()?)),
            Persona::Pranks => Arc::new(JimsterAgent::load(
                descriptor,
                llm.clone(),
                open_task_store()?,
                config.pranks.settings_path.clone(),
            )?),
            Persona::Research => {
                let search = search::from_config(&config.research);
                Arc::new(
                    OscarAgent::new(descriptor, llm.clone(), search)
                        .with_max_subtopics(config.research.max_subtopics),
                )
            }
            Persona::Reception => Arc::new(PamAgent::load(
                descriptor,
                config.reception.state_path.clone(),
            )?),
        };

        tracing::debug!(
            agent = %agent.name(),
            persona = ?agent_config.persona,
            "Built agent"
        );
        agents.push(agent);
    }

    Ok(agents)
}
