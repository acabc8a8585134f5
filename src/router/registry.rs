//! Agent registry
//!
//! Holds the agents the classifier may pick from, in registration order.
//! `set_agents` validates the whole new set and publishes it as one immutable
//! snapshot, so a classification in flight sees either the old or the new
//! roster and never a mix of both.

use super::normalize::normalize;
use crate::agents::Agent;
use std::sync::{Arc, RwLock};

/// Listing returned by `describe_all` when no agents are registered
pub const NO_AGENTS_AVAILABLE: &str = "No agents available.";

/// Malformed agent set passed to `set_agents`
///
/// A configuration-time error: callers should fail loudly instead of routing
/// against a partially valid roster.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("agent at position {index} has an empty name")]
    EmptyName { index: usize },

    #[error("agent '{name}' has an empty description")]
    EmptyDescription { name: String },

    #[error("agent name '{name}' is registered more than once")]
    DuplicateName { name: String },
}

/// Immutable view of the registered agents
#[derive(Default)]
pub struct RegistrySnapshot {
    agents: Vec<Arc<dyn Agent>>,
}

impl RegistrySnapshot {
    fn validated(agents: Vec<Arc<dyn Agent>>) -> Result<Self, RegistryError> {
        let mut seen: Vec<String> = Vec::with_capacity(agents.len());
        for (index, agent) in agents.iter().enumerate() {
            let descriptor = agent.descriptor();
            let key = normalize(&descriptor.name);
            if key.is_empty() {
                return Err(RegistryError::EmptyName { index });
            }
            if descriptor.description.trim().is_empty() {
                return Err(RegistryError::EmptyDescription {
                    name: descriptor.name.clone(),
                });
            }
            if seen.contains(&key) {
                return Err(RegistryError::DuplicateName {
                    name: descriptor.name.clone(),
                });
            }
            seen.push(key);
        }
        Ok(Self { agents })
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Agents in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Agent>> {
        self.agents.iter()
    }

    /// Look up an agent by name, ignoring case, whitespace and trailing punctuation
    pub fn get(&self, name: &str) -> Option<Arc<dyn Agent>> {
        let wanted = normalize(name);
        self.agents
            .iter()
            .find(|agent| normalize(agent.name()) == wanted)
            .cloned()
    }

    /// `"- {name}: {description}"` per agent, newline-joined
    pub fn describe_all(&self) -> String {
        if self.agents.is_empty() {
            return NO_AGENTS_AVAILABLE.to_string();
        }
        self.agents
            .iter()
            .map(|agent| {
                let descriptor = agent.descriptor();
                format!("- {}: {}", descriptor.name, descriptor.description)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Replace-on-set registry shared by the classifier and the front ends
#[derive(Default)]
pub struct AgentRegistry {
    current: RwLock<Arc<RegistrySnapshot>>,
}

impl AgentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding `agents`
    pub fn with_agents(agents: Vec<Arc<dyn Agent>>) -> Result<Self, RegistryError> {
        let registry = Self::new();
        registry.set_agents(agents)?;
        Ok(registry)
    }

    /// Replace the whole agent set
    ///
    /// Nothing is replaced when validation fails.
    pub fn set_agents(&self, agents: Vec<Arc<dyn Agent>>) -> Result<(), RegistryError> {
        let snapshot = Arc::new(RegistrySnapshot::validated(agents)?);
        let names: Vec<&str> = snapshot.iter().map(|a| a.name()).collect();
        tracing::info!(agent_count = names.len(), agents = ?names, "Registered agents");

        // Readers holding the previous Arc keep a consistent view until they finish
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = snapshot;
        Ok(())
    }

    /// The current agent set
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn describe_all(&self) -> String {
        self.snapshot().describe_all()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.snapshot().get(name)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
