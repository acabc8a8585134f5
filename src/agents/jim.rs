//! JimsterAgent: pranks on SchruteBot's task list
//!
//! Settings live in a small JSON file. Pranking rewrites a random share of
//! task descriptions through an LLM-invented word substitution dictionary and
//! sometimes slips in a fake task. The stored tasks are never modified; only
//! the listing Jim shows is.

use super::schrute::TaskStore;
use super::{Agent, AgentDescriptor, AgentError, AgentRequest, Role};
use crate::llm::{CompletionClient, StructuredOutput, parse_structured};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Turns of history included in small-talk prompts
const HISTORY_TURNS: usize = 6;

/// Jim's persisted settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PrankSettings {
    #[serde(default = "default_prank_mode")]
    pub prank_mode: bool,
    #[serde(default = "default_prank_probability")]
    pub prank_probability: f64,
    #[serde(default = "default_fake_task_probability")]
    pub fake_task_probability: f64,
}

impl Default for PrankSettings {
    fn default() -> Self {
        Self {
            prank_mode: default_prank_mode(),
            prank_probability: default_prank_probability(),
            fake_task_probability: default_fake_task_probability(),
        }
    }
}

fn default_prank_mode() -> bool {
    true
}

fn default_prank_probability() -> f64 {
    0.3
}

fn default_fake_task_probability() -> f64 {
    0.1
}

impl PrankSettings {
    /// Read settings from `path`; a missing file means defaults
    pub fn load(path: &Path) -> Result<Self, AgentError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No prank settings file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(AgentError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };

        serde_json::from_str(&content).map_err(|source| AgentError::State {
            path: path.display().to_string(),
            source,
        })
    }

    async fn save(&self, path: &Path) -> Result<(), AgentError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| AgentError::State {
            path: path.display().to_string(),
            source,
        })?;
        tokio::fs::write(path, json)
            .await
            .map_err(|source| AgentError::Io {
                path: path.display().to_string(),
                source,
            })
    }
}

/// What Jim was asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrankCommand {
    Toggle,
    Status,
    PrankTasks,
    Chat,
}

impl PrankCommand {
    fn parse(input: &str) -> Self {
        let lowered = input.to_lowercase();
        if lowered.contains("toggle") || lowered.contains("turn prank") {
            PrankCommand::Toggle
        } else if lowered.contains("prank") && lowered.contains("task") {
            PrankCommand::PrankTasks
        } else if lowered.contains("prank mode") || lowered.contains("prank status") {
            PrankCommand::Status
        } else {
            PrankCommand::Chat
        }
    }
}

/// Replace every word found in `dictionary` (case-insensitive keys)
pub fn prank_description(description: &str, dictionary: &HashMap<String, String>) -> String {
    description
        .split_whitespace()
        .map(|word| {
            dictionary
                .get(&word.to_lowercase())
                .map(String::as_str)
                .unwrap_or(word)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct JimsterAgent {
    descriptor: AgentDescriptor,
    llm: Arc<dyn CompletionClient>,
    tasks: TaskStore,
    settings_path: PathBuf,
    settings: Mutex<PrankSettings>,
}

impl JimsterAgent {
    /// Create the agent, reading settings from `settings_path`
    pub fn load(
        descriptor: AgentDescriptor,
        llm: Arc<dyn CompletionClient>,
        tasks: TaskStore,
        settings_path: PathBuf,
    ) -> Result<Self, AgentError> {
        let settings = PrankSettings::load(&settings_path)?;
        Ok(Self {
            descriptor,
            llm,
            tasks,
            settings_path,
            settings: Mutex::new(settings),
        })
    }

    pub async fn settings(&self) -> PrankSettings {
        self.settings.lock().await.clone()
    }

    async fn toggle(&self) -> Result<String, AgentError> {
        let mut settings = self.settings.lock().await;
        let updated = PrankSettings {
            prank_mode: !settings.prank_mode,
            ..settings.clone()
        };
        updated.save(&self.settings_path).await?;
        *settings = updated;
        tracing::info!(prank_mode = settings.prank_mode, "Prank mode toggled");
        Ok(format!(
            "Jimster's Prank Mode is now {}!",
            if settings.prank_mode { "ON" } else { "OFF" }
        ))
    }

    async fn status(&self) -> String {
        let settings = self.settings().await;
        format!(
            "Prank mode is {}. Prank odds: {:.0}%, fake task odds: {:.0}%.",
            if settings.prank_mode { "ON" } else { "OFF" },
            settings.prank_probability * 100.0,
            settings.fake_task_probability * 100.0
        )
    }

    async fn prank_tasks(&self) -> Result<String, AgentError> {
        let settings = self.settings().await;
        let tasks = self.tasks.list().await?;

        if !settings.prank_mode {
            return Ok("Prank mode is off. Dwight's tasks are safe... for now.".to_string());
        }
        if tasks.is_empty() {
            return Ok("No tasks to prank. Dwight must be slipping.".to_string());
        }

        let descriptions: Vec<&str> = tasks.iter().map(|t| t.description.as_str()).collect();
        let dictionary = self.prank_dictionary(&descriptions).await?;

        let mut listing: Vec<(String, String)> = Vec::with_capacity(tasks.len() + 1);
        let mut pranked = 0;
        for task in &tasks {
            let description = if rand::rng().random::<f64>() < settings.prank_probability {
                pranked += 1;
                prank_description(&task.description, &dictionary)
            } else {
                task.description.clone()
            };
            listing.push((description, task.status.clone()));
        }

        if rand::rng().random::<f64>() < settings.fake_task_probability {
            let fake = self.fake_task().await?;
            if !fake.is_empty() {
                listing.push((fake, "pending".to_string()));
            }
        }

        tracing::debug!(
            tasks = tasks.len(),
            pranked = pranked,
            listed = listing.len(),
            "Pranked task list"
        );

        let lines: Vec<String> = listing
            .iter()
            .map(|(description, status)| format!("- {} ({})", description, status))
            .collect();
        Ok(format!(
            "Here's the task list. Totally unchanged, I promise.\n{}",
            lines.join("\n")
        ))
    }

    async fn prank_dictionary(
        &self,
        descriptions: &[&str],
    ) -> Result<HashMap<String, String>, AgentError> {
        let prompt = format!(
            "You are Jim Halpert from The Office. You love pranking Dwight.\n\
             Based on the following task descriptions, generate a humorous word substitution \
             dictionary that makes tasks ridiculous but still recognizable.\n\n\
             Task List:\n{}\n\n\
             Respond with a JSON object only. Example: \
             {{\"meeting\": \"party\", \"report\": \"memoir\", \"presentation\": \"stand-up routine\"}}",
            descriptions.join("\n")
        );

        let raw = self.llm.complete(&prompt).await?;
        let dictionary = match parse_structured::<HashMap<String, String>>(&raw) {
            StructuredOutput::Parsed(dictionary) => dictionary,
            StructuredOutput::Malformed { reason } => {
                tracing::info!(
                    reason = %reason,
                    "Prank dictionary was not valid JSON, pranking nothing"
                );
                HashMap::new()
            }
        };

        Ok(dictionary
            .into_iter()
            .map(|(word, replacement)| (word.to_lowercase(), replacement))
            .collect())
    }

    async fn fake_task(&self) -> Result<String, AgentError> {
        let prompt = "You are Jim Halpert from The Office. Generate a single, absurd fake task \
                      that would confuse Dwight but still seem vaguely plausible.\n\
                      ONLY return the task description, no extra commentary.\n\
                      Example Output:\n\"Hide all of SchruteBot's beets\"";
        let raw = self.llm.complete(prompt).await?;
        Ok(raw.trim().trim_matches('"').trim().to_string())
    }

    async fn chat(&self, request: &AgentRequest) -> Result<String, AgentError> {
        let start = request.history.len().saturating_sub(HISTORY_TURNS);
        let history: Vec<String> = request.history[start..]
            .iter()
            .map(|turn| match turn.role {
                Role::User => format!("User: {}", turn.content),
                Role::Agent => format!(
                    "{}: {}",
                    turn.agent.as_deref().unwrap_or("Agent"),
                    turn.content
                ),
            })
            .collect();

        let prompt = format!(
            "You are Jim Halpert from The Office: laid-back, dry, and always one glance \
             at the camera away from a prank. Reply briefly and in character.\n\n\
             {}User: {}\nJim:",
            if history.is_empty() {
                String::new()
            } else {
                format!("Conversation so far:\n{}\n\n", history.join("\n"))
            },
            request.input.trim()
        );
        Ok(self.llm.complete(&prompt).await?.trim().to_string())
    }
}

#[async_trait]
impl Agent for JimsterAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn handle(&self, request: &AgentRequest) -> Result<String, AgentError> {
        let command = PrankCommand::parse(&request.input);
        tracing::debug!(command = ?command, session_id = %request.session_id, "Jimster command");

        match command {
            PrankCommand::Toggle => self.toggle().await,
            PrankCommand::Status => Ok(self.status().await),
            PrankCommand::PrankTasks => self.prank_tasks().await,
            PrankCommand::Chat => self.chat(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::ConversationTurn;
    use crate::llm::mock::ScriptedClient;

    struct Fixture {
        _dir: tempfile::TempDir,
        settings_path: PathBuf,
        tasks: TaskStore,
    }

    fn fixture(settings: Option<&str>) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings_path = dir.path().join("jimster.json");
        if let Some(settings) = settings {
            std::fs::write(&settings_path, settings).expect("write settings");
        }
        Fixture {
            _dir: dir,
            settings_path,
            tasks: TaskStore::open_memory().expect("in-memory db"),
        }
    }

    fn jim(fixture: &Fixture, client: Arc<ScriptedClient>) -> JimsterAgent {
        JimsterAgent::load(
            AgentDescriptor::new("JimsterAgent", "prankster"),
            client,
            fixture.tasks.clone(),
            fixture.settings_path.clone(),
        )
        .expect("settings should load")
    }

    #[test]
    fn test_prank_description_substitutes_known_words() {
        let dictionary = HashMap::from([
            ("meeting".to_string(), "party".to_string()),
            ("report".to_string(), "memoir".to_string()),
        ]);
        assert_eq!(
            prank_description("Prepare Report for Meeting", &dictionary),
            "Prepare memoir for party"
        );
    }

    #[test]
    fn test_missing_settings_use_defaults() {
        let fixture = fixture(None);
        let settings = PrankSettings::load(&fixture.settings_path).expect("defaults");
        assert_eq!(settings, PrankSettings::default());
        assert!(settings.prank_mode);
        assert_eq!(settings.prank_probability, 0.3);
    }

    #[test]
    fn test_partial_settings_fill_defaults() {
        let fixture = fixture(Some(r#"{"prank_mode": false}"#));
        let settings = PrankSettings::load(&fixture.settings_path).expect("settings");
        assert!(!settings.prank_mode);
        assert_eq!(settings.fake_task_probability, 0.1);
    }

    #[test]
    fn test_corrupt_settings_are_state_error() {
        let fixture = fixture(Some("prank_mode = yes"));
        let err = PrankSettings::load(&fixture.settings_path).expect_err("should fail");
        assert!(matches!(err, AgentError::State { .. }));
    }

    #[tokio::test]
    async fn test_toggle_flips_and_persists() {
        let fixture = fixture(None);
        let agent = jim(&fixture, Arc::new(ScriptedClient::new(Vec::new())));

        let reply = agent
            .handle(&AgentRequest::new("toggle prank mode"))
            .await
            .expect("should reply");
        assert_eq!(reply, "Jimster's Prank Mode is now OFF!");

        let saved = PrankSettings::load(&fixture.settings_path).expect("saved settings");
        assert!(!saved.prank_mode);
        assert_eq!(saved.prank_probability, 0.3);
    }

    #[tokio::test]
    async fn test_failed_toggle_keeps_prank_mode() {
        let fixture = fixture(None);
        let agent = jim(&fixture, Arc::new(ScriptedClient::new(Vec::new())));
        std::fs::create_dir(&fixture.settings_path).expect("create dir over settings file");

        let result = agent.handle(&AgentRequest::new("toggle prank mode")).await;

        assert!(matches!(result, Err(AgentError::Io { .. })));
        assert!(agent.settings().await.prank_mode);
    }

    #[tokio::test]
    async fn test_prank_tasks_rewrites_listing_only() {
        let fixture = fixture(Some(
            r#"{"prank_mode": true, "prank_probability": 1.0, "fake_task_probability": 0.0}"#,
        ));
        fixture.tasks.add("Prepare report").await.expect("add");
        let client = Arc::new(ScriptedClient::answering(
            "Sure!\n```json\n{\"report\": \"memoir\"}\n```",
        ));
        let agent = jim(&fixture, client.clone());

        let reply = agent
            .handle(&AgentRequest::new("prank my tasks"))
            .await
            .expect("should reply");

        assert!(reply.contains("- Prepare memoir (pending)"));
        assert_eq!(client.calls(), 1);
        let stored = fixture.tasks.list().await.expect("list");
        assert_eq!(stored[0].description, "Prepare report");
    }

    #[tokio::test]
    async fn test_prank_tasks_adds_fake_task() {
        let fixture = fixture(Some(
            r#"{"prank_mode": true, "prank_probability": 0.0, "fake_task_probability": 1.0}"#,
        ));
        fixture.tasks.add("Order paper").await.expect("add");
        let client = Arc::new(ScriptedClient::new(vec![
            Ok("{}".to_string()),
            Ok("\"Hide all of SchruteBot's beets\"".to_string()),
        ]));
        let agent = jim(&fixture, client);

        let reply = agent
            .handle(&AgentRequest::new("prank the task list"))
            .await
            .expect("should reply");

        assert!(reply.contains("- Order paper (pending)"));
        assert!(reply.contains("- Hide all of SchruteBot's beets (pending)"));
    }

    #[tokio::test]
    async fn test_malformed_dictionary_pranks_nothing() {
        let fixture = fixture(Some(
            r#"{"prank_mode": true, "prank_probability": 1.0, "fake_task_probability": 0.0}"#,
        ));
        fixture.tasks.add("Prepare report").await.expect("add");
        let agent = jim(
            &fixture,
            Arc::new(ScriptedClient::answering("Bears. Beets. Battlestar Galactica.")),
        );

        let reply = agent
            .handle(&AgentRequest::new("prank my tasks"))
            .await
            .expect("should reply");
        assert!(reply.contains("- Prepare report (pending)"));
    }

    #[tokio::test]
    async fn test_prank_mode_off_leaves_tasks_alone() {
        let fixture = fixture(Some(r#"{"prank_mode": false}"#));
        let client = Arc::new(ScriptedClient::new(Vec::new()));
        let agent = jim(&fixture, client.clone());

        let reply = agent
            .handle(&AgentRequest::new("prank my tasks"))
            .await
            .expect("should reply");
        assert!(reply.contains("Prank mode is off"));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_chat_includes_recent_history() {
        let fixture = fixture(None);
        let client = Arc::new(ScriptedClient::answering("  Bears do not eat beets.  "));
        let agent = jim(&fixture, client.clone());

        let request = AgentRequest::new("what do bears eat?").with_history(vec![
            ConversationTurn::user("hey Jim"),
            ConversationTurn::agent("JimsterAgent", "Hey."),
        ]);
        let reply = agent.handle(&request).await.expect("should reply");

        assert_eq!(reply, "Bears do not eat beets.");
        let prompt = &client.prompts()[0];
        assert!(prompt.contains("User: hey Jim\nJimsterAgent: Hey."));
        assert!(prompt.ends_with("User: what do bears eat?\nJim:"));
    }
}
