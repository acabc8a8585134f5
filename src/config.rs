//! Configuration management for Dunder
//!
//! Parses TOML configuration files and provides typed access to settings.
//! Only `[llm]` is required; every other section falls back to defaults that
//! describe the standard five-persona office.

use crate::agents::Persona;
use crate::error::{AppError, AppResult};
use crate::router::FewShotExample;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Upper bound for every timeout setting, in seconds
const MAX_TIMEOUT_SECONDS: u64 = 300;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub llm: LlmEndpoint,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
    #[serde(default = "default_agents")]
    pub agents: Vec<AgentConfig>,
    #[serde(default)]
    pub tasks: TasksConfig,
    #[serde(default)]
    pub pranks: PranksConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub reception: ReceptionConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// LLM endpoint configuration
///
/// All fields are private to enforce invariants. Configuration is loaded via
/// deserialization and validated via Config::validate(). After construction,
/// fields cannot be mutated, ensuring validated data remains valid.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmEndpoint {
    name: String,
    base_url: String,
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,
    #[serde(default = "default_temperature")]
    temperature: f32,
    #[serde(default = "default_llm_timeout")]
    timeout_seconds: u64,
}

impl LlmEndpoint {
    /// Get the model name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the endpoint base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the maximum number of tokens to generate
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Get the sampling temperature
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Get the per-completion timeout in seconds
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

fn default_llm_timeout() -> u64 {
    60
}

/// Routing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingConfig {
    /// Attempts of the whole classify+dispatch sequence (at least 1)
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Base backoff between attempts, doubled each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Router-side bound on a single classification
    #[serde(default = "default_classification_timeout")]
    pub classification_timeout_seconds: u64,
    /// Substitute `default_agent` when the classifier names nobody
    #[serde(default)]
    pub use_default_agent: bool,
    #[serde(default)]
    pub default_agent: Option<String>,
    /// Instructional text that opens every classification prompt
    #[serde(default = "default_preamble")]
    pub preamble: String,
    /// Few-shot utterance → agent mappings rendered into the prompt
    ///
    /// Left empty, loading fills in the built-in examples for whichever
    /// configured agents they name.
    #[serde(default)]
    pub examples: Vec<FewShotExample>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            classification_timeout_seconds: default_classification_timeout(),
            use_default_agent: false,
            default_agent: None,
            preamble: default_preamble(),
            examples: Vec::new(),
        }
    }
}

fn default_max_retries() -> usize {
    2
}

fn default_retry_backoff_ms() -> u64 {
    100
}

fn default_classification_timeout() -> u64 {
    30
}

fn default_preamble() -> String {
    crate::router::prompt::DEFAULT_PREAMBLE.to_string()
}

/// Built-in few-shot examples for the standard five-persona roster
pub fn default_examples() -> Vec<FewShotExample> {
    [
        ("write code to sort a list", "DarrylAgent"),
        ("give me python code for binary search", "DarrylAgent"),
        ("how do I write a REST API in FastAPI?", "DarrylAgent"),
        ("debug this script", "DarrylAgent"),
        ("assign a task to Jim", "SchruteBot"),
        ("view my task list", "SchruteBot"),
        ("mark the client proposal as complete", "SchruteBot"),
        ("daily report", "SchruteBot"),
        ("give me a dwight quote", "SchruteBot"),
        ("prank my task list", "JimsterAgent"),
        ("toggle prank mode", "JimsterAgent"),
        ("research how LLMs impact enterprise productivity", "OscarAgent"),
        ("who won the NBA finals?", "OscarAgent"),
        ("schedule a meeting with Michael tomorrow at 2pm", "PamAgent"),
        ("remind me to call the client tomorrow", "PamAgent"),
        ("what's on my calendar today?", "PamAgent"),
    ]
    .into_iter()
    .map(|(text, agent)| FewShotExample::new(text, agent))
    .collect()
}

/// User-facing replies for routing paths that produce no agent answer
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessagesConfig {
    /// Classifier backend failed or timed out
    #[serde(default = "default_classification_error")]
    pub classification_error: String,
    /// Classifier answered with no registered agent
    #[serde(default = "default_no_agent")]
    pub no_agent: String,
    /// The selected agent failed while handling the request
    #[serde(default = "default_routing_error")]
    pub routing_error: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            classification_error: default_classification_error(),
            no_agent: default_no_agent(),
            routing_error: default_routing_error(),
        }
    }
}

fn default_classification_error() -> String {
    "Sorry, I couldn't reach anyone in the office to sort that out. Please try again in a moment."
        .to_string()
}

fn default_no_agent() -> String {
    "I'm not sure who should handle that. Try rephrasing, or ask for the list of agents."
        .to_string()
}

fn default_routing_error() -> String {
    "Something went wrong while handling your request. Please try again.".to_string()
}

/// One registered agent: which persona implementation and how it is described
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    pub persona: Persona,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl AgentConfig {
    fn new(persona: Persona, name: &str, description: &str, keywords: &[&str]) -> Self {
        Self {
            persona,
            name: name.to_string(),
            description: description.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

fn default_agents() -> Vec<AgentConfig> {
    vec![
        AgentConfig::new(
            Persona::Coding,
            "DarrylAgent",
            "Coding assistant from the warehouse. Writes, debugs and optimizes code.",
            &["code", "debug", "optimize", "python", "script"],
        ),
        AgentConfig::new(
            Persona::Tasks,
            "SchruteBot",
            "Task manager and productivity enforcer. Adds, lists and completes tasks, \
             gives the daily report and Dwight quotes.",
            &["task", "todo", "complete", "report", "quote"],
        ),
        AgentConfig::new(
            Persona::Pranks,
            "JimsterAgent",
            "Resident prankster. Toggles prank mode and pranks the task list.",
            &["prank", "joke", "fake task"],
        ),
        AgentConfig::new(
            Persona::Research,
            "OscarAgent",
            "Precise, research-driven assistant. Verifies facts, researches topics and \
             answers general knowledge questions.",
            &["research", "fact", "investigate", "summarize"],
        ),
        AgentConfig::new(
            Persona::Reception,
            "PamAgent",
            "Receptionist and coordinator. Schedules meetings, sets reminders and checks \
             the calendar.",
            &["schedule", "meeting", "remind", "calendar"],
        ),
    ]
}

/// SchruteBot's task database
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TasksConfig {
    #[serde(default = "default_tasks_db")]
    pub database_path: PathBuf,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            database_path: default_tasks_db(),
        }
    }
}

fn default_tasks_db() -> PathBuf {
    PathBuf::from("schrutebot.db")
}

/// Jimster's prank settings file (JSON key-value)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PranksConfig {
    #[serde(default = "default_prank_settings")]
    pub settings_path: PathBuf,
}

impl Default for PranksConfig {
    fn default() -> Self {
        Self {
            settings_path: default_prank_settings(),
        }
    }
}

fn default_prank_settings() -> PathBuf {
    PathBuf::from("jimster.json")
}

/// Oscar's research settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResearchConfig {
    /// Serper-compatible search endpoint; research runs LLM-only when unset
    #[serde(default)]
    pub search_url: Option<String>,
    /// Environment variable holding the search API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_max_subtopics")]
    pub max_subtopics: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            search_url: None,
            api_key_env: default_api_key_env(),
            max_results: default_max_results(),
            max_subtopics: default_max_subtopics(),
        }
    }
}

fn default_api_key_env() -> String {
    "SERPER_API_KEY".to_string()
}

fn default_max_results() -> usize {
    5
}

fn default_max_subtopics() -> usize {
    5
}

/// Pam's appointment book and reminders
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReceptionConfig {
    #[serde(default = "default_reception_state")]
    pub state_path: PathBuf,
}

impl Default for ReceptionConfig {
    fn default() -> Self {
        Self {
            state_path: default_reception_state(),
        }
    }
}

fn default_reception_state() -> PathBuf {
    PathBuf::from("pam_state.json")
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        // Phase 1: Read file (preserves io::Error context)
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|source| AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            })?;

        // Phase 2: Parse TOML (preserves toml::de::Error context)
        let mut config: Self =
            toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            })?;
        config.fill_default_examples();

        // Phase 3: Validate parsed config (provides contextual reason)
        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Validate configuration after parsing
    ///
    /// This is called automatically by `from_file()` and `from_str()`.
    pub fn validate(&self) -> AppResult<()> {
        let llm = &self.llm;

        if llm.name.trim().is_empty() {
            return Err(AppError::Config(
                "llm.name must be a non-empty model identifier (e.g. \"gemma3:1b\")".to_string(),
            ));
        }

        if !llm.base_url.starts_with("http://") && !llm.base_url.starts_with("https://") {
            return Err(AppError::Config(format!(
                "llm.base_url '{}' must start with 'http://' or 'https://'",
                llm.base_url
            )));
        }

        // OpenAI-compatible servers mount the API under /v1 (ollama: http://localhost:11434/v1)
        if !llm.base_url.ends_with("/v1") {
            return Err(AppError::Config(format!(
                "llm.base_url '{}' must end with '/v1' (e.g. 'http://localhost:11434/v1')",
                llm.base_url
            )));
        }

        if llm.max_tokens == 0 {
            return Err(AppError::Config(
                "llm.max_tokens must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&llm.temperature) || llm.temperature.is_nan() {
            return Err(AppError::Config(format!(
                "llm.temperature must be a finite number between 0.0 and 2.0, got {}",
                llm.temperature
            )));
        }

        for (setting, value) in [
            ("llm.timeout_seconds", llm.timeout_seconds),
            (
                "routing.classification_timeout_seconds",
                self.routing.classification_timeout_seconds,
            ),
        ] {
            if value == 0 || value > MAX_TIMEOUT_SECONDS {
                return Err(AppError::Config(format!(
                    "{} must be in (0, {}] seconds, got {}",
                    setting, MAX_TIMEOUT_SECONDS, value
                )));
            }
        }

        if self.routing.max_retries == 0 {
            return Err(AppError::Config(
                "routing.max_retries must be at least 1".to_string(),
            ));
        }

        if self.agents.is_empty() {
            return Err(AppError::Config(
                "No agents configured. Add at least one [[agents]] entry or remove the \
                 section to use the default roster."
                    .to_string(),
            ));
        }

        if self.routing.use_default_agent {
            let Some(default_agent) = self.routing.default_agent.as_deref() else {
                return Err(AppError::Config(
                    "routing.use_default_agent is enabled but routing.default_agent is not set"
                        .to_string(),
                ));
            };
            if !self.has_agent(default_agent) {
                return Err(AppError::Config(format!(
                    "routing.default_agent '{}' does not name a configured agent",
                    default_agent
                )));
            }
        }

        for example in &self.routing.examples {
            if !self.has_agent(example.agent()) {
                return Err(AppError::Config(format!(
                    "routing example \"{}\" maps to unknown agent '{}'",
                    example.text(),
                    example.agent()
                )));
            }
        }

        Ok(())
    }

    fn fill_default_examples(&mut self) {
        if !self.routing.examples.is_empty() {
            return;
        }
        let examples: Vec<FewShotExample> = default_examples()
            .into_iter()
            .filter(|example| self.has_agent(example.agent()))
            .collect();
        self.routing.examples = examples;
    }

    fn has_agent(&self, name: &str) -> bool {
        let wanted = crate::router::normalize(name);
        self.agents
            .iter()
            .any(|agent| crate::router::normalize(&agent.name) == wanted)
    }
}

impl FromStr for Config {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let mut config: Config =
            toml::from_str(toml_str).map_err(|source| AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            })?;
        config.fill_default_examples();

        // Validate config before returning
        config.validate()?;
        Ok(config)
    }
}
