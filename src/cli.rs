//! Command-line interface for Dunder
//!
//! Provides argument parsing and subcommand handling for the Dunder binary.

use clap::{Parser, Subcommand};

/// Dunder Mifflin multi-agent assistant
#[derive(Parser)]
#[command(name = "dunder")]
#[command(version)]
#[command(about = "Dunder Mifflin multi-agent assistant")]
#[command(
    long_about = "Dunder routes each message to the office persona best suited to answer it: \
    Darryl writes code, SchruteBot tracks tasks, Jim pranks them, Oscar researches and Pam \
    keeps the calendar. An LLM classifier picks the persona."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Start an interactive chat session in the terminal
    Chat,
    /// Route a single message and print the reply
    Ask {
        /// Message to route
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Send straight to this agent instead of classifying
        #[arg(short, long)]
        agent: Option<String>,
    },
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# Dunder Configuration
# ====================
#
# Only [llm] is required. Every other section shows its default value.

# ─────────────────────────────────────────────────────────────────────────────
# SERVER CONFIGURATION
# ─────────────────────────────────────────────────────────────────────────────

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "127.0.0.1"

# Port to listen on
port = 3000

# ─────────────────────────────────────────────────────────────────────────────
# LLM ENDPOINT
# ─────────────────────────────────────────────────────────────────────────────
#
# Any OpenAI-compatible server. The classifier and every persona share it.
#   - name: Model identifier (ollama: "gemma3:1b", "mistral:7b", ...)
#   - base_url: API base URL (must end with /v1)
#   - max_tokens: Maximum tokens for generation
#   - temperature: Sampling temperature (0.0-2.0)
#   - timeout_seconds: Per-completion timeout (1-300)

[llm]
name = "gemma3:1b"
base_url = "http://localhost:11434/v1"
max_tokens = 1024
temperature = 0.7
timeout_seconds = 60

# ─────────────────────────────────────────────────────────────────────────────
# ROUTING CONFIGURATION
# ─────────────────────────────────────────────────────────────────────────────

[routing]
# Attempts of the whole classify+dispatch sequence (at least 1)
max_retries = 2

# Base delay between attempts in milliseconds, doubled each retry (capped at 30s)
retry_backoff_ms = 100

# Bound on a single classification (1-300)
classification_timeout_seconds = 30

# Hand unmatched messages to a fallback agent instead of apologizing
use_default_agent = false
# default_agent = "PamAgent"

# Few-shot examples rendered into the classification prompt.
# Omit to use the built-in examples for the configured agents.
# [[routing.examples]]
# text = "write code to sort a list"
# agent = "DarrylAgent"

# ─────────────────────────────────────────────────────────────────────────────
# MESSAGES
# ─────────────────────────────────────────────────────────────────────────────

[messages]
classification_error = "Sorry, I couldn't reach anyone in the office to sort that out. Please try again in a moment."
no_agent = "I'm not sure who should handle that. Try rephrasing, or ask for the list of agents."
routing_error = "Something went wrong while handling your request. Please try again."

# ─────────────────────────────────────────────────────────────────────────────
# AGENTS
# ─────────────────────────────────────────────────────────────────────────────
#
# Omit to register the standard roster: DarrylAgent (coding), SchruteBot
# (tasks), JimsterAgent (pranks), OscarAgent (research), PamAgent (reception).
#
# [[agents]]
# persona = "coding"
# name = "DarrylAgent"
# description = "Coding assistant from the warehouse. Writes, debugs and optimizes code."
# keywords = ["code", "debug", "optimize"]

# ─────────────────────────────────────────────────────────────────────────────
# PERSONA STATE
# ─────────────────────────────────────────────────────────────────────────────

[tasks]
# SchruteBot's SQLite task database (shared with JimsterAgent)
database_path = "schrutebot.db"

[pranks]
# JimsterAgent's prank settings
settings_path = "jimster.json"

[research]
# Serper-compatible search endpoint; research summarizes from the LLM alone when unset
# search_url = "https://google.serper.dev/search"
api_key_env = "SERPER_API_KEY"
max_results = 5
max_subtopics = 5

[reception]
# PamAgent's appointments, reminders and directory
state_path = "pam_state.json"

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: "trace", "debug", "info", "warn", "error"
log_level = "info"

# Prometheus metrics are always available at /metrics on the server port
"#
}
