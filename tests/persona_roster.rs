//! The default roster built from configuration
//!
//! Persona state goes to a temp directory. SchruteBot and JimsterAgent share
//! the task database; state survives rebuilding the roster.

mod common;

use common::{MINIMAL_CONFIG, ScriptedClient};
use dunder::agents::{Agent, AgentRequest, TaskStore, build_agents};
use dunder::config::Config;
use dunder::llm::CompletionClient;
use dunder::router::AgentRegistry;
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;

fn office_config(dir: &TempDir) -> Config {
    let mut config = Config::from_str(MINIMAL_CONFIG).expect("config should parse");
    config.tasks.database_path = dir.path().join("schrutebot.db");
    config.pranks.settings_path = dir.path().join("jimster.json");
    config.reception.state_path = dir.path().join("pam_state.json");
    config.research.search_url = None;
    config
}

fn registry(config: &Config, llm: Arc<dyn CompletionClient>) -> AgentRegistry {
    let agents = build_agents(config, llm).expect("roster should build");
    AgentRegistry::with_agents(agents).expect("roster should register")
}

async fn ask(registry: &AgentRegistry, agent: &str, input: &str) -> String {
    registry
        .get(agent)
        .unwrap_or_else(|| panic!("{} should be registered", agent))
        .handle(&AgentRequest::new(input))
        .await
        .expect("agent should reply")
}

#[tokio::test]
async fn test_default_roster_order() {
    let dir = TempDir::new().expect("temp dir");
    let registry = registry(&office_config(&dir), Arc::new(ScriptedClient::new(Vec::new())));

    let names: Vec<String> = registry
        .snapshot()
        .iter()
        .map(|agent| agent.name().to_string())
        .collect();
    assert_eq!(
        names,
        ["DarrylAgent", "SchruteBot", "JimsterAgent", "OscarAgent", "PamAgent"]
    );
}

#[tokio::test]
async fn test_tasks_persist_across_rebuilds() {
    let dir = TempDir::new().expect("temp dir");
    let config = office_config(&dir);

    {
        let registry = registry(&config, Arc::new(ScriptedClient::new(Vec::new())));
        let reply = ask(&registry, "SchruteBot", "add task: order more paper").await;
        assert!(reply.starts_with("Task added: order more paper."));
        let reply = ask(&registry, "SchruteBot", "add task: order more paper").await;
        assert!(reply.contains("already on the list"));
        ask(&registry, "SchruteBot", "complete task order more paper").await;
    }

    let store = TaskStore::open(&config.tasks.database_path).expect("store should reopen");
    let tasks = store.list().await.expect("list");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].description, "order more paper");
    assert_eq!(tasks[0].status, "completed");
    assert_eq!(store.completed_count().await.expect("count"), 1);
}

#[tokio::test]
async fn test_jim_sees_schrutes_tasks_and_leaves_them_alone() {
    let dir = TempDir::new().expect("temp dir");
    let config = office_config(&dir);
    // Prank dictionary, then nothing else asked of the LLM
    let llm = Arc::new(ScriptedClient::answering(&[r#"{"stapler": "jello"}"#]));
    let registry = registry(&config, llm);

    ask(&registry, "SchruteBot", "add task: find my stapler").await;
    let reply = ask(&registry, "JimsterAgent", "prank my tasks").await;

    assert!(reply.starts_with("Here's the task list. Totally unchanged, I promise."));
    let store = TaskStore::open(&config.tasks.database_path).expect("store should reopen");
    let tasks = store.list().await.expect("list");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].description, "find my stapler");
}

#[tokio::test]
async fn test_prank_mode_survives_rebuild() {
    let dir = TempDir::new().expect("temp dir");
    let config = office_config(&dir);

    {
        let registry = registry(&config, Arc::new(ScriptedClient::new(Vec::new())));
        let reply = ask(&registry, "JimsterAgent", "toggle prank mode").await;
        assert_eq!(reply, "Jimster's Prank Mode is now OFF!");
    }

    let registry = registry(&config, Arc::new(ScriptedClient::new(Vec::new())));
    let reply = ask(&registry, "JimsterAgent", "what's the prank status?").await;
    assert!(reply.starts_with("Prank mode is OFF."));
}

#[tokio::test]
async fn test_pam_directory_survives_rebuild() {
    let dir = TempDir::new().expect("temp dir");
    let config = office_config(&dir);

    {
        let registry = registry(&config, Arc::new(ScriptedClient::new(Vec::new())));
        let reply = ask(&registry, "PamAgent", "register Ryan as temp").await;
        assert!(reply.contains("Welcome to Dunder Mifflin, Ryan!"));
    }

    let registry = registry(&config, Arc::new(ScriptedClient::new(Vec::new())));
    let reply = ask(&registry, "PamAgent", "register Ryan as temp").await;
    assert!(reply.contains("Ryan is already registered."));
}

#[tokio::test]
async fn test_corrupt_prank_settings_fail_the_build() {
    let dir = TempDir::new().expect("temp dir");
    let config = office_config(&dir);
    std::fs::write(&config.pranks.settings_path, "{ not json").expect("write settings");

    let result = build_agents(&config, Arc::new(ScriptedClient::new(Vec::new())));

    assert!(result.is_err());
}
