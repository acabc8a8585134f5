//! Concurrent routing and registry replacement
//!
//! Routing calls share one orchestrator; the registry may be replaced while
//! they run. Readers must always observe a whole roster, never a mix.

mod common;

use common::{EchoAgent, ScriptedClient};
use dunder::agents::{Agent, AgentRequest};
use dunder::config::{MessagesConfig, RoutingConfig};
use dunder::router::{AgentRegistry, LlmClassifier, Orchestrator, PromptTemplate, RouteOutcome};
use std::sync::Arc;

fn roster(prefix: &str, size: usize) -> Vec<Arc<dyn Agent>> {
    (0..size)
        .map(|i| {
            let agent: Arc<dyn Agent> =
                EchoAgent::new(&format!("{}Agent{}", prefix, i), &format!("{} desk {}", prefix, i));
            agent
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_describe_all_never_sees_a_partial_roster() {
    let registry = Arc::new(AgentRegistry::with_agents(roster("Scranton", 5)).expect("valid"));
    let scranton = registry.describe_all();
    let stamford = AgentRegistry::with_agents(roster("Stamford", 3))
        .expect("valid")
        .describe_all();

    let writer = {
        let registry = registry.clone();
        tokio::spawn(async move {
            for i in 0..200 {
                let prefix = if i % 2 == 0 { "Stamford" } else { "Scranton" };
                let size = if i % 2 == 0 { 3 } else { 5 };
                registry.set_agents(roster(prefix, size)).expect("valid roster");
                tokio::task::yield_now().await;
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let registry = registry.clone();
            let scranton = scranton.clone();
            let stamford = stamford.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    let listing = registry.describe_all();
                    assert!(
                        listing == scranton || listing == stamford,
                        "observed a mixed roster: {}",
                        listing
                    );
                    let snapshot = registry.snapshot();
                    assert!(snapshot.len() == 3 || snapshot.len() == 5);
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    writer.await.expect("writer task");
    for reader in readers {
        reader.await.expect("reader task");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_routes_each_get_a_reply() {
    let darryl = EchoAgent::new("DarrylAgent", "coding assistant");
    let agents: Vec<Arc<dyn Agent>> = vec![darryl.clone()];
    let registry = Arc::new(AgentRegistry::with_agents(agents).expect("valid"));
    let answers: Vec<&str> = std::iter::repeat_n("DarrylAgent", 50).collect();
    let client = Arc::new(ScriptedClient::answering(&answers));
    let classifier = LlmClassifier::new(registry, client.clone(), PromptTemplate::default());
    let orchestrator = Arc::new(Orchestrator::new(
        classifier,
        &RoutingConfig::default(),
        MessagesConfig::default(),
    ));

    let handles: Vec<_> = (0..50)
        .map(|i| {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                let input = format!("write function #{}", i);
                let response = orchestrator.route(&AgentRequest::new(input.clone())).await;
                (input, response)
            })
        })
        .collect();

    for handle in handles {
        let (input, response) = handle.await.expect("route task");
        assert_eq!(response.outcome, RouteOutcome::Dispatched);
        assert_eq!(response.content, format!("DarrylAgent handled: {}", input));
    }
    assert_eq!(client.calls(), 50);
    assert_eq!(darryl.calls(), 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_routing_after_replacement_uses_new_roster() {
    let registry = Arc::new(AgentRegistry::with_agents(roster("Scranton", 2)).expect("valid"));
    let client = Arc::new(ScriptedClient::answering(&["StamfordAgent0"]));
    let classifier =
        LlmClassifier::new(registry.clone(), client.clone(), PromptTemplate::default());
    let orchestrator =
        Orchestrator::new(classifier, &RoutingConfig::default(), MessagesConfig::default());

    registry.set_agents(roster("Stamford", 1)).expect("valid roster");
    let response = orchestrator.route(&AgentRequest::new("hello")).await;

    assert_eq!(response.agent.as_deref(), Some("StamfordAgent0"));
    let prompt = &client.prompts()[0];
    assert!(prompt.contains("- StamfordAgent0: Stamford desk 0"));
    assert!(!prompt.contains("Scranton"));
}
