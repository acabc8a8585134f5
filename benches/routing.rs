//! Routing performance benchmarks
//!
//! Measures the non-I/O parts of a routing call: prompt rendering, answer
//! normalization, registry matching and a full classification against an
//! instant completion client. The LLM round trip dominates real routing by
//! orders of magnitude; these numbers bound the overhead around it.
//!
//! Run with: `cargo bench`

use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use dunder::agents::{Agent, AgentDescriptor, AgentError, AgentRequest};
use dunder::config::{Config, default_examples};
use dunder::llm::{CompletionClient, LlmError};
use dunder::router::{
    AgentRegistry, LlmClassifier, PromptTemplate, build_classification_prompt, match_agent,
    normalize, prompt::DEFAULT_PREAMBLE,
};
use std::hint::black_box;
use std::sync::Arc;

struct IdleAgent(AgentDescriptor);

#[async_trait]
impl Agent for IdleAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.0
    }

    async fn handle(&self, request: &AgentRequest) -> Result<String, AgentError> {
        Ok(request.input.clone())
    }
}

/// Answers instantly with a fixed agent name
struct InstantClient(&'static str);

#[async_trait]
impl CompletionClient for InstantClient {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Ok(self.0.to_string())
    }
}

fn roster(size: usize) -> Arc<AgentRegistry> {
    let mut agents: Vec<Arc<dyn Agent>> = [
        ("DarrylAgent", "Coding assistant from the warehouse."),
        ("SchruteBot", "Task manager and productivity enforcer."),
        ("JimsterAgent", "Resident prankster."),
        ("OscarAgent", "Precise, research-driven assistant."),
        ("PamAgent", "Receptionist and coordinator."),
    ]
    .into_iter()
    .map(|(name, description)| {
        let agent: Arc<dyn Agent> = Arc::new(IdleAgent(AgentDescriptor::new(name, description)));
        agent
    })
    .collect();
    for i in agents.len()..size {
        agents.push(Arc::new(IdleAgent(AgentDescriptor::new(
            format!("BranchAgent{}", i),
            format!("Regional branch desk number {}", i),
        ))));
    }
    Arc::new(AgentRegistry::with_agents(agents).expect("bench roster is valid"))
}

/// Prompt rendering with the default few-shot examples
fn bench_prompt_rendering(c: &mut Criterion) {
    let examples = default_examples();
    let mut group = c.benchmark_group("prompt_rendering");

    for size in [5, 50] {
        let listing = roster(size).describe_all();
        group.bench_with_input(BenchmarkId::from_parameter(size), &listing, |b, listing| {
            b.iter(|| {
                build_classification_prompt(
                    black_box("schedule a meeting with Michael tomorrow at 2pm"),
                    listing,
                    &examples,
                )
            });
        });
    }

    group.finish();
}

fn bench_normalize(c: &mut Criterion) {
    let answers = [
        ("exact", "SchruteBot"),
        ("punctuated", "  Schrute Bot.\n"),
        ("chatty", "I think the best agent for this request would be SchruteBot!"),
    ];

    let mut group = c.benchmark_group("normalize");
    for (name, answer) in answers {
        group.bench_with_input(BenchmarkId::from_parameter(name), &answer, |b, answer| {
            b.iter(|| normalize(answer));
        });
    }
    group.finish();
}

/// Exact matching is a linear scan; the miss is the worst case
fn bench_match_agent(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_agent");

    for size in [5, 50] {
        let snapshot = roster(size).snapshot();
        group.bench_with_input(BenchmarkId::new("hit_last", size), &snapshot, |b, snapshot| {
            let wanted = normalize(snapshot.iter().last().map(|a| a.name()).unwrap_or_default());
            b.iter(|| match_agent(black_box(&wanted), snapshot));
        });
        group.bench_with_input(BenchmarkId::new("miss", size), &snapshot, |b, snapshot| {
            b.iter(|| match_agent(black_box("creed"), snapshot));
        });
    }

    group.finish();
}

fn bench_classify(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let classifier = LlmClassifier::new(
        roster(5),
        Arc::new(InstantClient("PamAgent")),
        PromptTemplate::new(DEFAULT_PREAMBLE, default_examples()),
    );

    c.bench_function("classify_instant_llm", |b| {
        b.to_async(&runtime).iter(|| async {
            classifier
                .classify(black_box("remind me to call the client tomorrow"))
                .await
        });
    });
}

/// Startup cost of parsing and validating the configuration
fn bench_config_parsing(c: &mut Criterion) {
    let toml_str = dunder::cli::generate_config_template();

    c.bench_function("config_parsing", |b| {
        b.iter(|| toml_str.parse::<Config>().expect("template parses"));
    });
}

criterion_group!(
    benches,
    bench_prompt_rendering,
    bench_normalize,
    bench_match_agent,
    bench_classify,
    bench_config_parsing,
);
criterion_main!(benches);
