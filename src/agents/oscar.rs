//! OscarAgent: research summaries
//!
//! A query is split into subtopics by the LLM, each subtopic is searched when
//! a [`SearchProvider`] is configured, and the findings are summarized in
//! Oscar's voice. Without a provider the summary comes from the LLM alone.

use super::search::{SearchHit, SearchProvider};
use super::{Agent, AgentDescriptor, AgentError, AgentRequest};
use crate::llm::{CompletionClient, parse_structured};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

const DEFAULT_MAX_SUBTOPICS: usize = 5;

pub const VAGUE_QUERY_REPLY: &str =
    "I'm going to need a more specific query. I can't work with vague prompts.";
pub const NO_RESULTS_REPLY: &str =
    "No substantial results were found. Might I suggest refining your query?";

pub struct OscarAgent {
    descriptor: AgentDescriptor,
    llm: Arc<dyn CompletionClient>,
    search: Option<Arc<dyn SearchProvider>>,
    max_subtopics: usize,
}

impl OscarAgent {
    pub fn new(
        descriptor: AgentDescriptor,
        llm: Arc<dyn CompletionClient>,
        search: Option<Arc<dyn SearchProvider>>,
    ) -> Self {
        Self {
            descriptor,
            llm,
            search,
            max_subtopics: DEFAULT_MAX_SUBTOPICS,
        }
    }

    /// Cap the number of subtopics searched per query (at least one)
    pub fn with_max_subtopics(mut self, max_subtopics: usize) -> Self {
        self.max_subtopics = max_subtopics.max(1);
        self
    }

    async fn subtopics(&self, query: &str) -> Result<Vec<String>, AgentError> {
        let prompt = format!(
            "Break the following research question into at most {} focused web search \
             queries.\nRespond with a JSON array of strings only.\n\nQuestion: {}",
            self.max_subtopics, query
        );
        let raw = self.llm.complete(&prompt).await?;

        let mut topics: Vec<String> = parse_structured::<Vec<String>>(&raw)
            .ok()
            .unwrap_or_default()
            .into_iter()
            .map(|topic| topic.trim().to_string())
            .filter(|topic| !topic.is_empty())
            .collect();
        let mut seen = HashSet::new();
        topics.retain(|topic| seen.insert(topic.to_lowercase()));
        topics.truncate(self.max_subtopics);

        if topics.is_empty() {
            tracing::debug!("No usable subtopics, searching the query itself");
            topics.push(query.to_string());
        }
        Ok(topics)
    }

    async fn gather(
        &self,
        search: &dyn SearchProvider,
        topics: &[String],
    ) -> Result<Vec<SearchHit>, AgentError> {
        let mut hits: Vec<SearchHit> = Vec::new();
        let mut last_error = None;

        for topic in topics {
            match search.search(topic).await {
                Ok(found) => {
                    for hit in found {
                        if !hits.iter().any(|seen| seen.url == hit.url) {
                            hits.push(hit);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, subtopic = %topic, "Subtopic search failed");
                    last_error = Some(e);
                }
            }
        }

        // Every search failing is an error; partial failures still produce findings
        match last_error {
            Some(e) if hits.is_empty() => Err(e.into()),
            _ => Ok(hits),
        }
    }

    async fn summarize(&self, query: &str, hits: &[SearchHit]) -> Result<String, AgentError> {
        let material = if hits.is_empty() {
            format!("Research question: {}", query)
        } else {
            let sources: Vec<String> = hits
                .iter()
                .map(|hit| format!("{} ({})\n{}", hit.title, hit.url, hit.snippet))
                .collect();
            format!("Research question: {}\n\n{}", query, sources.join("\n\n"))
        };

        let prompt = format!(
            "You are Oscar Martinez from The Office. You are intelligent, precise, and \
             sometimes condescending in a subtle way.\nSummarize the following information in \
             a professional and informative tone, with occasional hints of intellectual \
             superiority:\n\n{}\n\nSummary:",
            material
        );
        Ok(self.llm.complete(&prompt).await?.trim().to_string())
    }
}

#[async_trait]
impl Agent for OscarAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn handle(&self, request: &AgentRequest) -> Result<String, AgentError> {
        let query = request.input.trim();
        if query.is_empty() {
            return Ok(VAGUE_QUERY_REPLY.to_string());
        }

        let hits = match &self.search {
            Some(search) => {
                let topics = self.subtopics(query).await?;
                let hits = self.gather(search.as_ref(), &topics).await?;
                tracing::debug!(subtopics = topics.len(), hits = hits.len(), "Research gathered");
                if hits.is_empty() {
                    return Ok(NO_RESULTS_REPLY.to_string());
                }
                hits
            }
            None => Vec::new(),
        };

        let summary = self.summarize(query, &hits).await?;
        if summary.is_empty() {
            return Ok(NO_RESULTS_REPLY.to_string());
        }
        Ok(format!("Oscar's Findings:\n\n{}", summary))
    }
}
