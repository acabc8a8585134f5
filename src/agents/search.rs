//! Web search for research requests
//!
//! Speaks the Serper JSON API: POST `{"q", "num"}` with an `X-API-KEY` header,
//! read the `organic` array of `{title, link, snippet}`.

use crate::config::ResearchConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const SEARCH_TIMEOUT_SECONDS: u64 = 30;

/// One organic search result
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SearchHit {
    pub title: String,
    #[serde(rename = "link")]
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    #[error("Search request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("Search API at {url} returned {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("Search API at {url} returned an unreadable body: {message}")]
    Decode { url: String, message: String },
}

impl SearchError {
    /// Network failures, rate limiting and server errors may clear up
    pub fn is_retryable(&self) -> bool {
        match self {
            SearchError::Request { .. } => true,
            SearchError::Status { status, .. } => *status == 429 || *status >= 500,
            SearchError::Decode { .. } => false,
        }
    }
}

/// Source of web results for a query
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError>;
}

#[derive(Serialize)]
struct SearchPayload<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

// Entries without a title or link are skipped rather than failing the whole response
#[derive(Deserialize)]
struct OrganicResult {
    title: Option<String>,
    link: Option<String>,
    #[serde(default)]
    snippet: String,
}

/// [`SearchProvider`] over a Serper-compatible endpoint
pub struct SerperSearch {
    client: reqwest::Client,
    url: String,
    api_key: String,
    max_results: usize,
}

impl SerperSearch {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        max_results: usize,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SEARCH_TIMEOUT_SECONDS))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            max_results,
        })
    }
}

#[async_trait]
impl SearchProvider for SerperSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let payload = SearchPayload {
            q: query,
            num: self.max_results,
        };

        let response = self
            .client
            .post(&self.url)
            .header("X-API-KEY", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SearchError::Request {
                url: self.url.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SearchError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| SearchError::Decode {
            url: self.url.clone(),
            message: e.to_string(),
        })?;

        let hits: Vec<SearchHit> = parsed
            .organic
            .into_iter()
            .filter_map(|r| {
                Some(SearchHit {
                    title: r.title?,
                    url: r.link?,
                    snippet: r.snippet,
                })
            })
            .take(self.max_results)
            .collect();

        tracing::debug!(query_length = query.len(), hits = hits.len(), "Search finished");
        Ok(hits)
    }
}

/// Build the configured search provider, if any
///
/// Research falls back to LLM-only summaries when no URL is configured or the
/// API key variable is unset.
pub fn from_config(config: &ResearchConfig) -> Option<Arc<dyn SearchProvider>> {
    let url = config.search_url.as_deref()?;
    let Ok(api_key) = std::env::var(&config.api_key_env) else {
        tracing::warn!(
            api_key_env = %config.api_key_env,
            "research.search_url is set but the API key variable is not, searching disabled"
        );
        return None;
    };

    match SerperSearch::new(url, api_key, config.max_results) {
        Ok(search) => Some(Arc::new(search)),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to build search client, searching disabled");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_search_parses_organic_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("X-API-KEY", "beets"))
            .and(body_partial_json(json!({"q": "paper prices", "num": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organic": [
                    {"title": "Paper index", "link": "https://example.com/a", "snippet": "Up 3%"},
                    {"title": "No link"},
                    {"title": "Pulp report", "link": "https://example.com/b"},
                    {"title": "Extra", "link": "https://example.com/c", "snippet": "cut"}
                ]
            })))
            .mount(&server)
            .await;

        let search = SerperSearch::new(format!("{}/search", server.uri()), "beets", 2)
            .expect("client should build");
        let hits = search.search("paper prices").await.expect("search should succeed");

        assert_eq!(
            hits,
            vec![
                SearchHit {
                    title: "Paper index".to_string(),
                    url: "https://example.com/a".to_string(),
                    snippet: "Up 3%".to_string(),
                },
                SearchHit {
                    title: "Pulp report".to_string(),
                    url: "https://example.com/b".to_string(),
                    snippet: String::new(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_search_maps_status_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let search =
            SerperSearch::new(server.uri(), "beets", 5).expect("client should build");
        let err = search.search("anything").await.expect_err("should fail");

        assert!(matches!(err, SearchError::Status { status: 503, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_organic_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"searchParameters": {}})))
            .mount(&server)
            .await;

        let search =
            SerperSearch::new(server.uri(), "beets", 5).expect("client should build");
        let hits = search.search("anything").await.expect("search should succeed");
        assert!(hits.is_empty());
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        let err = SearchError::Status {
            url: "https://google.serper.dev/search".to_string(),
            status: 403,
            body: "bad key".to_string(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_no_provider_without_url() {
        assert!(from_config(&ResearchConfig::default()).is_none());
    }
}
