//! Search provider adapter
//!
//! The crawler only needs "run a query, get a ranked list of result URLs".
//! [`SearchClient`] is that seam; [`SerpApiClient`] is the production
//! implementation backed by SerpAPI's Google engine.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the SerpAPI key
pub const API_KEY_ENV: &str = "SERPAPI_KEY";

/// One organic search result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub url: String,

    /// Provider's 1-based position, forwarded as the lead's priority
    pub rank: u32,
}

/// Errors from the search provider
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned HTTP {status}")]
    Status { status: u16 },

    #[error("provider error: {0}")]
    Provider(String),
}

/// A search engine that returns ranked result URLs
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Runs one query, asking for `result_count` results
    async fn search(&self, query: &str, result_count: u32) -> Result<Vec<SearchHit>, SearchError>;

    /// Short provider name for log lines
    fn name(&self) -> &'static str;
}

/// Runs a query, turning any provider failure into zero results
///
/// A single failed query must never abort the run.
pub async fn search_or_empty(
    client: &dyn SearchClient,
    query: &str,
    result_count: u32,
) -> Vec<SearchHit> {
    match client.search(query, result_count).await {
        Ok(hits) => hits,
        Err(e) => {
            tracing::error!("[ERROR] {} for '{}': {}", client.name(), query, e);
            Vec::new()
        }
    }
}

#[derive(Debug, Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    position: Option<u32>,
    link: Option<String>,
}

/// SerpAPI client (Google engine)
pub struct SerpApiClient {
    http: Client,
    api_key: String,
    endpoint: String,
}

impl SerpApiClient {
    pub const DEFAULT_ENDPOINT: &'static str = "https://serpapi.com/search.json";

    pub fn new(api_key: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .build()?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
        })
    }

    /// Points the client at another endpoint (used by tests)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SearchClient for SerpApiClient {
    async fn search(&self, query: &str, result_count: u32) -> Result<Vec<SearchHit>, SearchError> {
        let num = result_count.to_string();
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("api_key", self.api_key.as_str()),
                ("num", num.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
            });
        }

        let body: SerpApiResponse = response.json().await?;
        if let Some(message) = body.error {
            return Err(SearchError::Provider(message));
        }

        Ok(body
            .organic_results
            .into_iter()
            .enumerate()
            .filter_map(|(i, result)| {
                let url = result.link?;
                Some(SearchHit {
                    url,
                    rank: result.position.unwrap_or(i as u32 + 1),
                })
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "SerpAPI"
    }
}
