//! # Web Search
//!
//! Query-in, ranked-hits-out clients. Google Custom Search is the primary
//! backend; SearXNG covers self-hosted and public metasearch instances.

use crate::error::SearchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single ranked search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

impl SearchHit {
    pub fn new(
        title: impl Into<String>,
        snippet: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            snippet: snippet.into(),
            url: url.into(),
        }
    }
}

/// Web search service
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Return up to `count` ranked hits. An empty result set is an error.
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>, SearchError>;
}

const GOOGLE_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// Google Programmable Search (Custom Search JSON API)
pub struct GoogleCustomSearch {
    api_key: String,
    cx: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    items: Vec<GoogleItem>,
}

#[derive(Deserialize)]
struct GoogleItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: Option<String>,
}

impl GoogleCustomSearch {
    pub const API_KEY_ENV: &'static str = "GOOGLE_CUSTOM_SEARCH_API_KEY";
    pub const CX_ENV: &'static str = "GOOGLE_CUSTOM_SEARCH_CX";

    pub fn new(api_key: impl Into<String>, cx: impl Into<String>) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder()
            .user_agent("deepsearch/0.1")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            api_key: api_key.into(),
            cx: cx.into(),
            http,
        })
    }

    /// Build from `GOOGLE_CUSTOM_SEARCH_API_KEY` and `GOOGLE_CUSTOM_SEARCH_CX`
    pub fn from_env() -> Result<Self, SearchError> {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        match (read(Self::API_KEY_ENV), read(Self::CX_ENV)) {
            (Some(key), Some(cx)) => Self::new(key, cx),
            _ => Err(SearchError::MissingCredentials(format!(
                "{} and {}",
                Self::API_KEY_ENV,
                Self::CX_ENV
            ))),
        }
    }

    fn request_url(&self, query: &str, count: usize) -> String {
        // The API serves at most 10 results per page
        let num = count.clamp(1, 10);
        format!(
            "{}?key={}&cx={}&q={}&num={}",
            GOOGLE_ENDPOINT,
            urlencoding::encode(&self.api_key),
            urlencoding::encode(&self.cx),
            urlencoding::encode(query),
            num
        )
    }
}

#[async_trait]
impl SearchClient for GoogleCustomSearch {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>, SearchError> {
        let response = self.http.get(self.request_url(query, count)).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GoogleResponse = response.json().await?;
        let hits: Vec<SearchHit> = parsed
            .items
            .into_iter()
            .map(|item| SearchHit {
                title: item.title,
                snippet: item.snippet.unwrap_or_else(|| "No snippet".to_string()),
                url: item.link,
            })
            .collect();

        if hits.is_empty() {
            return Err(SearchError::NoResults {
                query: query.to_string(),
            });
        }
        Ok(hits)
    }
}

/// SearXNG metasearch, tried across several instances in order
pub struct SearxngSearch {
    endpoints: Vec<String>,
    http: reqwest::Client,
}

impl SearxngSearch {
    pub const URL_ENV: &'static str = "SEARXNG_URL";

    /// Build the endpoint list:
    /// 1. explicit URL (or `SEARXNG_URL`)
    /// 2. public instances
    /// 3. local fallback
    pub fn new(custom_url: Option<&str>) -> Result<Self, SearchError> {
        let mut endpoints: Vec<String> = Vec::new();

        let custom = custom_url
            .map(str::to_string)
            .or_else(|| std::env::var(Self::URL_ENV).ok());
        if let Some(url) = custom.filter(|u| !u.trim().is_empty()) {
            endpoints.push(format!("{}/search", url.trim_end_matches('/')));
        }

        // Full list: https://searx.space/
        endpoints.extend([
            "https://searx.be/search".to_string(),
            "https://search.sapti.me/search".to_string(),
            "https://searx.tiekoetter.com/search".to_string(),
        ]);

        endpoints.push("http://localhost:8888/search".to_string());
        endpoints.push("http://127.0.0.1:8888/search".to_string());

        Self::with_endpoints(endpoints)
    }

    /// Use exactly these `/search` endpoints
    pub fn with_endpoints(endpoints: Vec<String>) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder()
            .user_agent("deepsearch/0.1")
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { endpoints, http })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }
}

/// Map a SearXNG JSON payload to hits
fn searxng_hits(json: &serde_json::Value, count: usize) -> Vec<SearchHit> {
    json.get("results")
        .and_then(|r| r.as_array())
        .map(|results| {
            results
                .iter()
                .take(count)
                .map(|r| SearchHit {
                    title: r
                        .get("title")
                        .and_then(|t| t.as_str())
                        .unwrap_or("")
                        .to_string(),
                    snippet: r
                        .get("content")
                        .and_then(|c| c.as_str())
                        .filter(|c| !c.is_empty())
                        .unwrap_or("No snippet")
                        .to_string(),
                    url: r
                        .get("url")
                        .and_then(|u| u.as_str())
                        .unwrap_or("")
                        .to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Tracks the fallback across SearXNG instances
#[derive(Debug, Default)]
struct EndpointFallback {
    last_error: Option<SearchError>,
    answered_empty: bool,
}

impl EndpointFallback {
    /// Returns the hits once an instance has some
    fn record(&mut self, attempt: Result<Vec<SearchHit>, SearchError>) -> Option<Vec<SearchHit>> {
        match attempt {
            Ok(hits) if !hits.is_empty() => Some(hits),
            Ok(_) => {
                self.answered_empty = true;
                self.last_error = None;
                None
            }
            Err(e) => {
                self.last_error = Some(e);
                None
            }
        }
    }

    /// An instance that answered with nothing outranks transport errors
    fn finish(self, query: &str) -> SearchError {
        match self.last_error {
            Some(error) if !self.answered_empty => error,
            _ => SearchError::NoResults {
                query: query.to_string(),
            },
        }
    }
}

impl SearxngSearch {
    async fn query_endpoint(
        &self,
        endpoint: &str,
        query: &str,
        count: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let url = format!("{}?q={}&format=json", endpoint, urlencoding::encode(query));
        let response = self.http.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json = response.json::<serde_json::Value>().await?;
        Ok(searxng_hits(&json, count))
    }
}

#[async_trait]
impl SearchClient for SearxngSearch {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>, SearchError> {
        let mut fallback = EndpointFallback::default();

        for endpoint in &self.endpoints {
            let attempt = self.query_endpoint(endpoint, query, count).await;
            if let Err(e) = &attempt {
                tracing::debug!(endpoint = %endpoint, error = %e, "SearXNG endpoint failed");
            }
            if let Some(hits) = fallback.record(attempt) {
                return Ok(hits);
            }
        }

        Err(fallback.finish(query))
    }
}
