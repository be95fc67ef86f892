//! Tavily search adapter.

use super::provider::{parse_published, NewsItem, NewsProvider};
use crate::provider::http::{build_client, decode_json, read_body, send_failure};
use crate::provider::{CircuitBreaker, KeyRing, ProviderFailure, ProviderResult};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const NAME: &str = "tavily";
const DEFAULT_BASE_URL: &str = "https://api.tavily.com/search";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    published_date: Option<String>,
}

pub struct TavilyProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    keys: KeyRing,
    lookback_days: u32,
    base_url: String,
}

impl TavilyProvider {
    pub fn new(
        keys: KeyRing,
        lookback_days: u32,
        timeout: Duration,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout)?,
            circuit_breaker,
            keys,
            lookback_days,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

pub fn parse_results(body: &str) -> ProviderResult<Vec<NewsItem>> {
    let resp: SearchResponse = decode_json(NAME, body)?;
    if resp.results.is_empty() {
        return Err(ProviderFailure::empty(NAME, "no results"));
    }
    Ok(resp
        .results
        .into_iter()
        .map(|r| NewsItem {
            title: r.title,
            url: r.url,
            published: r.published_date.as_deref().and_then(parse_published),
            snippet: r.content,
            source: NAME.to_string(),
            relevant: false,
        })
        .collect())
}

impl NewsProvider for TavilyProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn is_available(&self) -> bool {
        !self.keys.is_empty() && self.circuit_breaker.is_allowed()
    }

    fn unavailability(&self) -> ProviderFailure {
        if self.keys.is_empty() {
            return ProviderFailure::unavailable(NAME, "TAVILY_API_KEYS not set");
        }
        self.circuit_breaker
            .open_failure(NAME)
            .unwrap_or_else(|| ProviderFailure::unavailable(NAME, "circuit open"))
    }

    fn search(&self, query: &str, max_results: usize) -> ProviderResult<Vec<NewsItem>> {
        let key = self
            .keys
            .next_key()
            .ok_or_else(|| ProviderFailure::unavailable(NAME, "TAVILY_API_KEYS not set"))?;
        debug!(provider = NAME, query, "searching");

        let body = json!({
            "api_key": key,
            "query": query,
            "topic": "news",
            "search_depth": "advanced",
            "days": self.lookback_days,
            "max_results": max_results,
            "include_answer": false,
        });
        let resp = self
            .client
            .post(&self.base_url)
            .json(&body)
            .send()
            .map_err(|e| send_failure(NAME, &e, &self.circuit_breaker))?;
        let text = read_body(NAME, resp, &self.circuit_breaker)?;
        let items = parse_results(&text)?;
        self.circuit_breaker.record_success();
        Ok(items)
    }
}
