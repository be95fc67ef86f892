//! SerpAPI Google News adapter.

use super::provider::{parse_published, NewsItem, NewsProvider};
use crate::provider::http::{build_client, decode_json, read_body, send_failure};
use crate::provider::{CircuitBreaker, KeyRing, ProviderFailure, ProviderResult};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const NAME: &str = "serpapi";
const DEFAULT_BASE_URL: &str = "https://serpapi.com/search.json";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    news_results: Vec<NewsResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    date: Option<String>,
    /// Story clusters carry their articles here instead of at top level.
    #[serde(default)]
    stories: Vec<NewsResult>,
}

pub struct SerpApiProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    keys: KeyRing,
    base_url: String,
}

impl SerpApiProvider {
    pub fn new(
        keys: KeyRing,
        timeout: Duration,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout)?,
            circuit_breaker,
            keys,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

fn flatten(results: Vec<NewsResult>, out: &mut Vec<NewsItem>) {
    for r in results {
        if let (Some(title), Some(link)) = (r.title, r.link) {
            out.push(NewsItem {
                title,
                url: link,
                published: r.date.as_deref().and_then(parse_published),
                snippet: r.snippet.unwrap_or_default(),
                source: NAME.to_string(),
                relevant: false,
            });
        }
        flatten(r.stories, out);
    }
}

pub fn parse_results(body: &str) -> ProviderResult<Vec<NewsItem>> {
    let resp: SearchResponse = decode_json(NAME, body)?;
    if let Some(err) = resp.error {
        let lower = err.to_ascii_lowercase();
        return Err(if lower.contains("api key") {
            ProviderFailure::unavailable(NAME, err)
        } else if lower.contains("run out of searches") || lower.contains("rate") {
            ProviderFailure::rate_limited(NAME, err)
        } else if lower.contains("hasn't returned any results") {
            ProviderFailure::empty(NAME, err)
        } else {
            ProviderFailure::malformed(NAME, err)
        });
    }
    let mut items = Vec::new();
    flatten(resp.news_results, &mut items);
    if items.is_empty() {
        return Err(ProviderFailure::empty(NAME, "no news results"));
    }
    Ok(items)
}

impl NewsProvider for SerpApiProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn is_available(&self) -> bool {
        !self.keys.is_empty() && self.circuit_breaker.is_allowed()
    }

    fn unavailability(&self) -> ProviderFailure {
        if self.keys.is_empty() {
            return ProviderFailure::unavailable(NAME, "SERPAPI_API_KEYS not set");
        }
        self.circuit_breaker
            .open_failure(NAME)
            .unwrap_or_else(|| ProviderFailure::unavailable(NAME, "circuit open"))
    }

    fn search(&self, query: &str, max_results: usize) -> ProviderResult<Vec<NewsItem>> {
        let key = self
            .keys
            .next_key()
            .ok_or_else(|| ProviderFailure::unavailable(NAME, "SERPAPI_API_KEYS not set"))?;
        debug!(provider = NAME, query, "searching");

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("engine", "google_news"),
                ("q", query),
                ("hl", "zh-cn"),
                ("gl", "cn"),
                ("api_key", key),
            ])
            .send()
            .map_err(|e| send_failure(NAME, &e, &self.circuit_breaker))?;
        let text = read_body(NAME, resp, &self.circuit_breaker)?;
        let mut items = parse_results(&text)?;
        self.circuit_breaker.record_success();
        items.truncate(max_results);
        Ok(items)
    }
}
