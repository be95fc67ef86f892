//! Bocha web-search adapter. Tuned for Chinese-language sources.

use super::provider::{parse_published, NewsItem, NewsProvider};
use crate::provider::http::{build_client, decode_json, read_body, send_failure};
use crate::provider::{CircuitBreaker, KeyRing, ProviderFailure, ProviderResult};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const NAME: &str = "bocha";
const DEFAULT_BASE_URL: &str = "https://api.bochaai.com/v1/web-search";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    data: Option<SearchData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchData {
    web_pages: Option<WebPages>,
}

#[derive(Debug, Deserialize)]
struct WebPages {
    #[serde(default)]
    value: Vec<WebPage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebPage {
    name: String,
    url: String,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    date_published: Option<String>,
}

pub struct BochaProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    keys: KeyRing,
    lookback_days: u32,
    base_url: String,
}

impl BochaProvider {
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

    /// Bocha only accepts a few named recency buckets.
    fn freshness(lookback_days: u32) -> &'static str {
        match lookback_days {
            0..=1 => "oneDay",
            2..=7 => "oneWeek",
            8..=31 => "oneMonth",
            32..=366 => "oneYear",
            _ => "noLimit",
        }
    }
}

pub fn parse_results(body: &str) -> ProviderResult<Vec<NewsItem>> {
    let resp: SearchResponse = decode_json(NAME, body)?;
    let msg = resp.msg.unwrap_or_default();
    match resp.code {
        200 => {}
        401 | 403 => return Err(ProviderFailure::unavailable(NAME, format!("code {}: {msg}", resp.code))),
        429 => return Err(ProviderFailure::rate_limited(NAME, msg)),
        c => return Err(ProviderFailure::malformed(NAME, format!("code {c}: {msg}"))),
    }
    let pages = resp
        .data
        .and_then(|d| d.web_pages)
        .map(|w| w.value)
        .unwrap_or_default();
    if pages.is_empty() {
        return Err(ProviderFailure::empty(NAME, "no web pages"));
    }
    Ok(pages
        .into_iter()
        .map(|p| NewsItem {
            title: p.name,
            url: p.url,
            published: p.date_published.as_deref().and_then(parse_published),
            snippet: p.summary.or(p.snippet).unwrap_or_default(),
            source: NAME.to_string(),
            relevant: false,
        })
        .collect())
}

impl NewsProvider for BochaProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn is_available(&self) -> bool {
        !self.keys.is_empty() && self.circuit_breaker.is_allowed()
    }

    fn unavailability(&self) -> ProviderFailure {
        if self.keys.is_empty() {
            return ProviderFailure::unavailable(NAME, "BOCHA_API_KEYS not set");
        }
        self.circuit_breaker
            .open_failure(NAME)
            .unwrap_or_else(|| ProviderFailure::unavailable(NAME, "circuit open"))
    }

    fn search(&self, query: &str, max_results: usize) -> ProviderResult<Vec<NewsItem>> {
        let key = self
            .keys
            .next_key()
            .ok_or_else(|| ProviderFailure::unavailable(NAME, "BOCHA_API_KEYS not set"))?;
        debug!(provider = NAME, query, "searching");

        let body = json!({
            "query": query,
            "freshness": Self::freshness(self.lookback_days),
            "summary": true,
            "count": max_results.clamp(1, 50),
        });
        let resp = self
            .client
            .post(&self.base_url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .map_err(|e| send_failure(NAME, &e, &self.circuit_breaker))?;
        let text = read_body(NAME, resp, &self.circuit_breaker)?;
        let items = parse_results(&text)?;
        self.circuit_breaker.record_success();
        Ok(items)
    }
}
