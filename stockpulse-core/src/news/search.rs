//! SearchOrchestrator: parallel fan-out over news adapters, then merge,
//! dedup, relevance filter, recency sort and cap.
//!
//! Each available adapter gets its own scoped thread, so the fan-out stays
//! parallel no matter how busy the caller's worker pool is. Never fails: when
//! every adapter fails the bundle is empty with `success == false`.

use super::provider::{NewsItem, NewsProvider};
use crate::domain::Symbol;
use crate::provider::{ProviderFailure, ProviderResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsBundle {
    pub symbol: Symbol,
    pub query: String,
    pub items: Vec<NewsItem>,
    /// At least one adapter answered.
    pub success: bool,
    /// Adapters that answered, in priority order.
    pub providers: Vec<String>,
    pub failures: Vec<ProviderFailure>,
}

impl NewsBundle {
    pub fn empty(symbol: Symbol, query: impl Into<String>) -> Self {
        Self {
            symbol,
            query: query.into(),
            items: Vec::new(),
            success: false,
            providers: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Search text for one stock.
pub fn news_query(symbol: &Symbol, display_name: Option<&str>) -> String {
    match display_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("{name} {} 股票 最新消息", symbol.code()),
        None => format!("{} 股票 最新消息", symbol.code()),
    }
}

/// Lowercase, with whitespace and punctuation removed.
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn mentions(item: &NewsItem, needles: &[String]) -> bool {
    let title = item.title.to_lowercase();
    let snippet = item.snippet.to_lowercase();
    needles
        .iter()
        .any(|n| title.contains(n.as_str()) || snippet.contains(n.as_str()))
}

pub struct SearchOrchestrator {
    providers: Vec<Arc<dyn NewsProvider>>,
}

impl SearchOrchestrator {
    pub fn new(providers: Vec<Arc<dyn NewsProvider>>) -> Self {
        Self { providers }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn get_news(&self, symbol: &Symbol, display_name: Option<&str>, max_results: usize) -> NewsBundle {
        let query = news_query(symbol, display_name);
        let mut bundle = NewsBundle::empty(symbol.clone(), query.clone());

        let (available, unavailable): (Vec<_>, Vec<_>) =
            self.providers.iter().partition(|p| p.is_available());
        for p in unavailable {
            bundle.failures.push(p.unavailability());
        }

        // Joined in spawn order, so answers keep provider priority.
        let answers: Vec<(String, ProviderResult<Vec<NewsItem>>)> = thread::scope(|s| {
            let handles: Vec<_> = available
                .iter()
                .map(|p| {
                    let query = query.as_str();
                    (p.name().to_string(), s.spawn(move || p.search(query, max_results)))
                })
                .collect();
            handles
                .into_iter()
                .map(|(name, handle)| {
                    let answer = handle
                        .join()
                        .unwrap_or_else(|_| Err(ProviderFailure::malformed(&name, "adapter panicked")));
                    (name, answer)
                })
                .collect()
        });

        let mut merged = Vec::new();
        for (name, answer) in answers {
            match answer {
                Ok(items) => {
                    debug!(%symbol, provider = %name, items = items.len(), "news adapter answered");
                    bundle.providers.push(name);
                    merged.extend(items);
                }
                Err(failure) => {
                    warn!(%symbol, provider = %name, kind = %failure.kind, detail = %failure.detail, "news adapter failed");
                    bundle.failures.push(failure);
                }
            }
        }
        bundle.success = !bundle.providers.is_empty();
        if !bundle.success {
            warn!(%symbol, "no news adapter succeeded");
            return bundle;
        }

        let fetched = merged.len();
        let mut seen = HashSet::new();
        merged.retain(|item| {
            let mut key = normalize_title(&item.title);
            if key.is_empty() {
                key = item.url.clone();
            }
            seen.insert(key)
        });
        let unique = merged.len();

        let mut needles = vec![symbol.code().to_lowercase()];
        if let Some(name) = display_name.map(str::trim).filter(|n| !n.is_empty()) {
            needles.push(name.to_lowercase());
        }
        for item in &mut merged {
            item.relevant = mentions(item, &needles);
        }
        let relevant = merged.iter().filter(|i| i.relevant).count();
        if relevant > 0 {
            merged.retain(|i| i.relevant);
        } else {
            debug!(%symbol, "relevance filter would empty the bundle, keeping unfiltered items");
        }

        // Stable: undated items keep provider order at the end.
        merged.sort_by(|a, b| match (a.published, b.published) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        merged.truncate(max_results);

        info!(
            %symbol,
            fetched,
            unique,
            relevant,
            kept = merged.len(),
            providers = bundle.providers.len(),
            "news merged"
        );
        bundle.items = merged;
        bundle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_with_and_without_name() {
        let s = Symbol::parse("600519").unwrap();
        assert_eq!(news_query(&s, Some("贵州茅台")), "贵州茅台 600519 股票 最新消息");
        assert_eq!(news_query(&s, None), "600519 股票 最新消息");
        assert_eq!(news_query(&s, Some("  ")), "600519 股票 最新消息");
    }

    #[test]
    fn title_normalization() {
        assert_eq!(normalize_title("Moutai  Hits, Record!"), "moutaihitsrecord");
        assert_eq!(normalize_title("贵州茅台：创新高"), "贵州茅台创新高");
        assert_eq!(normalize_title("贵州茅台 创新高"), normalize_title("贵州茅台：创新高"));
    }

    #[test]
    fn no_providers_is_unsuccessful_empty_bundle() {
        let orch = SearchOrchestrator::new(vec![]);
        let bundle = orch.get_news(&Symbol::parse("600519").unwrap(), None, 5);
        assert!(!bundle.success);
        assert!(bundle.is_empty());
    }
}
