//! FetchOrchestrator: cache-first, then one pass over adapters in priority order.

use super::cache::{CacheEntry, CacheKey, SeriesCache};
use super::market::MarketDataProvider;
use crate::domain::{DateWindow, PriceSeries, Symbol};
use crate::provider::{FailureKind, ProviderFailure, ProviderResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Every configured adapter failed for this symbol.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("no data for {symbol}: {}", summarize(.causes))]
pub struct DataUnavailable {
    pub symbol: Symbol,
    /// One entry per attempted (or skipped-as-unavailable) adapter, in priority order.
    pub causes: Vec<ProviderFailure>,
}

impl DataUnavailable {
    /// Distinct failure kinds, sorted.
    pub fn kinds(&self) -> Vec<FailureKind> {
        let mut kinds: Vec<FailureKind> = self.causes.iter().map(|c| c.kind).collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    /// True when every adapter that answered reported no rows, which usually
    /// means an invalid or delisted code rather than a transient outage.
    pub fn looks_invalid(&self) -> bool {
        let answered: Vec<_> = self
            .causes
            .iter()
            .filter(|c| c.kind != FailureKind::Unavailable)
            .collect();
        !answered.is_empty() && answered.iter().all(|c| c.kind == FailureKind::EmptyResult)
    }
}

fn summarize(causes: &[ProviderFailure]) -> String {
    if causes.is_empty() {
        return "no adapters configured".to_string();
    }
    causes
        .iter()
        .map(|c| format!("{}={}", c.provider, c.kind))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Source of "now" for freshness decisions.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// A series plus where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub series: PriceSeries,
    /// Adapter name; for cache hits, the adapter that originally produced it.
    pub source: String,
    pub from_cache: bool,
}

pub struct FetchOrchestrator {
    providers: Vec<Arc<dyn MarketDataProvider>>,
    cache: Option<Arc<dyn SeriesCache>>,
    clock: Clock,
}

impl FetchOrchestrator {
    /// `providers` are tried in the order given.
    pub fn new(providers: Vec<Arc<dyn MarketDataProvider>>) -> Self {
        Self {
            providers,
            cache: None,
            clock: system_clock(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn SeriesCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Series for `symbol` over `window`, or every adapter's failure.
    pub fn get_series(&self, symbol: &Symbol, window: &DateWindow) -> Result<PriceSeries, DataUnavailable> {
        self.fetch(symbol, window).map(|f| f.series)
    }

    /// Like `get_series`, also reporting the source.
    pub fn fetch(&self, symbol: &Symbol, window: &DateWindow) -> Result<Fetched, DataUnavailable> {
        let key = CacheKey::new(symbol.clone(), *window);
        let now = (self.clock)();

        if let Some(hit) = self.cache_lookup(&key, now) {
            info!(%symbol, %window, source = %hit.source, "cache hit");
            return Ok(Fetched {
                series: hit.series,
                source: hit.source,
                from_cache: true,
            });
        }

        let mut causes = Vec::new();
        for provider in &self.providers {
            let name = provider.name();
            if !provider.is_available() {
                debug!(%symbol, provider = name, "adapter unavailable, skipping");
                causes.push(provider.unavailability());
                continue;
            }

            match provider.fetch(symbol, window).and_then(|s| validate(name, s, window)) {
                Ok(series) => {
                    info!(%symbol, provider = name, bars = series.len(), "fetched");
                    self.cache_store(&key, &series, name, now);
                    return Ok(Fetched {
                        series,
                        source: name.to_string(),
                        from_cache: false,
                    });
                }
                Err(failure) => {
                    warn!(%symbol, provider = name, kind = %failure.kind, detail = %failure.detail, "adapter failed");
                    causes.push(failure);
                }
            }
        }

        Err(DataUnavailable {
            symbol: symbol.clone(),
            causes,
        })
    }

    fn cache_lookup(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<CacheEntry> {
        let cache = self.cache.as_ref()?;
        match cache.get(key) {
            Ok(Some(entry)) if entry.is_fresh_at(now) && !entry.series.is_empty() => Some(entry),
            Ok(Some(_)) => {
                debug!(%key, "cache entry stale");
                None
            }
            Ok(None) => {
                debug!(%key, "cache miss");
                None
            }
            Err(e) => {
                warn!(%key, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    fn cache_store(&self, key: &CacheKey, series: &PriceSeries, source: &str, now: DateTime<Utc>) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        let entry = CacheEntry {
            key: key.clone(),
            series: series.clone(),
            source: source.to_string(),
            cached_at: now,
        };
        if let Err(e) = cache.put(entry) {
            warn!(%key, error = %e, "cache write failed");
        }
    }
}

/// Non-empty, and every bar inside the requested window.
fn validate(provider: &str, series: PriceSeries, window: &DateWindow) -> ProviderResult<PriceSeries> {
    if series.is_empty() {
        return Err(ProviderFailure::empty(provider, "adapter returned no bars"));
    }
    if let Some(bar) = series.first_outside(window) {
        return Err(ProviderFailure::malformed(
            provider,
            format!("bar dated {} outside {window}", bar.date),
        ));
    }
    Ok(series)
}
