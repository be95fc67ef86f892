//! Series cache seam and same-trading-day freshness.
//!
//! The cache is keyed by `(symbol, window)`. Writes are idempotent per key:
//! the last successful fetch wins, nothing is merged.

use crate::domain::{DateWindow, PriceSeries, Symbol};
use chrono::{DateTime, Utc};
use chrono_tz::Asia::Shanghai;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("cache metadata error: {0}")]
    Meta(String),

    #[error("cache validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub symbol: Symbol,
    pub window: DateWindow,
}

impl CacheKey {
    pub fn new(symbol: Symbol, window: DateWindow) -> Self {
        Self { symbol, window }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbol, self.window)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub series: PriceSeries,
    /// Name of the adapter that produced the series.
    pub source: String,
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Fresh for the rest of the exchange-local calendar day it was written on.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        same_trading_day(self.cached_at, now)
    }
}

/// True when both instants fall on the same calendar day in Asia/Shanghai.
pub fn same_trading_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.with_timezone(&Shanghai).date_naive() == b.with_timezone(&Shanghai).date_naive()
}

/// Persistent store read before and written after every network fetch.
pub trait SeriesCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError>;

    fn put(&self, entry: CacheEntry) -> Result<(), CacheError>;
}

/// In-process cache behind a mutex.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SeriesCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(entry.key.clone(), entry);
        Ok(())
    }
}
