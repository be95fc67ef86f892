//! StockPulse Core: domain types, indicators, provider adapters, cache, and
//! the fetch / search orchestrators.
//!
//! This crate contains the resilient data-acquisition and indicator pipeline:
//! - Domain types (symbols, bars, price series, date windows)
//! - IndicatorEngine: MA, MACD, RSI, bias, volume ratio, price range
//! - Market-data adapters (EastMoney, Tushare, Yahoo) behind one trait
//! - Parquet and in-memory series caches with same-trading-day freshness
//! - FetchOrchestrator (ordered failover) and SearchOrchestrator (parallel merge)

pub mod data;
pub mod domain;
pub mod indicators;
pub mod news;
pub mod provider;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything shared across pipeline workers is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Symbol>();
        require_sync::<domain::Symbol>();
        require_send::<domain::PriceSeries>();
        require_sync::<domain::PriceSeries>();
        require_send::<domain::DateWindow>();
        require_sync::<domain::DateWindow>();

        // Indicator output
        require_send::<indicators::IndicatorSet>();
        require_sync::<indicators::IndicatorSet>();
        require_send::<indicators::IndicatorConfig>();
        require_sync::<indicators::IndicatorConfig>();

        // Orchestrators and caches
        require_send::<data::FetchOrchestrator>();
        require_sync::<data::FetchOrchestrator>();
        require_send::<news::SearchOrchestrator>();
        require_sync::<news::SearchOrchestrator>();
        require_send::<data::ParquetCache>();
        require_sync::<data::ParquetCache>();
        require_send::<data::MemoryCache>();
        require_sync::<data::MemoryCache>();
        require_send::<provider::CircuitBreaker>();
        require_sync::<provider::CircuitBreaker>();

        // Results
        require_send::<data::DataUnavailable>();
        require_sync::<data::DataUnavailable>();
        require_send::<news::NewsBundle>();
        require_sync::<news::NewsBundle>();
    }

    /// Adapters are reachable only through the trait objects the orchestrators hold.
    #[test]
    fn orchestrators_accept_trait_objects() {
        fn _market(p: std::sync::Arc<dyn data::MarketDataProvider>) -> data::FetchOrchestrator {
            data::FetchOrchestrator::new(vec![p])
        }
        fn _news(p: std::sync::Arc<dyn news::NewsProvider>) -> news::SearchOrchestrator {
            news::SearchOrchestrator::new(vec![p])
        }
    }
}
