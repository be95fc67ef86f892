//! Market data: adapters, cache, and the FetchOrchestrator.

pub mod cache;
pub mod eastmoney;
pub mod fetch;
pub mod market;
pub mod parquet;
pub mod tushare;
pub mod yahoo;

pub use cache::{same_trading_day, CacheEntry, CacheError, CacheKey, MemoryCache, SeriesCache};
pub use eastmoney::EastMoneyProvider;
pub use fetch::{system_clock, Clock, DataUnavailable, FetchOrchestrator, Fetched};
pub use market::{build_market_providers, MarketDataProvider, MarketProviderKind, MarketSettings};
pub use parquet::{CacheMeta, CacheStatus, CleanReport, ParquetCache};
pub use tushare::TushareProvider;
pub use yahoo::YahooProvider;
