//! Pipeline: Fetch → Compute ∥ Search → Commentary, per symbol, on a bounded
//! worker pool.
//!
//! The rayon pool holds at most `workers` symbols in flight. Each symbol's
//! news search runs on its own scoped thread beside the fetch, and fans out
//! to its adapters on further scoped threads, so neither waits for a free
//! worker.
//!
//! A symbol fails only when the FetchOrchestrator reports `DataUnavailable`.
//! Indicator computation cannot fail, news degrades to an empty bundle, and
//! commentary errors degrade to `None`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use stockpulse_core::data::{
    build_market_providers, DataUnavailable, FetchOrchestrator, Fetched, ParquetCache,
};
use stockpulse_core::domain::{DateWindow, Symbol, SymbolError};
use stockpulse_core::indicators::{compute, IndicatorConfig, IndicatorSet};
use stockpulse_core::news::{build_news_providers, NewsBundle, SearchOrchestrator};
use tracing::{debug, error, info, warn};

use crate::commentary::{build_context, CommentaryProvider, OpenAiCommentary};
use crate::config::{ConfigError, Credentials, StockPulseConfig};
use crate::report::{RunReport, SymbolOutcome, SymbolReport};

/// One symbol to analyze, with an optional human-readable name used in news
/// queries and relevance filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRequest {
    pub symbol: Symbol,
    pub display_name: Option<String>,
}

impl SymbolRequest {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            display_name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.display_name = (!name.trim().is_empty()).then(|| name.trim().to_string());
        self
    }
}

/// `600519` or `600519:贵州茅台`.
impl FromStr for SymbolRequest {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (code, name) = match s.split_once(':') {
            Some((code, name)) => (code, Some(name)),
            None => (s, None),
        };
        let req = SymbolRequest::new(Symbol::parse(code.trim())?);
        Ok(match name {
            Some(n) => req.with_name(n),
            None => req,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolState {
    Fetching,
    Computing,
    Searching,
    Ready,
    Failed,
}

impl SymbolState {
    pub fn as_str(self) -> &'static str {
        match self {
            SymbolState::Fetching => "fetching",
            SymbolState::Computing => "computing",
            SymbolState::Searching => "searching",
            SymbolState::Ready => "ready",
            SymbolState::Failed => "failed",
        }
    }
}

impl fmt::Display for SymbolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Pipeline {
    fetcher: FetchOrchestrator,
    indicators: IndicatorConfig,
    news: Option<SearchOrchestrator>,
    max_news: usize,
    commentary: Option<Arc<dyn CommentaryProvider>>,
    workers: usize,
    dry_run: bool,
}

impl Pipeline {
    pub fn new(fetcher: FetchOrchestrator, indicators: IndicatorConfig) -> Self {
        Self {
            fetcher,
            indicators,
            news: None,
            max_news: 5,
            commentary: None,
            workers: 3,
            dry_run: false,
        }
    }

    pub fn with_news(mut self, news: SearchOrchestrator, max_news: usize) -> Self {
        self.news = Some(news);
        self.max_news = max_news;
        self
    }

    pub fn with_commentary(mut self, commentary: Arc<dyn CommentaryProvider>) -> Self {
        self.commentary = Some(commentary);
        self
    }

    /// Clamped to at least one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Wire the concrete adapters, cache and collaborators from configuration.
    pub fn from_config(config: &StockPulseConfig, credentials: &Credentials) -> Result<Self, ConfigError> {
        config.validate()?;

        let market = build_market_providers(&config.fetch.providers, &config.market_settings(credentials))?;
        let mut fetcher = FetchOrchestrator::new(market);
        if config.fetch.cache_enabled {
            fetcher = fetcher.with_cache(Arc::new(ParquetCache::new(&config.fetch.cache_dir)));
        }
        info!(
            providers = ?fetcher.provider_names(),
            cache = config.fetch.cache_enabled,
            "market adapters registered"
        );

        let mut pipeline = Pipeline::new(fetcher, config.indicators.clone())
            .with_workers(config.pipeline.workers)
            .dry_run(config.pipeline.dry_run);

        if config.news.enabled {
            let news = build_news_providers(&config.news.providers, &config.news_settings(credentials))?;
            let search = SearchOrchestrator::new(news);
            info!(providers = ?search.provider_names(), "news adapters registered");
            pipeline = pipeline.with_news(search, config.pipeline.max_news);
        }

        if config.commentary.enabled {
            match &credentials.openai_api_key {
                Some(key) => {
                    let base_url = credentials
                        .openai_base_url
                        .clone()
                        .unwrap_or_else(|| config.commentary.base_url.clone());
                    let model = credentials
                        .openai_model
                        .clone()
                        .unwrap_or_else(|| config.commentary.model.clone());
                    let client = OpenAiCommentary::new(
                        key.clone(),
                        base_url,
                        model,
                        std::time::Duration::from_secs(config.commentary.timeout_secs),
                    )?
                    .with_temperature(config.commentary.temperature);
                    pipeline = pipeline.with_commentary(Arc::new(client));
                }
                None => info!("OPENAI_API_KEY not set, commentary disabled"),
            }
        }
        Ok(pipeline)
    }

    /// Run every request. Outcomes come back in request order.
    pub fn run(&self, requests: &[SymbolRequest], window: &DateWindow) -> RunReport {
        let started_at = Utc::now();
        info!(symbols = requests.len(), workers = self.workers, %window, "pipeline started");

        let outcomes: Vec<SymbolOutcome> = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
        {
            Ok(pool) => pool.install(|| {
                requests
                    .par_iter()
                    .map(|req| self.run_symbol(req, window))
                    .collect()
            }),
            Err(e) => {
                warn!(error = %e, "worker pool unavailable, running sequentially");
                requests.iter().map(|req| self.run_symbol(req, window)).collect()
            }
        };

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            window: *window,
            outcomes,
        };
        info!(
            status = report.status().as_str(),
            ready = report.ready_count(),
            failed = report.failed_count(),
            elapsed_ms = report.elapsed_ms(),
            "pipeline finished"
        );
        report
    }

    /// One symbol through the state machine. Never panics, never returns an error.
    pub fn run_symbol(&self, request: &SymbolRequest, window: &DateWindow) -> SymbolOutcome {
        let symbol = &request.symbol;
        debug!(%symbol, state = %SymbolState::Fetching, "state");

        let (analysis, news) = thread::scope(|s| {
            let search = self.news.is_some().then(|| s.spawn(|| self.search(request)));
            let analysis = self.fetch_and_compute(request, window);
            let news = search.and_then(|handle| {
                handle.join().unwrap_or_else(|_| {
                    warn!(%symbol, "news search panicked, continuing without news");
                    None
                })
            });
            (analysis, news)
        });

        let (fetched, indicators) = match analysis {
            Ok(pair) => pair,
            Err(error) => {
                error!(%symbol, state = %SymbolState::Failed, causes = %error, "symbol failed");
                return SymbolOutcome::Failed {
                    symbol: symbol.clone(),
                    display_name: request.display_name.clone(),
                    error,
                };
            }
        };

        let commentary = self.comment(request, &indicators, news.as_ref());

        info!(
            %symbol,
            state = %SymbolState::Ready,
            source = %fetched.source,
            cached = fetched.from_cache,
            cross = indicators.macd.cross.label(),
            trend = indicators.trend.label(),
            news = news.as_ref().map_or(0, |n| n.items.len()),
            commentary = commentary.is_some(),
            "symbol ready"
        );
        SymbolOutcome::Ready(Box::new(SymbolReport {
            symbol: symbol.clone(),
            display_name: request.display_name.clone(),
            source: fetched.source,
            from_cache: fetched.from_cache,
            indicators,
            news,
            commentary,
        }))
    }

    fn fetch_and_compute(
        &self,
        request: &SymbolRequest,
        window: &DateWindow,
    ) -> Result<(Fetched, IndicatorSet), DataUnavailable> {
        let fetched = self.fetcher.fetch(&request.symbol, window)?;
        debug!(symbol = %request.symbol, state = %SymbolState::Computing, bars = fetched.series.len(), "state");
        let indicators = compute(&fetched.series, &self.indicators);
        Ok((fetched, indicators))
    }

    fn search(&self, request: &SymbolRequest) -> Option<NewsBundle> {
        let search = self.news.as_ref()?;
        debug!(symbol = %request.symbol, state = %SymbolState::Searching, "state");
        Some(search.get_news(&request.symbol, request.display_name.as_deref(), self.max_news))
    }

    fn comment(&self, request: &SymbolRequest, indicators: &IndicatorSet, news: Option<&NewsBundle>) -> Option<String> {
        if self.dry_run {
            return None;
        }
        let provider = self.commentary.as_ref()?;
        let prompt = build_context(request, indicators, news);
        match provider.generate(&prompt) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(symbol = %request.symbol, provider = provider.name(), error = %e, "commentary failed");
                None
            }
        }
    }
}
