//! TOML configuration and credential loading.
//!
//! Every field has a default, so an empty file (or no file) is a complete,
//! runnable configuration. Credentials are read once from the environment
//! through an injectable lookup and then passed explicitly into adapter
//! construction.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use stockpulse_core::data::{MarketProviderKind, MarketSettings};
use stockpulse_core::domain::{DateWindow, Period, PeriodError, SymbolError};
use stockpulse_core::indicators::IndicatorConfig;
use stockpulse_core::news::{NewsProviderKind, NewsSettings};
use thiserror::Error;

use crate::pipeline::SymbolRequest;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Period(#[from] PeriodError),

    #[error(transparent)]
    Symbol(#[from] SymbolError),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// Symbols processed concurrently.
    pub workers: usize,
    /// News items kept per symbol.
    pub max_news: usize,
    /// Skip the commentary collaborator.
    pub dry_run: bool,
    /// Entries written `code` or `code:name`.
    pub stocks: Vec<String>,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            workers: 3,
            max_news: 5,
            dry_run: false,
            stocks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSection {
    /// Shorthand window; ignored when `start` is set.
    pub period: Period,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Adapter priority, first tried first.
    pub providers: Vec<MarketProviderKind>,
    pub timeout_secs: u64,
    pub breaker_cooldown_secs: u64,
    pub cache_dir: PathBuf,
    pub cache_enabled: bool,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            period: Period::SixMonths,
            start: None,
            end: None,
            providers: MarketProviderKind::default_priority(),
            timeout_secs: 15,
            breaker_cooldown_secs: 30 * 60,
            cache_dir: PathBuf::from("data/cache"),
            cache_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsSection {
    pub enabled: bool,
    pub providers: Vec<NewsProviderKind>,
    pub lookback_days: u32,
    pub timeout_secs: u64,
}

impl Default for NewsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            providers: NewsProviderKind::ALL.to_vec(),
            lookback_days: 7,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentarySection {
    pub enabled: bool,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub temperature: f64,
}

impl Default for CommentarySection {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 60,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockPulseConfig {
    pub pipeline: PipelineSection,
    pub fetch: FetchSection,
    pub indicators: IndicatorConfig,
    pub news: NewsSection,
    pub commentary: CommentarySection,
}

impl StockPulseConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.workers == 0 {
            return Err(ConfigError::Invalid("pipeline.workers must be >= 1".into()));
        }
        if self.fetch.providers.is_empty() {
            return Err(ConfigError::Invalid("fetch.providers must name at least one adapter".into()));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Invalid("fetch.timeout_secs must be > 0".into()));
        }
        if let (Some(start), Some(end)) = (self.fetch.start, self.fetch.end) {
            DateWindow::new(start, end)?;
        }
        self.indicators
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("indicators: {e}")))?;
        Ok(())
    }

    /// Explicit `start`/`end` win over `period`. A missing `end` means `today`.
    pub fn window(&self, today: NaiveDate) -> Result<DateWindow, ConfigError> {
        let end = self.fetch.end.unwrap_or(today);
        match self.fetch.start {
            Some(start) => Ok(DateWindow::new(start, end)?),
            None => Ok(self.fetch.period.window_ending(end)),
        }
    }

    pub fn symbol_requests(&self) -> Result<Vec<SymbolRequest>, ConfigError> {
        let mut out: Vec<SymbolRequest> = Vec::new();
        for entry in &self.pipeline.stocks {
            let req: SymbolRequest = entry.parse()?;
            if !out.iter().any(|r| r.symbol == req.symbol) {
                out.push(req);
            }
        }
        Ok(out)
    }

    pub fn market_settings(&self, credentials: &Credentials) -> MarketSettings {
        MarketSettings {
            timeout: Duration::from_secs(self.fetch.timeout_secs),
            breaker_cooldown: Duration::from_secs(self.fetch.breaker_cooldown_secs),
            tushare_token: credentials.tushare_token.clone(),
        }
    }

    pub fn news_settings(&self, credentials: &Credentials) -> NewsSettings {
        NewsSettings {
            timeout: Duration::from_secs(self.news.timeout_secs),
            breaker_cooldown: Duration::from_secs(self.fetch.breaker_cooldown_secs),
            lookback_days: self.news.lookback_days,
            tavily_keys: credentials.tavily_keys.clone(),
            serpapi_keys: credentials.serpapi_keys.clone(),
            bocha_keys: credentials.bocha_keys.clone(),
        }
    }
}

/// API credentials, read once at startup.
#[derive(Clone, Default, PartialEq)]
pub struct Credentials {
    pub tushare_token: Option<String>,
    pub tavily_keys: Vec<String>,
    pub serpapi_keys: Vec<String>,
    pub bocha_keys: Vec<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub openai_model: Option<String>,
}

// Keys never reach the logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("tushare_token", &self.tushare_token.is_some())
            .field("tavily_keys", &self.tavily_keys.len())
            .field("serpapi_keys", &self.serpapi_keys.len())
            .field("bocha_keys", &self.bocha_keys.len())
            .field("openai_api_key", &self.openai_api_key.is_some())
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_model", &self.openai_model)
            .finish()
    }
}

fn split_keys(raw: Option<String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

fn non_blank(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value lookup. Key lists are comma-separated.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            tushare_token: non_blank(lookup("TUSHARE_TOKEN")),
            tavily_keys: split_keys(lookup("TAVILY_API_KEYS")),
            serpapi_keys: split_keys(lookup("SERPAPI_API_KEYS")),
            bocha_keys: split_keys(lookup("BOCHA_API_KEYS")),
            openai_api_key: non_blank(lookup("OPENAI_API_KEY")),
            openai_base_url: non_blank(lookup("OPENAI_BASE_URL")),
            openai_model: non_blank(lookup("OPENAI_MODEL")),
        }
    }
}
