//! News ProviderAdapter trait, item type, and the closed set of registered adapters.

use super::bocha::BochaProvider;
use super::serpapi::SerpApiProvider;
use super::tavily::TavilyProvider;
use crate::provider::{CircuitBreaker, KeyRing, ProviderFailure, ProviderResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Asia::Shanghai;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub published: Option<DateTime<Utc>>,
    pub snippet: String,
    /// Name of the adapter that returned the item.
    pub source: String,
    /// Title or snippet mentions the stock's name or code.
    #[serde(default)]
    pub relevant: bool,
}

/// One upstream search source. One request per `search`, never retried.
pub trait NewsProvider: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    /// The failure recorded for this adapter when `is_available` is false.
    fn unavailability(&self) -> ProviderFailure {
        ProviderFailure::unavailable(self.name(), "no API key or circuit open")
    }

    fn search(&self, query: &str, max_results: usize) -> ProviderResult<Vec<NewsItem>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NewsProviderKind {
    Tavily,
    SerpApi,
    Bocha,
}

impl NewsProviderKind {
    pub const ALL: [NewsProviderKind; 3] = [
        NewsProviderKind::Bocha,
        NewsProviderKind::Tavily,
        NewsProviderKind::SerpApi,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NewsProviderKind::Tavily => "tavily",
            NewsProviderKind::SerpApi => "serpapi",
            NewsProviderKind::Bocha => "bocha",
        }
    }
}

impl fmt::Display for NewsProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NewsProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tavily" => Ok(NewsProviderKind::Tavily),
            "serpapi" => Ok(NewsProviderKind::SerpApi),
            "bocha" => Ok(NewsProviderKind::Bocha),
            other => Err(format!(
                "unknown news provider '{other}' (valid: bocha, tavily, serpapi)"
            )),
        }
    }
}

impl TryFrom<String> for NewsProviderKind {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<NewsProviderKind> for String {
    fn from(k: NewsProviderKind) -> Self {
        k.as_str().to_string()
    }
}

#[derive(Debug, Clone)]
pub struct NewsSettings {
    pub timeout: Duration,
    pub breaker_cooldown: Duration,
    /// How far back adapters that support a recency filter should look.
    pub lookback_days: u32,
    pub tavily_keys: Vec<String>,
    pub serpapi_keys: Vec<String>,
    pub bocha_keys: Vec<String>,
}

impl Default for NewsSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            breaker_cooldown: Duration::from_secs(30 * 60),
            lookback_days: 7,
            tavily_keys: Vec::new(),
            serpapi_keys: Vec::new(),
            bocha_keys: Vec::new(),
        }
    }
}

/// Build adapters in the given order; duplicates are kept once.
pub fn build_news_providers(
    kinds: &[NewsProviderKind],
    settings: &NewsSettings,
) -> Result<Vec<Arc<dyn NewsProvider>>, reqwest::Error> {
    let mut seen = Vec::new();
    let mut providers: Vec<Arc<dyn NewsProvider>> = Vec::new();
    for &kind in kinds {
        if seen.contains(&kind) {
            continue;
        }
        seen.push(kind);
        let breaker = Arc::new(CircuitBreaker::new(settings.breaker_cooldown));
        let provider: Arc<dyn NewsProvider> = match kind {
            NewsProviderKind::Tavily => Arc::new(TavilyProvider::new(
                KeyRing::new(settings.tavily_keys.clone()),
                settings.lookback_days,
                settings.timeout,
                breaker,
            )?),
            NewsProviderKind::SerpApi => Arc::new(SerpApiProvider::new(
                KeyRing::new(settings.serpapi_keys.clone()),
                settings.timeout,
                breaker,
            )?),
            NewsProviderKind::Bocha => Arc::new(BochaProvider::new(
                KeyRing::new(settings.bocha_keys.clone()),
                settings.lookback_days,
                settings.timeout,
                breaker,
            )?),
        };
        providers.push(provider);
    }
    Ok(providers)
}

/// Best-effort timestamp parsing across vendor formats. Naive timestamps are
/// read as Asia/Shanghai local time. Anything unrecognised is `None`.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Google News via SerpAPI: "01/02/2024, 08:00 AM, +0000 UTC"
    if let Some(stripped) = raw.strip_suffix(" UTC") {
        if let Ok(dt) = DateTime::parse_from_str(stripped, "%m/%d/%Y, %I:%M %p, %z") {
            return Some(dt.with_timezone(&Utc));
        }
    }
    let local = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    Shanghai
        .from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(parse_published("2024-01-02T08:00:00+08:00"), Some(expected));
        assert_eq!(parse_published("Tue, 02 Jan 2024 00:00:00 +0000"), Some(expected));
        assert_eq!(parse_published("01/02/2024, 12:00 AM, +0000 UTC"), Some(expected));
        assert_eq!(parse_published("2024-01-02 08:00:00"), Some(expected));
        assert_eq!(
            parse_published("2024-01-02"),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 16, 0, 0).unwrap())
        );
    }

    #[test]
    fn unparsable_timestamp_is_none() {
        assert_eq!(parse_published("3 hours ago"), None);
        assert_eq!(parse_published(""), None);
    }

    #[test]
    fn registry_without_keys_builds_unavailable_adapters() {
        let providers = build_news_providers(&NewsProviderKind::ALL, &NewsSettings::default()).unwrap();
        let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
        assert_eq!(names, ["bocha", "tavily", "serpapi"]);
        assert!(providers.iter().all(|p| !p.is_available()));
    }

    #[test]
    fn kind_parsing() {
        assert_eq!("SerpAPI".parse::<NewsProviderKind>(), Ok(NewsProviderKind::SerpApi));
        assert!("bing".parse::<NewsProviderKind>().is_err());
    }
}
