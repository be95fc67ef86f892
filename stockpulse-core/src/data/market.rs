//! Market-data ProviderAdapter trait and the closed set of registered adapters.

use super::eastmoney::EastMoneyProvider;
use super::tushare::TushareProvider;
use super::yahoo::YahooProvider;
use crate::domain::{Bar, DateWindow, PriceSeries, Symbol};
use crate::provider::{CircuitBreaker, ProviderFailure, ProviderResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One upstream source of daily bars.
///
/// `fetch` makes exactly one upstream request and never retries; retry and
/// failover belong to the orchestrator.
pub trait MarketDataProvider: Send + Sync {
    /// Stable lowercase identifier, used in logs and failure causes.
    fn name(&self) -> &str;

    /// Required credential present and upstream not blocked.
    fn is_available(&self) -> bool;

    /// The failure recorded for this adapter when `is_available` is false.
    fn unavailability(&self) -> ProviderFailure {
        ProviderFailure::unavailable(self.name(), "credential missing or circuit open")
    }

    fn fetch(&self, symbol: &Symbol, window: &DateWindow) -> ProviderResult<PriceSeries>;
}

/// Registered market-data adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MarketProviderKind {
    EastMoney,
    Tushare,
    Yahoo,
}

impl MarketProviderKind {
    pub const ALL: [MarketProviderKind; 3] = [
        MarketProviderKind::EastMoney,
        MarketProviderKind::Tushare,
        MarketProviderKind::Yahoo,
    ];

    /// Free primary first, credentialed and backup sources after.
    pub fn default_priority() -> Vec<MarketProviderKind> {
        Self::ALL.to_vec()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MarketProviderKind::EastMoney => "eastmoney",
            MarketProviderKind::Tushare => "tushare",
            MarketProviderKind::Yahoo => "yahoo",
        }
    }
}

impl fmt::Display for MarketProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eastmoney" => Ok(MarketProviderKind::EastMoney),
            "tushare" => Ok(MarketProviderKind::Tushare),
            "yahoo" => Ok(MarketProviderKind::Yahoo),
            other => Err(format!(
                "unknown market provider '{other}' (valid: eastmoney, tushare, yahoo)"
            )),
        }
    }
}

impl TryFrom<String> for MarketProviderKind {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MarketProviderKind> for String {
    fn from(k: MarketProviderKind) -> Self {
        k.as_str().to_string()
    }
}

/// Inputs needed to construct the market adapters.
#[derive(Debug, Clone)]
pub struct MarketSettings {
    pub timeout: Duration,
    pub breaker_cooldown: Duration,
    pub tushare_token: Option<String>,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            breaker_cooldown: Duration::from_secs(30 * 60),
            tushare_token: None,
        }
    }
}

/// Build adapters in exactly the given priority order. Duplicates are kept
/// once, at their first position.
pub fn build_market_providers(
    priority: &[MarketProviderKind],
    settings: &MarketSettings,
) -> Result<Vec<Arc<dyn MarketDataProvider>>, reqwest::Error> {
    let mut seen = Vec::new();
    let mut providers: Vec<Arc<dyn MarketDataProvider>> = Vec::new();
    for &kind in priority {
        if seen.contains(&kind) {
            continue;
        }
        seen.push(kind);
        let breaker = Arc::new(CircuitBreaker::new(settings.breaker_cooldown));
        let provider: Arc<dyn MarketDataProvider> = match kind {
            MarketProviderKind::EastMoney => Arc::new(EastMoneyProvider::new(settings.timeout, breaker)?),
            MarketProviderKind::Tushare => Arc::new(TushareProvider::new(
                settings.tushare_token.clone(),
                settings.timeout,
                breaker,
            )?),
            MarketProviderKind::Yahoo => Arc::new(YahooProvider::new(settings.timeout, breaker)?),
        };
        providers.push(provider);
    }
    Ok(providers)
}

/// Common tail of every adapter: order bars, drop rows that fail the OHLC
/// sanity check, trim to the window, and classify an empty outcome.
pub(crate) fn normalize(
    provider: &str,
    symbol: &Symbol,
    bars: Vec<Bar>,
    window: &DateWindow,
) -> ProviderResult<PriceSeries> {
    let total = bars.len();
    let bars: Vec<Bar> = bars.into_iter().filter(Bar::is_sane).collect();
    if bars.len() < total {
        debug!(provider, %symbol, dropped = total - bars.len(), "dropped bars failing OHLC sanity check");
    }
    let series = PriceSeries::from_unordered(symbol.clone(), bars).within(window);
    if series.is_empty() {
        return Err(ProviderFailure::empty(
            provider,
            format!("no bars for {symbol} in {window}"),
        ));
    }
    Ok(series)
}

/// Parse a number that may arrive as a JSON number or a numeric string.
pub(crate) fn parse_number(provider: &str, field: &str, raw: &str) -> ProviderResult<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ProviderFailure::malformed(provider, format!("{field} is not a number: '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FailureKind;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn bar(date: NaiveDate, close: f64) -> Bar {
        Bar {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
            amount: None,
        }
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in MarketProviderKind::ALL {
            assert_eq!(kind.as_str().parse::<MarketProviderKind>(), Ok(kind));
        }
        assert!("bloomberg".parse::<MarketProviderKind>().is_err());
    }

    #[test]
    fn default_priority_is_free_first() {
        let names: Vec<&str> = MarketProviderKind::default_priority()
            .iter()
            .map(|k| k.as_str())
            .collect();
        assert_eq!(names, ["eastmoney", "tushare", "yahoo"]);
    }

    #[test]
    fn registry_preserves_order_and_drops_duplicates() {
        let priority = [
            MarketProviderKind::Yahoo,
            MarketProviderKind::EastMoney,
            MarketProviderKind::Yahoo,
        ];
        let providers = build_market_providers(&priority, &MarketSettings::default()).unwrap();
        let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
        assert_eq!(names, ["yahoo", "eastmoney"]);
    }

    #[test]
    fn tushare_without_token_is_unavailable() {
        let providers =
            build_market_providers(&[MarketProviderKind::Tushare], &MarketSettings::default()).unwrap();
        assert!(!providers[0].is_available());
    }

    #[test]
    fn normalize_sorts_and_trims() {
        let symbol = Symbol::parse("600519").unwrap();
        let window = DateWindow::new(d(2024, 1, 2), d(2024, 1, 3)).unwrap();
        let bars = vec![bar(d(2024, 1, 4), 3.0), bar(d(2024, 1, 3), 2.0), bar(d(2024, 1, 2), 1.0)];
        let series = normalize("test", &symbol, bars, &window).unwrap();
        assert_eq!(series.closes(), vec![1.0, 2.0]);
    }

    #[test]
    fn normalize_drops_insane_bars() {
        let symbol = Symbol::parse("600519").unwrap();
        let window = DateWindow::new(d(2024, 1, 1), d(2024, 1, 31)).unwrap();
        let mut inverted = bar(d(2024, 1, 3), 2.0);
        inverted.high = 1.0;
        let mut void = bar(d(2024, 1, 4), 3.0);
        void.close = f64::NAN;
        let zero_price = bar(d(2024, 1, 5), 0.0);
        let bars = vec![bar(d(2024, 1, 2), 1.0), inverted, void, zero_price, bar(d(2024, 1, 8), 4.0)];
        let series = normalize("test", &symbol, bars, &window).unwrap();
        assert_eq!(series.closes(), vec![1.0, 4.0]);
    }

    #[test]
    fn normalize_all_insane_is_empty_result() {
        let symbol = Symbol::parse("600519").unwrap();
        let window = DateWindow::new(d(2024, 1, 1), d(2024, 1, 31)).unwrap();
        let mut negative_volume = bar(d(2024, 1, 2), 1.0);
        negative_volume.volume = -5.0;
        let err = normalize("test", &symbol, vec![negative_volume], &window).unwrap_err();
        assert_eq!(err.kind, FailureKind::EmptyResult);
    }

    #[test]
    fn normalize_empty_window_is_empty_result() {
        let symbol = Symbol::parse("600519").unwrap();
        let window = DateWindow::new(d(2023, 1, 1), d(2023, 1, 31)).unwrap();
        let err = normalize("test", &symbol, vec![bar(d(2024, 1, 2), 1.0)], &window).unwrap_err();
        assert_eq!(err.kind, FailureKind::EmptyResult);
    }
}
