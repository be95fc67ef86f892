//! Yahoo Finance backup adapter.
//!
//! Fetches daily bars from Yahoo's v8 chart API. Shanghai listings use the
//! `.SS` suffix and Shenzhen `.SZ`; Beijing listings are not carried.
//!
//! Yahoo has no official API and is subject to unannounced format changes,
//! which is why it sits last in the default priority.

use super::market::{normalize, MarketDataProvider};
use crate::domain::{Bar, DateWindow, Exchange, PriceSeries, Symbol};
use crate::provider::http::{build_client, decode_json, read_body, send_failure};
use crate::provider::{CircuitBreaker, ProviderFailure, ProviderResult};
use chrono::{DateTime, NaiveTime};
use chrono_tz::Asia::Shanghai;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const NAME: &str = "yahoo";
const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    base_url: String,
}

impl YahooProvider {
    pub fn new(timeout: Duration, circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout)?,
            circuit_breaker,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Yahoo ticker for a symbol, or `None` for venues Yahoo does not list.
    fn ticker(symbol: &Symbol) -> Option<String> {
        match symbol.exchange() {
            Exchange::Shanghai => Some(format!("{}.SS", symbol.code())),
            Exchange::Shenzhen => Some(format!("{}.SZ", symbol.code())),
            Exchange::Beijing => None,
        }
    }

    fn chart_url(&self, ticker: &str, window: &DateWindow) -> String {
        let start_ts = window.start().and_time(NaiveTime::MIN).and_utc().timestamp();
        let end_ts = window.end().and_time(NaiveTime::MIN).and_utc().timestamp() + 86_399;
        format!(
            "{}/{ticker}?period1={start_ts}&period2={end_ts}&interval=1d",
            self.base_url
        )
    }
}

/// Parse the chart API response into bars.
pub fn parse_chart(body: &str) -> ProviderResult<Vec<Bar>> {
    let resp: ChartResponse = decode_json(NAME, body)?;

    let result = match (resp.chart.result, resp.chart.error) {
        (Some(result), _) => result,
        (None, Some(err)) if err.code == "Not Found" => {
            return Err(ProviderFailure::empty(NAME, err.description))
        }
        (None, Some(err)) => {
            return Err(ProviderFailure::malformed(
                NAME,
                format!("{}: {}", err.code, err.description),
            ))
        }
        (None, None) => return Err(ProviderFailure::malformed(NAME, "empty result with no error")),
    };

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| ProviderFailure::empty(NAME, "result array is empty"))?;

    let timestamps = match data.timestamp {
        Some(ts) if !ts.is_empty() => ts,
        _ => return Err(ProviderFailure::empty(NAME, "no timestamps")),
    };

    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| ProviderFailure::malformed(NAME, "no quote data"))?;

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        // Session timestamps are exchange-local; take the trade date in Shanghai time.
        let date = DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.with_timezone(&Shanghai).date_naive())
            .ok_or_else(|| ProviderFailure::malformed(NAME, format!("invalid timestamp: {ts}")))?;

        let open = quote.open.get(i).copied().flatten();
        let high = quote.high.get(i).copied().flatten();
        let low = quote.low.get(i).copied().flatten();
        let close = quote.close.get(i).copied().flatten();
        let volume = quote.volume.get(i).copied().flatten();

        // Suspended sessions come back as all-null rows.
        if open.is_none() && high.is_none() && low.is_none() && close.is_none() {
            continue;
        }

        bars.push(Bar {
            date,
            open: open.unwrap_or(f64::NAN),
            high: high.unwrap_or(f64::NAN),
            low: low.unwrap_or(f64::NAN),
            close: close.unwrap_or(f64::NAN),
            volume: volume.unwrap_or(0.0),
            amount: None,
        });
    }

    if bars.is_empty() {
        return Err(ProviderFailure::empty(NAME, "all rows null"));
    }
    Ok(bars)
}

impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }

    fn unavailability(&self) -> ProviderFailure {
        self.circuit_breaker
            .open_failure(NAME)
            .unwrap_or_else(|| ProviderFailure::unavailable(NAME, "circuit open"))
    }

    fn fetch(&self, symbol: &Symbol, window: &DateWindow) -> ProviderResult<PriceSeries> {
        let ticker = Self::ticker(symbol)
            .ok_or_else(|| ProviderFailure::empty(NAME, format!("{symbol} is not listed on Yahoo")))?;
        let url = self.chart_url(&ticker, window);
        debug!(provider = NAME, %symbol, %url, "requesting chart");

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| send_failure(NAME, &e, &self.circuit_breaker))?;
        let body = read_body(NAME, resp, &self.circuit_breaker)?;
        let bars = parse_chart(&body)?;
        self.circuit_breaker.record_success();

        normalize(NAME, symbol, bars, window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FailureKind;
    use chrono::NaiveDate;

    // 2024-01-02 and 2024-01-03 09:30 Asia/Shanghai (01:30 UTC), plus a null row.
    const SAMPLE: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"symbol": "600519.SS"},
                "timestamp": [1704159000, 1704245400, 1704331800],
                "indicators": {
                    "quote": [{
                        "open":   [1685.0, 1701.0, null],
                        "high":   [1712.0, 1705.0, null],
                        "low":    [1680.0, 1688.0, null],
                        "close":  [1703.0, 1690.5, null],
                        "volume": [3135600, 2541200, null]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn parses_chart_and_skips_null_rows() {
        let bars = parse_chart(SAMPLE).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[1].date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(bars[1].close, 1690.5);
        assert_eq!(bars[0].volume, 3135600.0);
    }

    #[test]
    fn not_found_is_empty_result() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        assert_eq!(parse_chart(body).unwrap_err().kind, FailureKind::EmptyResult);
    }

    #[test]
    fn other_chart_error_is_malformed() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Bad Request","description":"Invalid input"}}}"#;
        assert_eq!(parse_chart(body).unwrap_err().kind, FailureKind::MalformedResponse);
    }

    #[test]
    fn ticker_suffixes() {
        assert_eq!(
            YahooProvider::ticker(&Symbol::parse("600519").unwrap()).as_deref(),
            Some("600519.SS")
        );
        assert_eq!(
            YahooProvider::ticker(&Symbol::parse("300750").unwrap()).as_deref(),
            Some("300750.SZ")
        );
        assert_eq!(YahooProvider::ticker(&Symbol::parse("430047").unwrap()), None);
    }

    #[test]
    fn beijing_listing_fails_without_network() {
        let p = YahooProvider::new(Duration::from_secs(1), Arc::new(CircuitBreaker::new(Duration::from_secs(60))))
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        let window = DateWindow::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
        .unwrap();
        let err = p.fetch(&Symbol::parse("830799").unwrap(), &window).unwrap_err();
        assert_eq!(err.kind, FailureKind::EmptyResult);
    }
}
