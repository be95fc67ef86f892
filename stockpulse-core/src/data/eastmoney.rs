//! EastMoney push2his kline adapter (free, no credential).
//!
//! Daily forward-adjusted bars. Each row arrives as a comma-separated string
//! `date,open,close,high,low,volume,amount` inside a JSON envelope; `data` is
//! null for unknown codes.

use super::market::{normalize, parse_number, MarketDataProvider};
use crate::domain::{Bar, DateWindow, Exchange, PriceSeries, Symbol};
use crate::provider::http::{build_client, decode_json, read_body, send_failure};
use crate::provider::{CircuitBreaker, ProviderFailure, ProviderResult};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const NAME: &str = "eastmoney";
const DEFAULT_BASE_URL: &str = "https://push2his.eastmoney.com/api/qt/stock/kline/get";

#[derive(Debug, Deserialize)]
struct KlineResponse {
    data: Option<KlineData>,
}

#[derive(Debug, Deserialize)]
struct KlineData {
    #[serde(default)]
    klines: Vec<String>,
}

pub struct EastMoneyProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    base_url: String,
}

impl EastMoneyProvider {
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

    /// `1.` for Shanghai listings, `0.` for Shenzhen and Beijing.
    fn secid(symbol: &Symbol) -> String {
        let market = match symbol.exchange() {
            Exchange::Shanghai => 1,
            Exchange::Shenzhen | Exchange::Beijing => 0,
        };
        format!("{market}.{}", symbol.code())
    }

    fn kline_url(&self, symbol: &Symbol, window: &DateWindow) -> String {
        format!(
            "{}?secid={}&fields1=f1,f2,f3,f4,f5,f6\
             &fields2=f51,f52,f53,f54,f55,f56,f57\
             &klt=101&fqt=1&beg={}&end={}",
            self.base_url,
            Self::secid(symbol),
            window.start().format("%Y%m%d"),
            window.end().format("%Y%m%d"),
        )
    }
}

/// Parse a kline response body into bars (unordered, untrimmed).
pub fn parse_klines(body: &str) -> ProviderResult<Vec<Bar>> {
    let resp: KlineResponse = decode_json(NAME, body)?;
    let data = resp
        .data
        .ok_or_else(|| ProviderFailure::empty(NAME, "response data is null"))?;
    if data.klines.is_empty() {
        return Err(ProviderFailure::empty(NAME, "no kline rows"));
    }
    data.klines.iter().map(|row| parse_row(row)).collect()
}

fn parse_row(row: &str) -> ProviderResult<Bar> {
    let fields: Vec<&str> = row.split(',').collect();
    if fields.len() < 6 {
        return Err(ProviderFailure::malformed(
            NAME,
            format!("kline row has {} fields: '{row}'", fields.len()),
        ));
    }
    let date = NaiveDate::parse_from_str(fields[0], "%Y-%m-%d")
        .map_err(|e| ProviderFailure::malformed(NAME, format!("bad date '{}': {e}", fields[0])))?;
    let amount = match fields.get(6) {
        Some(raw) => Some(parse_number(NAME, "amount", raw)?),
        None => None,
    };
    Ok(Bar {
        date,
        open: parse_number(NAME, "open", fields[1])?,
        close: parse_number(NAME, "close", fields[2])?,
        high: parse_number(NAME, "high", fields[3])?,
        low: parse_number(NAME, "low", fields[4])?,
        volume: parse_number(NAME, "volume", fields[5])?,
        amount,
    })
}

impl MarketDataProvider for EastMoneyProvider {
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
        let url = self.kline_url(symbol, window);
        debug!(provider = NAME, %symbol, %url, "requesting klines");

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| send_failure(NAME, &e, &self.circuit_breaker))?;
        let body = read_body(NAME, resp, &self.circuit_breaker)?;
        let bars = parse_klines(&body)?;
        self.circuit_breaker.record_success();

        normalize(NAME, symbol, bars, window)
    }
}
