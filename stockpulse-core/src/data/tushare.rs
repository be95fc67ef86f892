//! Tushare Pro `daily` adapter (token required).
//!
//! JSON-RPC style: POST `{api_name, token, params, fields}`, answered with a
//! tabular `{fields, items}` payload, newest row first.

use super::market::{normalize, MarketDataProvider};
use crate::domain::{Bar, DateWindow, PriceSeries, Symbol};
use crate::provider::http::{build_client, decode_json, read_body, send_failure};
use crate::provider::{CircuitBreaker, ProviderFailure, ProviderResult};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const NAME: &str = "tushare";
const DEFAULT_BASE_URL: &str = "http://api.tushare.pro";
const FIELDS: &str = "ts_code,trade_date,open,high,low,close,vol,amount";

/// Vendor code for "too many calls per minute".
const CODE_RATE_LIMITED: i64 = 40203;
/// Vendor codes for an invalid or insufficiently privileged token.
const CODES_BAD_TOKEN: [i64; 2] = [-2001, 2002];

#[derive(Debug, Deserialize)]
struct RpcResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    data: Option<Table>,
}

#[derive(Debug, Deserialize)]
struct Table {
    fields: Vec<String>,
    items: Vec<Vec<Value>>,
}

pub struct TushareProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    token: Option<String>,
    base_url: String,
}

impl TushareProvider {
    pub fn new(
        token: Option<String>,
        timeout: Duration,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout)?,
            circuit_breaker,
            token: token.filter(|t| !t.trim().is_empty()),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request_body(token: &str, symbol: &Symbol, window: &DateWindow) -> Value {
        json!({
            "api_name": "daily",
            "token": token,
            "params": {
                "ts_code": symbol.dotted(),
                "start_date": window.start().format("%Y%m%d").to_string(),
                "end_date": window.end().format("%Y%m%d").to_string(),
            },
            "fields": FIELDS,
        })
    }
}

fn column(fields: &[String], name: &str) -> ProviderResult<usize> {
    fields
        .iter()
        .position(|f| f == name)
        .ok_or_else(|| ProviderFailure::malformed(NAME, format!("missing field '{name}'")))
}

fn cell_f64(row: &[Value], idx: usize, name: &str) -> ProviderResult<f64> {
    match row.get(idx) {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| ProviderFailure::malformed(NAME, format!("{name} out of range"))),
        Some(Value::Null) => Ok(f64::NAN),
        other => Err(ProviderFailure::malformed(
            NAME,
            format!("{name} is not a number: {other:?}"),
        )),
    }
}

/// Parse a `daily` response body into bars (newest-first, untrimmed).
pub fn parse_daily(body: &str) -> ProviderResult<Vec<Bar>> {
    let resp: RpcResponse = decode_json(NAME, body)?;
    let msg = resp.msg.unwrap_or_default();
    match resp.code {
        0 => {}
        CODE_RATE_LIMITED => return Err(ProviderFailure::rate_limited(NAME, msg)),
        c if CODES_BAD_TOKEN.contains(&c) => {
            return Err(ProviderFailure::unavailable(NAME, format!("token rejected ({c}): {msg}")))
        }
        c => return Err(ProviderFailure::malformed(NAME, format!("vendor code {c}: {msg}"))),
    }

    let table = resp
        .data
        .ok_or_else(|| ProviderFailure::malformed(NAME, "success response without data"))?;
    if table.items.is_empty() {
        return Err(ProviderFailure::empty(NAME, "no rows"));
    }

    let f = &table.fields;
    let (i_date, i_open, i_high, i_low, i_close, i_vol) = (
        column(f, "trade_date")?,
        column(f, "open")?,
        column(f, "high")?,
        column(f, "low")?,
        column(f, "close")?,
        column(f, "vol")?,
    );
    let i_amount = f.iter().position(|n| n == "amount");

    table
        .items
        .iter()
        .map(|row| {
            let raw_date = row
                .get(i_date)
                .and_then(Value::as_str)
                .ok_or_else(|| ProviderFailure::malformed(NAME, "trade_date missing"))?;
            let date = NaiveDate::parse_from_str(raw_date, "%Y%m%d").map_err(|e| {
                ProviderFailure::malformed(NAME, format!("bad trade_date '{raw_date}': {e}"))
            })?;
            let amount = match i_amount {
                Some(i) => Some(cell_f64(row, i, "amount")?).filter(|a| a.is_finite()),
                None => None,
            };
            Ok(Bar {
                date,
                open: cell_f64(row, i_open, "open")?,
                high: cell_f64(row, i_high, "high")?,
                low: cell_f64(row, i_low, "low")?,
                close: cell_f64(row, i_close, "close")?,
                volume: cell_f64(row, i_vol, "vol")?,
                amount,
            })
        })
        .collect()
}

impl MarketDataProvider for TushareProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn is_available(&self) -> bool {
        self.token.is_some() && self.circuit_breaker.is_allowed()
    }

    fn unavailability(&self) -> ProviderFailure {
        if self.token.is_none() {
            return ProviderFailure::unavailable(NAME, "TUSHARE_TOKEN not set");
        }
        self.circuit_breaker
            .open_failure(NAME)
            .unwrap_or_else(|| ProviderFailure::unavailable(NAME, "circuit open"))
    }

    fn fetch(&self, symbol: &Symbol, window: &DateWindow) -> ProviderResult<PriceSeries> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| ProviderFailure::unavailable(NAME, "TUSHARE_TOKEN not set"))?;
        debug!(provider = NAME, %symbol, %window, "requesting daily");

        let resp = self
            .client
            .post(&self.base_url)
            .json(&Self::request_body(token, symbol, window))
            .send()
            .map_err(|e| send_failure(NAME, &e, &self.circuit_breaker))?;
        let body = read_body(NAME, resp, &self.circuit_breaker)?;
        let bars = parse_daily(&body).inspect_err(|f| {
            if f.kind == crate::provider::FailureKind::RateLimited {
                self.circuit_breaker.record_failure(f);
            }
        })?;
        self.circuit_breaker.record_success();

        normalize(NAME, symbol, bars, window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FailureKind;

    const SAMPLE: &str = r#"{
        "request_id": "abc",
        "code": 0,
        "msg": "",
        "data": {
            "fields": ["ts_code", "trade_date", "open", "high", "low", "close", "vol", "amount"],
            "items": [
                ["000001.SZ", "20240103", 9.30, 9.35, 9.18, 9.20, 1158366.45, 1071834.92],
                ["000001.SZ", "20240102", 9.39, 9.42, 9.21, 9.21, 1158366.45, null]
            ],
            "has_more": false
        }
    }"#;

    #[test]
    fn parses_tabular_payload() {
        let bars = parse_daily(SAMPLE).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(bars[0].close, 9.20);
        assert_eq!(bars[0].amount, Some(1071834.92));
        assert_eq!(bars[1].amount, None);
    }

    #[test]
    fn newest_first_is_normalized_ascending() {
        let symbol = Symbol::parse("000001").unwrap();
        let window = DateWindow::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
        .unwrap();
        let series = normalize(NAME, &symbol, parse_daily(SAMPLE).unwrap(), &window).unwrap();
        assert_eq!(series.closes(), vec![9.21, 9.20]);
    }

    #[test]
    fn vendor_rate_limit_code() {
        let body = r#"{"code": 40203, "msg": "抱歉，您每分钟最多访问该接口500次", "data": null}"#;
        assert_eq!(parse_daily(body).unwrap_err().kind, FailureKind::RateLimited);
    }

    #[test]
    fn rejected_token_is_unavailable() {
        let body = r#"{"code": -2001, "msg": "token invalid", "data": null}"#;
        assert_eq!(parse_daily(body).unwrap_err().kind, FailureKind::Unavailable);
    }

    #[test]
    fn no_rows_is_empty_result() {
        let body = r#"{"code":0,"msg":"","data":{"fields":["trade_date"],"items":[]}}"#;
        assert_eq!(parse_daily(body).unwrap_err().kind, FailureKind::EmptyResult);
    }

    #[test]
    fn missing_column_is_malformed() {
        let body = r#"{"code":0,"data":{"fields":["trade_date","open"],"items":[["20240102",1.0]]}}"#;
        assert_eq!(parse_daily(body).unwrap_err().kind, FailureKind::MalformedResponse);
    }

    #[test]
    fn blank_token_means_unavailable() {
        let p = TushareProvider::new(
            Some("  ".into()),
            Duration::from_secs(1),
            Arc::new(CircuitBreaker::new(Duration::from_secs(60))),
        )
        .unwrap();
        assert!(!p.is_available());
        assert_eq!(p.unavailability().detail, "TUSHARE_TOKEN not set");
        let window = DateWindow::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        )
        .unwrap();
        let err = p.fetch(&Symbol::parse("600519").unwrap(), &window).unwrap_err();
        assert_eq!(err.kind, FailureKind::Unavailable);
    }

    #[test]
    fn request_uses_dotted_code() {
        let window = DateWindow::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        )
        .unwrap();
        let body = TushareProvider::request_body("t", &Symbol::parse("600519").unwrap(), &window);
        assert_eq!(body["params"]["ts_code"], "600519.SH");
        assert_eq!(body["params"]["start_date"], "20240101");
        assert_eq!(body["api_name"], "daily");
    }
}
