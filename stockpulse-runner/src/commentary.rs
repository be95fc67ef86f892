//! AI commentary collaborator.
//!
//! The pipeline only needs `prompt -> text`. Errors never fail a symbol; the
//! pipeline logs them and keeps `commentary: None`.

use std::fmt::Write as _;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use stockpulse_core::indicators::IndicatorSet;
use stockpulse_core::news::NewsBundle;
use stockpulse_core::provider::build_client;
use thiserror::Error;
use tracing::debug;

use crate::pipeline::SymbolRequest;

const SYSTEM_PROMPT: &str = "你是一位专业的A股技术分析师。根据给出的技术指标与新闻，\
给出简洁的趋势判断、风险提示和操作建议。标记为 N/A 的指标表示数据不足，不要把它当作 0。";

#[derive(Debug, Error)]
pub enum CommentaryError {
    #[error("commentary request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("commentary endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("undecodable commentary response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("commentary response had no content")]
    Empty,
}

pub trait CommentaryProvider: Send + Sync {
    fn name(&self) -> &str;

    fn generate(&self, prompt: &str) -> Result<String, CommentaryError>;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Any chat-completions compatible endpoint.
pub struct OpenAiCommentary {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f64,
}

impl OpenAiCommentary {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout)?,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: 0.7,
        })
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// First non-blank choice of a chat-completions payload.
pub fn parse_completion(body: &str) -> Result<String, CommentaryError> {
    let resp: ChatResponse = serde_json::from_str(body)?;
    resp.choices
        .into_iter()
        .filter_map(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .find(|c| !c.is_empty())
        .ok_or(CommentaryError::Empty)
}

impl CommentaryProvider for OpenAiCommentary {
    fn name(&self) -> &str {
        "openai"
    }

    fn generate(&self, prompt: &str) -> Result<String, CommentaryError> {
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt},
            ],
        });
        debug!(model = %self.model, chars = prompt.len(), "requesting commentary");
        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;
        let status = resp.status();
        let text = resp.text()?;
        if !status.is_success() {
            let body: String = text.chars().take(200).collect();
            return Err(CommentaryError::Status {
                status: status.as_u16(),
                body,
            });
        }
        parse_completion(&text)
    }
}

fn num(v: Option<f64>, decimals: usize) -> String {
    match v {
        Some(x) => format!("{x:.decimals$}"),
        None => "N/A".to_string(),
    }
}

fn pct(v: Option<f64>) -> String {
    match v {
        Some(x) => format!("{x:+.2}%"),
        None => "N/A".to_string(),
    }
}

/// Prompt text for one symbol. Unavailable metrics render as `N/A`.
pub fn build_context(request: &SymbolRequest, indicators: &IndicatorSet, news: Option<&NewsBundle>) -> String {
    let mut out = String::new();
    let name = request.display_name.as_deref().unwrap_or("");
    let as_of = indicators
        .as_of
        .map(|d| d.to_string())
        .unwrap_or_else(|| "N/A".to_string());

    let _ = writeln!(out, "# {} {}", request.symbol.dotted(), name);
    let _ = writeln!(out, "日期: {as_of}  K线数量: {}", indicators.bar_count);
    let _ = writeln!(
        out,
        "收盘价: {}  涨跌幅: {}",
        num(indicators.last_close, 2),
        pct(indicators.change_pct)
    );

    let _ = writeln!(out, "\n## 均线");
    for ma in &indicators.moving_averages {
        let _ = writeln!(
            out,
            "MA{}: {}  乖离率: {}",
            ma.window,
            num(ma.value, 2),
            pct(ma.bias_pct)
        );
    }
    let _ = writeln!(out, "均线排列: {}", indicators.trend.label());
    let chase = match indicators.overextended {
        Some(true) => "是 (偏离过大，不宜追高)",
        Some(false) => "否",
        None => "N/A",
    };
    let _ = writeln!(out, "短期乖离过大: {chase}");

    let m = &indicators.macd;
    let _ = writeln!(out, "\n## MACD");
    let _ = writeln!(
        out,
        "DIF: {}  DEA: {}  柱: {}  信号: {}",
        num(m.dif, 4),
        num(m.dea, 4),
        num(m.histogram, 4),
        m.cross.label()
    );

    let r = &indicators.rsi;
    let _ = writeln!(out, "\n## RSI({})", r.period);
    let _ = writeln!(out, "RSI: {}  状态: {}", num(r.value, 2), r.zone.label());

    let v = &indicators.volume;
    let _ = writeln!(out, "\n## 量能");
    let _ = writeln!(
        out,
        "量比: {}  状态: {}  较昨日成交量: {}",
        num(v.ratio, 2),
        v.band.map(|b| b.label()).unwrap_or("N/A"),
        indicators
            .volume_change_ratio
            .map(|r| format!("{r:.2}倍"))
            .unwrap_or_else(|| "N/A".to_string())
    );

    let range = &indicators.range;
    let _ = writeln!(out, "\n## 区间统计");
    let _ = writeln!(
        out,
        "最高: {}  最低: {}  振幅: {}  均价: {}",
        num(range.max_high, 2),
        num(range.min_low, 2),
        range
            .amplitude_pct
            .map(|a| format!("{a:.2}%"))
            .unwrap_or_else(|| "N/A".to_string()),
        num(range.mean_close, 2)
    );

    let _ = writeln!(out, "\n## 新闻");
    match news {
        Some(bundle) if !bundle.is_empty() => {
            for (i, item) in bundle.items.iter().enumerate() {
                let when = item
                    .published
                    .map(|p| p.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "N/A".to_string());
                let _ = writeln!(out, "{}. [{when}] {} ({})", i + 1, item.title, item.source);
                if !item.snippet.is_empty() {
                    let snippet: String = item.snippet.chars().take(120).collect();
                    let _ = writeln!(out, "   {snippet}");
                }
            }
        }
        _ => {
            let _ = writeln!(out, "暂无相关新闻");
        }
    }
    out
}
