//! IndicatorEngine: pure computation of an `IndicatorSet` from one series.
//!
//! Every metric that cannot be computed (short history, zero denominator) is
//! `None`. Nothing here panics or returns an error for a well-formed series.

use super::config::IndicatorConfig;
use super::macd::{macd_reading, MacdReading};
use super::range::{price_range, PriceRange};
use super::rsi::{rsi_of_series, RsiReading, RsiZone};
use super::sma::trailing_mean;
use super::volume::{volume_ratio, VolumeReading};
use crate::domain::{PriceSeries, Symbol};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Moving-average alignment of the three shortest windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendAlignment {
    /// MA5 > MA10 > MA20
    Bullish,
    /// MA5 < MA10 < MA20
    Bearish,
    Ranging,
    /// At least one of the three averages is unavailable.
    Indeterminate,
}

impl TrendAlignment {
    pub fn classify(short: Option<f64>, mid: Option<f64>, long: Option<f64>) -> Self {
        match (short, mid, long) {
            (Some(s), Some(m), Some(l)) => {
                if s > m && m > l {
                    TrendAlignment::Bullish
                } else if s < m && m < l {
                    TrendAlignment::Bearish
                } else {
                    TrendAlignment::Ranging
                }
            }
            _ => TrendAlignment::Indeterminate,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TrendAlignment::Bullish => "bullish alignment",
            TrendAlignment::Bearish => "bearish alignment",
            TrendAlignment::Ranging => "ranging",
            TrendAlignment::Indeterminate => "indeterminate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovingAverage {
    pub window: usize,
    pub value: Option<f64>,
    /// `(last_close - value) / value`, in percent.
    pub bias_pct: Option<f64>,
}

/// Immutable snapshot of every derived signal as of the last bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub symbol: Symbol,
    pub as_of: Option<NaiveDate>,
    pub bar_count: usize,
    pub last_close: Option<f64>,
    pub change_pct: Option<f64>,
    /// Last volume over the previous bar's volume.
    #[serde(default)]
    pub volume_change_ratio: Option<f64>,
    pub moving_averages: Vec<MovingAverage>,
    pub trend: TrendAlignment,
    pub macd: MacdReading,
    pub rsi: RsiReading,
    pub volume: VolumeReading,
    pub range: PriceRange,
    /// Shortest-window bias above the safe range. `None` when that bias is unavailable.
    pub overextended: Option<bool>,
}

impl IndicatorSet {
    pub fn ma(&self, window: usize) -> Option<f64> {
        self.moving_averages
            .iter()
            .find(|m| m.window == window)
            .and_then(|m| m.value)
    }

    pub fn bias(&self, window: usize) -> Option<f64> {
        self.moving_averages
            .iter()
            .find(|m| m.window == window)
            .and_then(|m| m.bias_pct)
    }
}

fn bias_pct(close: Option<f64>, ma: Option<f64>) -> Option<f64> {
    match (close, ma) {
        (Some(c), Some(m)) if m != 0.0 => {
            let b = (c - m) / m * 100.0;
            b.is_finite().then_some(b)
        }
        _ => None,
    }
}

fn change_pct(closes: &[f64]) -> Option<f64> {
    let n = closes.len();
    if n < 2 || closes[n - 2] == 0.0 {
        return None;
    }
    let pct = (closes[n - 1] - closes[n - 2]) / closes[n - 2] * 100.0;
    pct.is_finite().then_some(pct)
}

fn volume_change_ratio(volumes: &[f64]) -> Option<f64> {
    let n = volumes.len();
    if n < 2 || volumes[n - 2] <= 0.0 {
        return None;
    }
    let ratio = volumes[n - 1] / volumes[n - 2];
    ratio.is_finite().then_some(ratio)
}

/// Derive the full indicator set. Pure and deterministic.
pub fn compute(series: &PriceSeries, config: &IndicatorConfig) -> IndicatorSet {
    let closes = series.closes();
    let volumes = series.volumes();
    let t = &config.thresholds;

    let last_close = series.last().map(|b| b.close).filter(|c| c.is_finite());

    let mut windows = config.ma_windows.clone();
    windows.sort_unstable();
    windows.dedup();
    let moving_averages: Vec<MovingAverage> = windows
        .iter()
        .map(|&window| {
            let value = trailing_mean(&closes, window);
            MovingAverage {
                window,
                value,
                bias_pct: bias_pct(last_close, value),
            }
        })
        .collect();

    let trend = match moving_averages.as_slice() {
        [a, b, c, ..] => TrendAlignment::classify(a.value, b.value, c.value),
        _ => TrendAlignment::Indeterminate,
    };

    let overextended = moving_averages
        .first()
        .and_then(|m| m.bias_pct)
        .map(|b| b > t.bias_safe_pct);

    let rsi_value = rsi_of_series(&closes, config.rsi_period)
        .last()
        .copied()
        .filter(|v| v.is_finite());
    let rsi = RsiReading {
        period: config.rsi_period,
        value: rsi_value,
        zone: RsiZone::classify(rsi_value, t.rsi_overbought, t.rsi_oversold),
    };

    let ratio = volume_ratio(&volumes, t.volume_lookback);
    let volume = VolumeReading {
        ratio,
        band: ratio.map(|r| t.volume_bands.classify(r)),
    };

    IndicatorSet {
        symbol: series.symbol().clone(),
        as_of: series.last().map(|b| b.date),
        bar_count: series.len(),
        last_close,
        change_pct: change_pct(&closes),
        volume_change_ratio: volume_change_ratio(&volumes),
        moving_averages,
        trend,
        macd: macd_reading(&closes, config.macd),
        rsi,
        volume,
        range: price_range(series.bars()),
        overextended,
    }
}
