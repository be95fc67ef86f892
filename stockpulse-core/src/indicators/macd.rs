//! MACD (Moving Average Convergence/Divergence).
//!
//! DIF = EMA(close, fast) - EMA(close, slow)
//! DEA = EMA(DIF, signal)
//! Histogram = 2 * (DIF - DEA)
//!
//! Both EMAs start at the first observation, so DIF and DEA exist from index 0,
//! but the signal is only meaningful once `slow + signal` observations exist.
//! Shorter series report `InsufficientData` and no numbers.

use super::ema::ema_of_series;
use serde::{Deserialize, Serialize};

/// MACD periods `(fast, slow, signal)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacdParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl MacdParams {
    /// Observations needed for a non-degenerate reading.
    pub fn min_observations(&self) -> usize {
        self.slow + self.signal
    }
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

/// Full DIF / DEA / histogram series, same length as the input.
#[derive(Debug, Clone)]
pub struct MacdSeries {
    pub dif: Vec<f64>,
    pub dea: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd_series(closes: &[f64], params: MacdParams) -> MacdSeries {
    let fast = ema_of_series(closes, params.fast);
    let slow = ema_of_series(closes, params.slow);
    let dif: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
    let dea = ema_of_series(&dif, params.signal);
    let histogram = dif.iter().zip(&dea).map(|(d, e)| 2.0 * (d - e)).collect();
    MacdSeries { dif, dea, histogram }
}

/// Crossover state of DIF against DEA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacdCross {
    /// DIF moved from at-or-below DEA to above it.
    GoldenCross,
    /// DIF moved from at-or-above DEA to below it.
    DeathCross,
    None,
    InsufficientData,
}

impl MacdCross {
    pub fn label(self) -> &'static str {
        match self {
            MacdCross::GoldenCross => "golden cross",
            MacdCross::DeathCross => "death cross",
            MacdCross::None => "none",
            MacdCross::InsufficientData => "insufficient data",
        }
    }
}

/// Crossover classification between index `i - 1` and `i`.
pub fn cross_at(dif: &[f64], dea: &[f64], i: usize) -> MacdCross {
    if i == 0 || i >= dif.len() || i >= dea.len() {
        return MacdCross::None;
    }
    let prev = dif[i - 1] - dea[i - 1];
    let curr = dif[i] - dea[i];
    if prev.is_nan() || curr.is_nan() {
        MacdCross::None
    } else if prev <= 0.0 && curr > 0.0 {
        MacdCross::GoldenCross
    } else if prev >= 0.0 && curr < 0.0 {
        MacdCross::DeathCross
    } else {
        MacdCross::None
    }
}

/// Per-index crossover classification; index 0 is always `None`.
pub fn macd_crossovers(dif: &[f64], dea: &[f64]) -> Vec<MacdCross> {
    (0..dif.len().min(dea.len()))
        .map(|i| cross_at(dif, dea, i))
        .collect()
}

/// MACD as of the last observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdReading {
    pub dif: Option<f64>,
    pub dea: Option<f64>,
    pub histogram: Option<f64>,
    pub cross: MacdCross,
}

impl MacdReading {
    pub fn insufficient() -> Self {
        Self {
            dif: None,
            dea: None,
            histogram: None,
            cross: MacdCross::InsufficientData,
        }
    }
}

pub fn macd_reading(closes: &[f64], params: MacdParams) -> MacdReading {
    let n = closes.len();
    if n < params.min_observations() || n < 2 {
        return MacdReading::insufficient();
    }
    let series = macd_series(closes, params);
    let last = n - 1;
    let finite = |v: f64| v.is_finite().then_some(v);
    let dif = finite(series.dif[last]);
    let dea = finite(series.dea[last]);
    let histogram = finite(series.histogram[last]);
    if dif.is_none() || dea.is_none() {
        return MacdReading::insufficient();
    }
    MacdReading {
        dif,
        dea,
        histogram,
        cross: cross_at(&series.dif, &series.dea, last),
    }
}
