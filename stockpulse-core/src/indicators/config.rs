//! Indicator windows and classification thresholds.

use super::macd::MacdParams;
use super::volume::VolumeBands;
use serde::{Deserialize, Serialize};

/// Classification thresholds. Domain conventions, tunable without touching
/// the kernels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    /// MA5 bias above this percentage marks the price as overextended.
    pub bias_safe_pct: f64,
    pub volume_bands: VolumeBands,
    /// Days averaged for the volume ratio denominator.
    pub volume_lookback: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            bias_safe_pct: 5.0,
            volume_bands: VolumeBands::default(),
            volume_lookback: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub ma_windows: Vec<usize>,
    pub rsi_period: usize,
    pub macd: MacdParams,
    pub thresholds: Thresholds,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ma_windows: vec![5, 10, 20, 60],
            rsi_period: 14,
            macd: MacdParams::default(),
            thresholds: Thresholds::default(),
        }
    }
}

impl IndicatorConfig {
    /// Describe the first problem found, if any.
    pub fn validate(&self) -> Result<(), String> {
        if self.ma_windows.is_empty() || self.ma_windows.contains(&0) {
            return Err("ma_windows must be non-empty and every window > 0".into());
        }
        if self.rsi_period == 0 {
            return Err("rsi_period must be > 0".into());
        }
        let m = self.macd;
        if m.fast == 0 || m.signal == 0 || m.fast >= m.slow {
            return Err(format!(
                "macd periods must satisfy 0 < fast < slow and signal > 0, got ({}, {}, {})",
                m.fast, m.slow, m.signal
            ));
        }
        let t = &self.thresholds;
        if t.rsi_oversold >= t.rsi_overbought {
            return Err("rsi_oversold must be below rsi_overbought".into());
        }
        if !t.volume_bands.is_ordered() {
            return Err("volume band cut points must be strictly ascending".into());
        }
        if t.volume_lookback == 0 {
            return Err("volume_lookback must be > 0".into());
        }
        Ok(())
    }
}
