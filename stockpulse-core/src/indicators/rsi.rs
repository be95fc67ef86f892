//! Relative Strength Index (RSI).
//!
//! Uses Wilder smoothing of average gains and average losses.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! First value at index `period` (needs `period + 1` closes).
//! Edge cases: no movement → 50; avg_loss == 0 → 100; avg_gain == 0 → 0.

use serde::{Deserialize, Serialize};

/// RSI series over `closes`. Entries before index `period` are NaN.
pub fn rsi_of_series(closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n < period + 1 {
        return result;
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    // Seed: simple average over the first `period` changes
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for &ch in &changes[..period] {
        if ch.is_nan() {
            return result;
        }
        if ch > 0.0 {
            avg_gain += ch;
        } else {
            avg_loss -= ch;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;

    result[period] = compute_rsi(avg_gain, avg_loss);

    let alpha = 1.0 / period as f64;
    for i in (period + 1)..n {
        let ch = changes[i - 1];
        if ch.is_nan() {
            return result;
        }
        let gain = ch.max(0.0);
        let loss = (-ch).max(0.0);

        avg_gain = alpha * gain + (1.0 - alpha) * avg_gain;
        avg_loss = alpha * loss + (1.0 - alpha) * avg_loss;

        result[i] = compute_rsi(avg_gain, avg_loss);
    }

    result
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// RSI classification band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsiZone {
    Overbought,
    Oversold,
    Normal,
    Unavailable,
}

impl RsiZone {
    pub fn classify(value: Option<f64>, overbought: f64, oversold: f64) -> Self {
        match value {
            None => RsiZone::Unavailable,
            Some(v) if v > overbought => RsiZone::Overbought,
            Some(v) if v < oversold => RsiZone::Oversold,
            Some(_) => RsiZone::Normal,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RsiZone::Overbought => "overbought",
            RsiZone::Oversold => "oversold",
            RsiZone::Normal => "normal",
            RsiZone::Unavailable => "unavailable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RsiReading {
    pub period: usize,
    pub value: Option<f64>,
    pub zone: RsiZone,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_approx;

    #[test]
    fn rsi_all_gains() {
        let result = rsi_of_series(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0], 3);
        assert_approx(result[3], 100.0, 1e-6);
        assert_approx(result[5], 100.0, 1e-6);
    }

    #[test]
    fn rsi_all_losses() {
        let result = rsi_of_series(&[105.0, 104.0, 103.0, 102.0, 101.0, 100.0], 3);
        assert_approx(result[3], 0.0, 1e-6);
    }

    #[test]
    fn rsi_flat_is_fifty() {
        let result = rsi_of_series(&[42.0; 20], 14);
        assert_approx(result[14], 50.0, 1e-12);
        assert_approx(result[19], 50.0, 1e-12);
    }

    #[test]
    fn rsi_mixed_seed_value() {
        // Changes: +0.34, -0.25, -0.48 → avg_gain = 0.34/3, avg_loss = 0.73/3
        // RSI = 100 - 100 / (1 + 0.34/0.73)
        let result = rsi_of_series(&[44.0, 44.34, 44.09, 43.61, 44.33], 3);
        assert!(result[0].is_nan());
        assert!(result[2].is_nan());
        assert_approx(result[3], 100.0 - 100.0 / (1.0 + 0.34 / 0.73), 1e-9);
    }

    #[test]
    fn rsi_wilder_step() {
        // After seed: gain 0.72 → avg_gain = (1/3)*0.72 + (2/3)*(0.34/3)
        //                         avg_loss = (2/3)*(0.73/3)
        let result = rsi_of_series(&[44.0, 44.34, 44.09, 43.61, 44.33], 3);
        let g = 0.72 / 3.0 + (2.0 / 3.0) * (0.34 / 3.0);
        let l = (2.0 / 3.0) * (0.73 / 3.0);
        assert_approx(result[4], 100.0 - 100.0 / (1.0 + g / l), 1e-9);
    }

    #[test]
    fn rsi_needs_period_plus_one() {
        assert!(rsi_of_series(&[1.0; 14], 14).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn zone_classification() {
        assert_eq!(RsiZone::classify(Some(71.0), 70.0, 30.0), RsiZone::Overbought);
        assert_eq!(RsiZone::classify(Some(70.0), 70.0, 30.0), RsiZone::Normal);
        assert_eq!(RsiZone::classify(Some(29.9), 70.0, 30.0), RsiZone::Oversold);
        assert_eq!(RsiZone::classify(None, 70.0, 30.0), RsiZone::Unavailable);
    }
}
