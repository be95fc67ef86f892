//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = EMA[t-1] + alpha * (x[t] - EMA[t-1]), alpha = 2 / (n + 1).
//! Seed: EMA[0] = x[0]. Every output depends only on inputs at or before t.
//!
//! The update is written as a correction to the previous value so a flat input
//! yields an exactly flat output.

/// EMA of `values` with smoothing period `period`, seeded with the first value.
///
/// A NaN input taints every later output.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if n == 0 || period == 0 {
        return result;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = values[0];
    result[0] = prev;

    for i in 1..n {
        if values[i].is_nan() || prev.is_nan() {
            return result;
        }
        prev += alpha * (values[i] - prev);
        result[i] = prev;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn ema_period_1_equals_input() {
        let result = ema_of_series(&[100.0, 200.0, 300.0], 1);
        assert_approx(result[0], 100.0, DEFAULT_EPSILON);
        assert_approx(result[1], 200.0, DEFAULT_EPSILON);
        assert_approx(result[2], 300.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_3_known_values() {
        // alpha = 0.5, seed = 10
        // EMA[1] = 10 + 0.5*(11-10) = 10.5
        // EMA[2] = 10.5 + 0.5*(12-10.5) = 11.25
        let result = ema_of_series(&[10.0, 11.0, 12.0], 3);
        assert_approx(result[0], 10.0, DEFAULT_EPSILON);
        assert_approx(result[1], 10.5, DEFAULT_EPSILON);
        assert_approx(result[2], 11.25, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_flat_input_is_exactly_flat() {
        let result = ema_of_series(&[7.3; 50], 26);
        assert!(result.iter().all(|&v| v == 7.3));
    }

    #[test]
    fn ema_nan_taints_rest() {
        let result = ema_of_series(&[10.0, 11.0, f64::NAN, 13.0], 3);
        assert_approx(result[1], 10.5, DEFAULT_EPSILON);
        assert!(result[2].is_nan());
        assert!(result[3].is_nan());
    }

    #[test]
    fn ema_has_no_lookahead() {
        let full = [10.0, 12.0, 11.0, 15.0, 14.0, 18.0];
        let full_result = ema_of_series(&full, 4);
        let truncated = ema_of_series(&full[..4], 4);
        for i in 0..4 {
            assert_eq!(full_result[i], truncated[i]);
        }
    }
}
