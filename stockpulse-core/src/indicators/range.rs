//! Price-range statistics over a whole series.

use crate::domain::Bar;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceRange {
    pub max_high: Option<f64>,
    pub min_low: Option<f64>,
    /// `(max_high - min_low) / min_low`, in percent.
    pub amplitude_pct: Option<f64>,
    pub mean_close: Option<f64>,
}

pub fn price_range(bars: &[Bar]) -> PriceRange {
    if bars.is_empty() {
        return PriceRange::default();
    }

    let max_high = bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let min_low = bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let mean_close = bars.iter().map(|b| b.close).sum::<f64>() / bars.len() as f64;

    let finite = |v: f64| v.is_finite().then_some(v);
    let amplitude_pct = if min_low.is_finite() && max_high.is_finite() && min_low != 0.0 {
        finite((max_high - min_low) / min_low * 100.0)
    } else {
        None
    };

    PriceRange {
        max_high: finite(max_high),
        min_low: finite(min_low),
        amplitude_pct,
        mean_close: finite(mean_close),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn range_over_full_series() {
        // make_bars: high = max(open, close) + 1, low = min(open, close) - 1
        let bars = make_bars(&[10.0, 12.0, 11.0]);
        let r = price_range(&bars);
        assert_eq!(r.max_high, Some(13.0));
        assert_eq!(r.min_low, Some(9.0));
        assert_approx(r.amplitude_pct.unwrap_or(f64::NAN), 4.0 / 9.0 * 100.0, DEFAULT_EPSILON);
        assert_approx(r.mean_close.unwrap_or(f64::NAN), 11.0, DEFAULT_EPSILON);
    }

    #[test]
    fn empty_series_is_unavailable() {
        assert_eq!(price_range(&[]), PriceRange::default());
    }

    #[test]
    fn zero_low_leaves_amplitude_unavailable() {
        let mut bars = make_bars(&[1.0, 2.0]);
        bars[0].low = 0.0;
        let r = price_range(&bars);
        assert_eq!(r.min_low, Some(0.0));
        assert_eq!(r.amplitude_pct, None);
    }
}
