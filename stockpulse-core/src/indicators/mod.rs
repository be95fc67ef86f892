//! IndicatorEngine and its kernels.
//!
//! Kernels (`ema`, `macd`, `rsi`) work on plain `&[f64]` and return full
//! series with NaN warmup, like a precomputed column; moving averages only
//! need the trailing window. `engine::compute` reads the last point of each
//! and turns it into an `IndicatorSet` where anything that cannot be computed
//! is `None`.

pub mod config;
pub mod ema;
pub mod engine;
pub mod macd;
pub mod range;
pub mod rsi;
pub mod sma;
pub mod volume;

pub use config::{IndicatorConfig, Thresholds};
pub use ema::ema_of_series;
pub use engine::{compute, IndicatorSet, MovingAverage, TrendAlignment};
pub use macd::{macd_crossovers, macd_reading, macd_series, MacdCross, MacdParams, MacdReading};
pub use range::{price_range, PriceRange};
pub use rsi::{rsi_of_series, RsiReading, RsiZone};
pub use sma::trailing_mean;
pub use volume::{volume_ratio, VolumeBand, VolumeBands, VolumeReading};

/// Create synthetic bars from close prices for testing.
///
/// open = prev_close (or close for first bar), high = max(open,close) + 1.0,
/// low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
                amount: None,
            }
        })
        .collect()
}

#[cfg(test)]
pub fn make_series(closes: &[f64]) -> crate::domain::PriceSeries {
    let symbol = crate::domain::Symbol::parse("600519").unwrap();
    crate::domain::PriceSeries::new(symbol, make_bars(closes)).unwrap()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
