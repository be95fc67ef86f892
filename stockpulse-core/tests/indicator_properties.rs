//! Property tests for indicator invariants.
//!
//! Uses proptest to verify:
//! 1. MA(w) and its bias are unavailable whenever the series is shorter than w
//! 2. RSI stays within [0, 100]; a constant close yields exactly 50
//! 3. Volume banding is a total, non-overlapping partition of the positive reals
//! 4. No indicator ever reports a non-finite number

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use stockpulse_core::domain::{Bar, PriceSeries, Symbol};
use stockpulse_core::indicators::{
    compute, rsi_of_series, IndicatorConfig, RsiZone, VolumeBand, VolumeBands,
};

// ── Helpers ──────────────────────────────────────────────────────────

fn series_from(closes: &[f64], volumes: &[f64]) -> PriceSeries {
    let base = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let bars = closes
        .iter()
        .zip(volumes)
        .enumerate()
        .map(|(i, (&close, &volume))| Bar {
            date: base + Duration::days(i as i64),
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume,
            amount: None,
        })
        .collect();
    PriceSeries::new(Symbol::parse("000001").unwrap(), bars).unwrap()
}

// ── Strategies ───────────────────────────────────────────────────────

fn arb_closes(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0..500.0_f64, 0..max_len)
}

fn arb_series(max_len: usize) -> impl Strategy<Value = PriceSeries> {
    prop::collection::vec((1.0..500.0_f64, 0.0..1e7_f64), 0..max_len).prop_map(|rows| {
        let (closes, volumes): (Vec<f64>, Vec<f64>) = rows.into_iter().unzip();
        series_from(&closes, &volumes)
    })
}

// ── 1. Moving-average unavailability ─────────────────────────────────

proptest! {
    #[test]
    fn ma_unavailable_below_window(series in arb_series(80)) {
        let set = compute(&series, &IndicatorConfig::default());
        for ma in &set.moving_averages {
            if series.len() < ma.window {
                prop_assert!(ma.value.is_none(), "MA{} computed from {} bars", ma.window, series.len());
                prop_assert!(ma.bias_pct.is_none());
            } else {
                prop_assert!(ma.value.is_some());
            }
        }
    }
}

// ── 2. RSI bounds ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn rsi_is_bounded(closes in arb_closes(120), period in 2usize..30) {
        for v in rsi_of_series(&closes, period) {
            if !v.is_nan() {
                prop_assert!((0.0..=100.0).contains(&v), "RSI out of range: {v}");
            }
        }
    }

    #[test]
    fn flat_series_rsi_is_fifty(price in 1.0..1000.0_f64, len in 15usize..100) {
        let closes = vec![price; len];
        let series = series_from(&closes, &vec![1000.0; len]);
        let set = compute(&series, &IndicatorConfig::default());
        prop_assert_eq!(set.rsi.value, Some(50.0));
        prop_assert_eq!(set.rsi.zone, RsiZone::Normal);
    }
}

// ── 3. Volume band partition ─────────────────────────────────────────

fn band_bounds(band: VolumeBand, b: &VolumeBands) -> (f64, f64) {
    match band {
        VolumeBand::ExtremeShrink => (0.0, b.extreme_shrink_below),
        VolumeBand::Shrink => (b.extreme_shrink_below, b.shrink_below),
        VolumeBand::Normal => (b.shrink_below, b.normal_below),
        VolumeBand::MildExpansion => (b.normal_below, b.mild_expansion_below),
        VolumeBand::Expansion => (b.mild_expansion_below, b.expansion_below),
        VolumeBand::Surge => (b.expansion_below, f64::INFINITY),
    }
}

proptest! {
    #[test]
    fn every_ratio_lands_in_exactly_one_band(ratio in 0.0..100.0_f64) {
        let bands = VolumeBands::default();
        let all = [
            VolumeBand::ExtremeShrink,
            VolumeBand::Shrink,
            VolumeBand::Normal,
            VolumeBand::MildExpansion,
            VolumeBand::Expansion,
            VolumeBand::Surge,
        ];
        let containing: Vec<VolumeBand> = all
            .into_iter()
            .filter(|&band| {
                let (lo, hi) = band_bounds(band, &bands);
                ratio >= lo && ratio < hi
            })
            .collect();
        prop_assert_eq!(containing.len(), 1);
        prop_assert_eq!(containing[0], bands.classify(ratio));
    }

    #[test]
    fn banding_is_monotonic(a in 0.0..10.0_f64, b in 0.0..10.0_f64) {
        let bands = VolumeBands::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let rank = |band: VolumeBand| band_bounds(band, &bands).0;
        prop_assert!(rank(bands.classify(lo)) <= rank(bands.classify(hi)));
    }
}

// ── 4. Finite outputs ────────────────────────────────────────────────

proptest! {
    #[test]
    fn reported_numbers_are_finite(series in arb_series(90)) {
        let set = compute(&series, &IndicatorConfig::default());
        let finite = |v: Option<f64>| v.map_or(true, f64::is_finite);
        prop_assert!(set.moving_averages.iter().all(|m| finite(m.value) && finite(m.bias_pct)));
        prop_assert!(finite(set.macd.dif) && finite(set.macd.dea) && finite(set.macd.histogram));
        prop_assert!(finite(set.rsi.value));
        prop_assert!(finite(set.volume.ratio));
        prop_assert!(finite(set.range.amplitude_pct));
        prop_assert!(finite(set.change_pct));
        prop_assert!(finite(set.volume_change_ratio));
        prop_assert_eq!(set.bar_count, series.len());
    }
}
