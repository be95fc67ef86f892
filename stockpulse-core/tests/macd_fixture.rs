//! Fixture-driven MACD crossover scenario.
//!
//! 35 daily closes: 20 flat sessions at 10.0, then 15 sessions rising by 1.0.
//! Before the transition DIF and DEA are exactly zero; the first rising close
//! lifts DIF above DEA, which is the only crossover in the series.
//!
//! Expected values at the transition (index 20), computed by hand:
//!   EMA12 = 10 + 2/13, EMA26 = 10 + 2/27  →  DIF = 2/13 - 2/27 = 28/351
//!   DEA   = 0 + 2/10 · DIF                →  DEA = 28/1755

use stockpulse_core::indicators::{macd_crossovers, macd_reading, macd_series, MacdCross, MacdParams};

const TRANSITION: usize = 20;

fn fixture() -> Vec<f64> {
    let mut closes = vec![10.0; TRANSITION];
    closes.extend((1..=15).map(|i| 10.0 + i as f64));
    closes
}

fn approx(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-12,
        "actual={actual}, expected={expected}"
    );
}

#[test]
fn fixture_has_exactly_minimum_length() {
    assert_eq!(fixture().len(), MacdParams::default().min_observations());
}

#[test]
fn single_golden_cross_at_transition() {
    let s = macd_series(&fixture(), MacdParams::default());
    let crosses = macd_crossovers(&s.dif, &s.dea);

    assert_eq!(crosses.len(), 35);
    for (i, cross) in crosses.iter().enumerate() {
        if i == TRANSITION {
            assert_eq!(*cross, MacdCross::GoldenCross, "index {i}");
        } else {
            assert_eq!(*cross, MacdCross::None, "index {i}");
        }
    }
}

#[test]
fn exact_values_at_transition() {
    let s = macd_series(&fixture(), MacdParams::default());

    for i in 0..TRANSITION {
        assert_eq!(s.dif[i], 0.0);
        assert_eq!(s.dea[i], 0.0);
    }
    approx(s.dif[TRANSITION], 28.0 / 351.0);
    approx(s.dea[TRANSITION], 28.0 / 1755.0);
    approx(s.histogram[TRANSITION], 2.0 * (28.0 / 351.0 - 28.0 / 1755.0));
}

#[test]
fn reading_at_last_bar() {
    let r = macd_reading(&fixture(), MacdParams::default());
    assert_eq!(r.cross, MacdCross::None);
    approx(r.dif.unwrap_or(f64::NAN), 3.508330189363722);
    approx(r.dea.unwrap_or(f64::NAN), 2.5418339934797087);
}

#[test]
fn one_bar_short_is_insufficient() {
    let closes = fixture();
    let r = macd_reading(&closes[1..], MacdParams::default());
    assert_eq!(r.cross, MacdCross::InsufficientData);
    assert_eq!(r.dif, None);
    assert_eq!(r.dea, None);
}

#[test]
fn reading_on_transition_day_is_golden() {
    // Pad the front so the transition lands on the last of 35 bars.
    let mut closes = vec![10.0; 34];
    closes.push(11.0);
    let r = macd_reading(&closes, MacdParams::default());
    assert_eq!(r.cross, MacdCross::GoldenCross);
    approx(r.dif.unwrap_or(f64::NAN), 28.0 / 351.0);
    approx(r.dea.unwrap_or(f64::NAN), 28.0 / 1755.0);
}
