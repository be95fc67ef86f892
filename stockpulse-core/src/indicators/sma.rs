//! Simple moving average of the most recent values.

/// Mean of the last `window` values, or `None` if fewer than `window` exist
/// or the tail holds a non-finite value.
pub fn trailing_mean(values: &[f64], window: usize) -> Option<f64> {
    if window == 0 || values.len() < window {
        return None;
    }
    let tail = &values[values.len() - window..];
    let mean = tail.iter().sum::<f64>() / window as f64;
    mean.is_finite().then_some(mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn trailing_mean_needs_full_window() {
        assert_eq!(trailing_mean(&[1.0, 2.0], 3), None);
        assert_eq!(trailing_mean(&[1.0, 2.0, 3.0, 4.0], 2), Some(3.5));
        assert_eq!(trailing_mean(&[], 0), None);
    }

    #[test]
    fn trailing_mean_reads_only_the_tail() {
        let mean = trailing_mean(&[f64::NAN, 10.0, 11.0, 12.0, 13.0, 14.0], 5).unwrap();
        assert_approx(mean, 12.0, DEFAULT_EPSILON);
        assert_eq!(trailing_mean(&[10.0, f64::NAN, 12.0], 2), None);
    }
}
