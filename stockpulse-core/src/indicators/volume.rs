//! Volume ratio: today's volume against the mean of the preceding days.

use serde::{Deserialize, Serialize};

/// Volume ratio band. Each band includes its lower bound and excludes its
/// upper bound, so the bands partition `[0, inf)` without gaps or overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeBand {
    ExtremeShrink,
    Shrink,
    Normal,
    MildExpansion,
    Expansion,
    Surge,
}

impl VolumeBand {
    pub fn label(self) -> &'static str {
        match self {
            VolumeBand::ExtremeShrink => "extreme shrink",
            VolumeBand::Shrink => "shrink",
            VolumeBand::Normal => "normal",
            VolumeBand::MildExpansion => "mild expansion",
            VolumeBand::Expansion => "expansion",
            VolumeBand::Surge => "surge",
        }
    }
}

/// Cut points between the six volume bands, ascending.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeBands {
    pub extreme_shrink_below: f64,
    pub shrink_below: f64,
    pub normal_below: f64,
    pub mild_expansion_below: f64,
    pub expansion_below: f64,
}

impl Default for VolumeBands {
    fn default() -> Self {
        Self {
            extreme_shrink_below: 0.5,
            shrink_below: 0.8,
            normal_below: 1.2,
            mild_expansion_below: 2.0,
            expansion_below: 3.0,
        }
    }
}

impl VolumeBands {
    pub fn classify(&self, ratio: f64) -> VolumeBand {
        if ratio < self.extreme_shrink_below {
            VolumeBand::ExtremeShrink
        } else if ratio < self.shrink_below {
            VolumeBand::Shrink
        } else if ratio < self.normal_below {
            VolumeBand::Normal
        } else if ratio < self.mild_expansion_below {
            VolumeBand::MildExpansion
        } else if ratio < self.expansion_below {
            VolumeBand::Expansion
        } else {
            VolumeBand::Surge
        }
    }

    /// True when the cut points are finite and strictly ascending.
    pub fn is_ordered(&self) -> bool {
        let cuts = [
            self.extreme_shrink_below,
            self.shrink_below,
            self.normal_below,
            self.mild_expansion_below,
            self.expansion_below,
        ];
        cuts.iter().all(|c| c.is_finite()) && cuts.windows(2).all(|w| w[0] < w[1])
    }
}

/// Last volume divided by the mean of the `lookback` volumes before it.
///
/// `None` with fewer than `lookback + 1` volumes or a zero/non-finite mean.
pub fn volume_ratio(volumes: &[f64], lookback: usize) -> Option<f64> {
    let n = volumes.len();
    if lookback == 0 || n < lookback + 1 {
        return None;
    }
    let today = volumes[n - 1];
    let prior = &volumes[n - 1 - lookback..n - 1];
    let mean = prior.iter().sum::<f64>() / lookback as f64;
    if !mean.is_finite() || mean <= 0.0 || !today.is_finite() {
        return None;
    }
    Some(today / mean)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeReading {
    pub ratio: Option<f64>,
    pub band: Option<VolumeBand>,
}
