//! PriceSeries: ordered daily bars for one symbol.

use super::bar::Bar;
use super::symbol::Symbol;
use super::window::DateWindow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("bar dates must be strictly increasing: {prev} followed by {next}")]
    NotIncreasing { prev: NaiveDate, next: NaiveDate },
}

/// Gap-tolerant sequence of bars with strictly increasing trade dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSeries")]
pub struct PriceSeries {
    symbol: Symbol,
    bars: Vec<Bar>,
}

/// Wire shape, checked by `PriceSeries::new` on the way in.
#[derive(Deserialize)]
struct RawSeries {
    symbol: Symbol,
    bars: Vec<Bar>,
}

impl TryFrom<RawSeries> for PriceSeries {
    type Error = SeriesError;

    fn try_from(raw: RawSeries) -> Result<Self, Self::Error> {
        PriceSeries::new(raw.symbol, raw.bars)
    }
}

impl PriceSeries {
    /// Build a series from bars already in ascending date order.
    pub fn new(symbol: Symbol, bars: Vec<Bar>) -> Result<Self, SeriesError> {
        for pair in bars.windows(2) {
            if pair[0].date >= pair[1].date {
                return Err(SeriesError::NotIncreasing {
                    prev: pair[0].date,
                    next: pair[1].date,
                });
            }
        }
        Ok(Self { symbol, bars })
    }

    /// Build a series from bars in any order. Sorts ascending and keeps the
    /// first bar seen for each date.
    pub fn from_unordered(symbol: Symbol, mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        Self { symbol, bars }
    }

    pub fn empty(symbol: Symbol) -> Self {
        Self {
            symbol,
            bars: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    /// First bar dated outside `window`, if any.
    pub fn first_outside(&self, window: &DateWindow) -> Option<&Bar> {
        self.bars.iter().find(|b| !window.contains(b.date))
    }

    /// Copy of the series restricted to `window`.
    pub fn within(&self, window: &DateWindow) -> Self {
        Self {
            symbol: self.symbol.clone(),
            bars: self
                .bars
                .iter()
                .filter(|b| window.contains(b.date))
                .cloned()
                .collect(),
        }
    }
}
