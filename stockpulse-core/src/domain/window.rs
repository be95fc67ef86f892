//! Date windows and period shorthand (`5d`, `1m`, `1y`, ...).

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("unknown period '{0}' (valid: 5d, 1w, 2w, 1m, 3m, 6m, 1y)")]
    Unknown(String),

    #[error("window start {start} is after end {end}")]
    Inverted { start: NaiveDate, end: NaiveDate },
}

/// Inclusive `[start, end]` range of trade dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PeriodError> {
        if start > end {
            return Err(PeriodError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Lookback shorthand accepted on the command line and in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Period {
    FiveDays,
    OneWeek,
    TwoWeeks,
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
}

impl Period {
    /// Nominal calendar days covered by the period.
    pub fn days(self) -> i64 {
        match self {
            Period::FiveDays => 5,
            Period::OneWeek => 7,
            Period::TwoWeeks => 14,
            Period::OneMonth => 30,
            Period::ThreeMonths => 90,
            Period::SixMonths => 180,
            Period::OneYear => 365,
        }
    }

    /// Window ending at `end`. The start reaches back twice the nominal span so
    /// weekends and holidays still leave enough trading days.
    pub fn window_ending(self, end: NaiveDate) -> DateWindow {
        DateWindow {
            start: end - Duration::days(self.days() * 2),
            end,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Period::FiveDays => "5d",
            Period::OneWeek => "1w",
            Period::TwoWeeks => "2w",
            Period::OneMonth => "1m",
            Period::ThreeMonths => "3m",
            Period::SixMonths => "6m",
            Period::OneYear => "1y",
        }
    }
}

impl FromStr for Period {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "5d" => Ok(Period::FiveDays),
            "1w" => Ok(Period::OneWeek),
            "2w" => Ok(Period::TwoWeeks),
            "1m" => Ok(Period::OneMonth),
            "3m" => Ok(Period::ThreeMonths),
            "6m" => Ok(Period::SixMonths),
            "1y" => Ok(Period::OneYear),
            other => Err(PeriodError::Unknown(other.to_string())),
        }
    }
}

impl TryFrom<String> for Period {
    type Error = PeriodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.as_str().to_string()
    }
}

/// Parse `YYYY-MM-DD` or `YYYYMMDD`.
pub fn parse_date(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d").or_else(|_| NaiveDate::parse_from_str(s, "%Y%m%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn window_rejects_inverted_range() {
        assert!(DateWindow::new(d(2024, 2, 1), d(2024, 1, 1)).is_err());
        assert!(DateWindow::new(d(2024, 1, 1), d(2024, 1, 1)).is_ok());
    }

    #[test]
    fn window_contains_is_inclusive() {
        let w = DateWindow::new(d(2024, 1, 1), d(2024, 1, 31)).unwrap();
        assert!(w.contains(d(2024, 1, 1)));
        assert!(w.contains(d(2024, 1, 31)));
        assert!(!w.contains(d(2024, 2, 1)));
    }

    #[test]
    fn period_doubles_calendar_span() {
        let w = Period::OneMonth.window_ending(d(2024, 3, 31));
        assert_eq!(w.end(), d(2024, 3, 31));
        assert_eq!(w.start(), d(2024, 1, 31));
    }

    #[test]
    fn period_parsing() {
        assert_eq!("6M".parse::<Period>().unwrap(), Period::SixMonths);
        assert_eq!("1y".parse::<Period>().unwrap(), Period::OneYear);
        assert!(matches!("2y".parse::<Period>(), Err(PeriodError::Unknown(_))));
    }

    #[test]
    fn date_formats() {
        assert_eq!(parse_date("2024-01-02").unwrap(), d(2024, 1, 2));
        assert_eq!(parse_date("20240102").unwrap(), d(2024, 1, 2));
        assert!(parse_date("01/02/2024").is_err());
    }
}
