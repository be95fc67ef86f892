//! Per-symbol outcomes and the run-level summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stockpulse_core::data::DataUnavailable;
use stockpulse_core::domain::{DateWindow, Symbol};
use stockpulse_core::indicators::IndicatorSet;
use stockpulse_core::news::NewsBundle;

use crate::pipeline::SymbolState;

/// Everything produced for one symbol that reached `Ready`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolReport {
    pub symbol: Symbol,
    pub display_name: Option<String>,
    /// Adapter that produced the series.
    pub source: String,
    pub from_cache: bool,
    pub indicators: IndicatorSet,
    /// `None` when news search is switched off.
    pub news: Option<NewsBundle>,
    /// `None` on dry runs, when no collaborator is configured, or when it failed.
    pub commentary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SymbolOutcome {
    Ready(Box<SymbolReport>),
    Failed {
        symbol: Symbol,
        display_name: Option<String>,
        error: DataUnavailable,
    },
}

impl SymbolOutcome {
    pub fn symbol(&self) -> &Symbol {
        match self {
            SymbolOutcome::Ready(r) => &r.symbol,
            SymbolOutcome::Failed { symbol, .. } => symbol,
        }
    }

    pub fn display_name(&self) -> Option<&str> {
        match self {
            SymbolOutcome::Ready(r) => r.display_name.as_deref(),
            SymbolOutcome::Failed { display_name, .. } => display_name.as_deref(),
        }
    }

    pub fn state(&self) -> SymbolState {
        match self {
            SymbolOutcome::Ready(_) => SymbolState::Ready,
            SymbolOutcome::Failed { .. } => SymbolState::Failed,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, SymbolOutcome::Ready(_))
    }

    pub fn report(&self) -> Option<&SymbolReport> {
        match self {
            SymbolOutcome::Ready(r) => Some(r),
            SymbolOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&DataUnavailable> {
        match self {
            SymbolOutcome::Ready(_) => None,
            SymbolOutcome::Failed { error, .. } => Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    PartialSuccess,
    Failure,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::PartialSuccess => "partial_success",
            RunStatus::Failure => "failure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub window: DateWindow,
    /// One entry per requested symbol, in request order.
    pub outcomes: Vec<SymbolOutcome>,
}

impl RunReport {
    pub fn ready_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ready()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.ready_count()
    }

    /// An empty batch counts as success: nothing failed.
    pub fn status(&self) -> RunStatus {
        match (self.ready_count(), self.failed_count()) {
            (_, 0) => RunStatus::Success,
            (0, _) => RunStatus::Failure,
            _ => RunStatus::PartialSuccess,
        }
    }

    pub fn outcome(&self, symbol: &Symbol) -> Option<&SymbolOutcome> {
        self.outcomes.iter().find(|o| o.symbol() == symbol)
    }

    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use stockpulse_core::domain::{Bar, PriceSeries};
    use stockpulse_core::indicators::{compute, IndicatorConfig};
    use stockpulse_core::provider::ProviderFailure;

    fn window() -> DateWindow {
        DateWindow::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        )
        .unwrap()
    }

    fn ready(code: &str) -> SymbolOutcome {
        let symbol = Symbol::parse(code).unwrap();
        let bars = vec![Bar {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            open: 10.0,
            high: 11.0,
            low: 9.0,
            close: 10.5,
            volume: 1000.0,
            amount: None,
        }];
        let series = PriceSeries::new(symbol.clone(), bars).unwrap();
        SymbolOutcome::Ready(Box::new(SymbolReport {
            symbol,
            display_name: None,
            source: "eastmoney".into(),
            from_cache: false,
            indicators: compute(&series, &IndicatorConfig::default()),
            news: None,
            commentary: None,
        }))
    }

    fn failed(code: &str) -> SymbolOutcome {
        let symbol = Symbol::parse(code).unwrap();
        SymbolOutcome::Failed {
            symbol: symbol.clone(),
            display_name: None,
            error: DataUnavailable {
                symbol,
                causes: vec![ProviderFailure::empty("eastmoney", "no klines")],
            },
        }
    }

    fn report(outcomes: Vec<SymbolOutcome>) -> RunReport {
        let now = Utc::now();
        RunReport {
            started_at: now,
            finished_at: now,
            window: window(),
            outcomes,
        }
    }

    #[test]
    fn status_from_counts() {
        assert_eq!(report(vec![ready("600519")]).status(), RunStatus::Success);
        assert_eq!(report(vec![failed("999999")]).status(), RunStatus::Failure);
        let mixed = report(vec![ready("600519"), failed("999999")]);
        assert_eq!(mixed.status(), RunStatus::PartialSuccess);
        assert_eq!((mixed.ready_count(), mixed.failed_count()), (1, 1));
        assert_eq!(report(vec![]).status(), RunStatus::Success);
    }

    #[test]
    fn failed_outcome_keeps_causes_in_json() {
        let json = serde_json::to_string(&failed("999999")).unwrap();
        assert!(json.contains(r#""status":"failed""#));
        assert!(json.contains("empty_result"));
        let back: SymbolOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back.error().unwrap().causes.len(), 1);
        assert_eq!(back.state(), SymbolState::Failed);
    }
}
