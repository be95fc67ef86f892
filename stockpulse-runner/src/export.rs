//! Run artifacts: the full report as JSON and a one-row-per-symbol CSV snapshot.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::report::{RunReport, SymbolOutcome};

/// Serialize a `RunReport` to pretty JSON.
pub fn export_json(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize RunReport to JSON")
}

fn opt(v: Option<f64>, decimals: usize) -> String {
    v.map(|x| format!("{x:.decimals$}")).unwrap_or_default()
}

/// Moving-average windows present in any ready outcome, ascending.
fn ma_windows(report: &RunReport) -> Vec<usize> {
    let windows: BTreeSet<usize> = report
        .outcomes
        .iter()
        .filter_map(SymbolOutcome::report)
        .flat_map(|r| r.indicators.moving_averages.iter().map(|m| m.window))
        .collect();
    windows.into_iter().collect()
}

/// Indicator snapshot, one row per symbol. Unavailable values are empty cells.
///
/// Columns: symbol, name, status, source, as_of, close, change_pct, one
/// `ma{N}` per configured window, `bias_ma{N}` for the shortest window, trend,
/// macd_dif, macd_dea, macd_cross, rsi, rsi_zone, volume_ratio,
/// volume_change_ratio, volume_band, news_items, failure_causes
pub fn export_csv(report: &RunReport) -> Result<String> {
    let windows = ma_windows(report);
    let bias_window = windows.first().copied();

    let mut headers: Vec<String> = ["symbol", "name", "status", "source", "as_of", "close", "change_pct"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    headers.extend(windows.iter().map(|w| format!("ma{w}")));
    headers.extend(bias_window.map(|w| format!("bias_ma{w}")));
    headers.extend(
        [
            "trend",
            "macd_dif",
            "macd_dea",
            "macd_cross",
            "rsi",
            "rsi_zone",
            "volume_ratio",
            "volume_change_ratio",
            "volume_band",
            "news_items",
            "failure_causes",
        ]
        .iter()
        .map(|h| h.to_string()),
    );

    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(&headers)?;

    for outcome in &report.outcomes {
        let code = outcome.symbol().code().to_string();
        let name = outcome.display_name().unwrap_or("").to_string();
        match outcome {
            SymbolOutcome::Ready(r) => {
                let ind = &r.indicators;
                let mut row = vec![
                    code,
                    name,
                    "ready".to_string(),
                    r.source.clone(),
                    ind.as_of.map(|d| d.to_string()).unwrap_or_default(),
                    opt(ind.last_close, 2),
                    opt(ind.change_pct, 2),
                ];
                row.extend(windows.iter().map(|&w| opt(ind.ma(w), 3)));
                row.extend(bias_window.map(|w| opt(ind.bias(w), 2)));
                row.extend([
                    ind.trend.label().to_string(),
                    opt(ind.macd.dif, 4),
                    opt(ind.macd.dea, 4),
                    ind.macd.cross.label().to_string(),
                    opt(ind.rsi.value, 2),
                    ind.rsi.zone.label().to_string(),
                    opt(ind.volume.ratio, 2),
                    opt(ind.volume_change_ratio, 2),
                    ind.volume.band.map(|b| b.label().to_string()).unwrap_or_default(),
                    r.news.as_ref().map_or(0, |n| n.items.len()).to_string(),
                    String::new(),
                ]);
                wtr.write_record(&row)?;
            }
            SymbolOutcome::Failed { error, .. } => {
                let causes = error
                    .causes
                    .iter()
                    .map(|c| format!("{}={}", c.provider, c.kind))
                    .collect::<Vec<_>>()
                    .join(";");
                let mut row = vec![code, name, "failed".to_string()];
                row.resize(headers.len() - 1, String::new());
                row.push(causes);
                wtr.write_record(&row)?;
            }
        }
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Write `report.json` and `indicators.csv` into `{output_dir}/run_{timestamp}/`.
///
/// Returns the created directory.
pub fn save_artifacts(report: &RunReport, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!("run_{}", report.started_at.format("%Y%m%d_%H%M%S"));
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let json = export_json(report)?;
    std::fs::write(run_dir.join("report.json"), json)
        .with_context(|| format!("failed to write {}", run_dir.join("report.json").display()))?;

    let csv = export_csv(report)?;
    std::fs::write(run_dir.join("indicators.csv"), csv)
        .with_context(|| format!("failed to write {}", run_dir.join("indicators.csv").display()))?;

    Ok(run_dir)
}
