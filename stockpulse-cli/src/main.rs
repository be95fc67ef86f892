//! StockPulse CLI: analyze, fetch, and cache management commands.
//!
//! Commands:
//! - `analyze`: run the full pipeline over a list of stocks and save artifacts
//! - `fetch`: market data only, through the same failover and cache
//! - `cache status`: list cached series with bar counts and sizes
//! - `cache clean`: remove entries older than N days

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Asia::Shanghai;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stockpulse_core::data::{build_market_providers, FetchOrchestrator, ParquetCache};
use stockpulse_core::domain::{Period, Symbol};
use stockpulse_runner::{
    save_artifacts, Credentials, Pipeline, RunReport, RunStatus, StockPulseConfig, SymbolOutcome,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "stockpulse",
    about = "StockPulse: daily A-share indicators with news context"
)]
struct Cli {
    /// Debug-level logging (RUST_LOG takes precedence).
    #[arg(long, global = true, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Window flags shared by `analyze` and `fetch`.
#[derive(clap::Args, Clone, Default)]
struct WindowArgs {
    /// Lookback shorthand: 5d, 1w, 2w, 1m, 3m, 6m, 1y.
    #[arg(long, conflicts_with = "start")]
    period: Option<Period>,

    /// Start date (YYYY-MM-DD).
    #[arg(long)]
    start: Option<NaiveDate>,

    /// End date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    end: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, compute indicators, gather news and commentary for each stock.
    Analyze {
        /// Comma-separated `code` or `code:name` entries. Overrides the config file.
        #[arg(long, value_delimiter = ',')]
        stocks: Vec<String>,

        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Symbols processed concurrently.
        #[arg(long)]
        workers: Option<usize>,

        #[command(flatten)]
        window: WindowArgs,

        /// Skip AI commentary.
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Skip news search.
        #[arg(long, default_value_t = false)]
        no_news: bool,

        /// Cache directory.
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Output directory for report.json and indicators.csv.
        #[arg(long, default_value = "reports")]
        output: PathBuf,
    },
    /// Fetch daily bars for one symbol and report the winning source.
    Fetch {
        symbol: Symbol,

        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        window: WindowArgs,

        /// Cache directory.
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Print the bars as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached series with bar counts and sizes.
    Status {
        /// Cache directory.
        #[arg(long, default_value = "data/cache")]
        cache_dir: PathBuf,
    },
    /// Remove cached series written more than N days ago.
    Clean {
        /// Remove entries older than this many days.
        #[arg(long)]
        older_than_days: u64,

        /// Cache directory.
        #[arg(long, default_value = "data/cache")]
        cache_dir: PathBuf,

        /// Actually delete (without this flag, only previews what would be removed).
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
}

fn init_tracing(debug: bool) {
    let default = if debug {
        "stockpulse=debug,stockpulse_core=debug,stockpulse_runner=debug"
    } else {
        "stockpulse=info,stockpulse_core=info,stockpulse_runner=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match cli.command {
        Commands::Analyze {
            stocks,
            config,
            workers,
            window,
            dry_run,
            no_news,
            cache_dir,
            output,
        } => {
            let mut cfg = load_config(config.as_deref())?;
            if !stocks.is_empty() {
                cfg.pipeline.stocks = stocks;
            }
            if let Some(w) = workers {
                cfg.pipeline.workers = w;
            }
            cfg.pipeline.dry_run |= dry_run;
            if no_news {
                cfg.news.enabled = false;
            }
            if let Some(dir) = cache_dir {
                cfg.fetch.cache_dir = dir;
            }
            apply_window(&mut cfg, &window);
            let status = run_analyze(&cfg, &output)?;
            if status == RunStatus::Failure {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Fetch {
            symbol,
            config,
            window,
            cache_dir,
            json,
        } => {
            let mut cfg = load_config(config.as_deref())?;
            if let Some(dir) = cache_dir {
                cfg.fetch.cache_dir = dir;
            }
            apply_window(&mut cfg, &window);
            run_fetch(&cfg, &symbol, json)
        }
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => run_cache_status(&cache_dir),
            CacheAction::Clean {
                older_than_days,
                cache_dir,
                confirm,
            } => run_cache_clean(&cache_dir, older_than_days, confirm),
        },
    }
}

fn load_config(path: Option<&Path>) -> Result<StockPulseConfig> {
    match path {
        Some(p) => Ok(StockPulseConfig::load(p)?),
        None => Ok(StockPulseConfig::default()),
    }
}

fn apply_window(cfg: &mut StockPulseConfig, window: &WindowArgs) {
    if let Some(period) = window.period {
        cfg.fetch.period = period;
        cfg.fetch.start = None;
    }
    if window.start.is_some() {
        cfg.fetch.start = window.start;
    }
    if window.end.is_some() {
        cfg.fetch.end = window.end;
    }
}

/// Trading date on the exchange clock.
fn today() -> NaiveDate {
    Utc::now().with_timezone(&Shanghai).date_naive()
}

fn run_analyze(cfg: &StockPulseConfig, output: &Path) -> Result<RunStatus> {
    let requests = cfg.symbol_requests()?;
    if requests.is_empty() {
        bail!("no stocks given: pass --stocks or set [pipeline].stocks in the config file");
    }
    let window = cfg.window(today())?;
    let credentials = Credentials::from_env();
    let pipeline = Pipeline::from_config(cfg, &credentials)?;

    let report = pipeline.run(&requests, &window);
    print_summary(&report);

    let run_dir = save_artifacts(&report, output)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(report.status())
}

fn run_fetch(cfg: &StockPulseConfig, symbol: &Symbol, json: bool) -> Result<()> {
    let window = cfg.window(today())?;
    let credentials = Credentials::from_env();
    let providers = build_market_providers(&cfg.fetch.providers, &cfg.market_settings(&credentials))
        .context("failed to build market adapters")?;
    let mut fetcher = FetchOrchestrator::new(providers);
    if cfg.fetch.cache_enabled {
        fetcher = fetcher.with_cache(Arc::new(ParquetCache::new(&cfg.fetch.cache_dir)));
    }

    let fetched = fetcher.fetch(symbol, &window)?;
    let series = &fetched.series;
    println!("Symbol:  {}", symbol.dotted());
    println!("Window:  {window}");
    println!(
        "Source:  {}{}",
        fetched.source,
        if fetched.from_cache { " (cache)" } else { "" }
    );
    println!("Bars:    {}", series.len());
    if let (Some(first), Some(last)) = (series.first(), series.last()) {
        println!("Range:   {} to {}", first.date, last.date);
        println!("Close:   {:.2}", last.close);
    }
    if json {
        println!("{}", serde_json::to_string_pretty(series.bars())?);
    }
    Ok(())
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    let cache = ParquetCache::new(cache_dir);
    let entries = cache.status()?;
    if entries.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    let total: u64 = entries.iter().map(|e| e.bytes).sum();
    println!("Cache: {}", cache_dir.display());
    println!("Entries: {}", entries.len());
    println!("Total size: {}", format_size(total));
    println!();
    println!(
        "{:<8} {:<24} {:>6} {:<10} {:<17} {:>10}",
        "Symbol", "Window", "Bars", "Source", "Cached At", "Size"
    );
    println!("{}", "-".repeat(80));
    for e in &entries {
        println!(
            "{:<8} {:<24} {:>6} {:<10} {:<17} {:>10}",
            e.meta.symbol.code(),
            e.meta.window.to_string(),
            e.meta.bar_count,
            e.meta.source,
            e.meta.cached_at.format("%Y-%m-%d %H:%M").to_string(),
            format_size(e.bytes)
        );
    }
    Ok(())
}

/// `now` minus `days`, or an error when that falls outside the representable range.
fn clean_cutoff(now: DateTime<Utc>, days: u64) -> Result<DateTime<Utc>> {
    let age = i64::try_from(days).ok().and_then(Duration::try_days);
    match age.and_then(|age| now.checked_sub_signed(age)) {
        Some(cutoff) => Ok(cutoff),
        None => bail!("--older-than-days {days} is out of range"),
    }
}

fn run_cache_clean(cache_dir: &Path, older_than_days: u64, confirm: bool) -> Result<()> {
    let cutoff = clean_cutoff(Utc::now(), older_than_days)?;
    let cache = ParquetCache::new(cache_dir);
    let report = cache.clean(cutoff, confirm)?;

    if report.removed.is_empty() {
        println!("No entries older than {older_than_days} days.");
        return Ok(());
    }

    let verb = if report.applied { "Removed" } else { "Would remove" };
    for meta in &report.removed {
        println!("  {verb}: {} {}", meta.symbol.code(), meta.window);
    }
    println!(
        "{verb} {} entr{} ({}).",
        report.removed.len(),
        if report.removed.len() == 1 { "y" } else { "ies" },
        format_size(report.bytes_freed)
    );
    if !report.applied {
        println!();
        println!("Dry run: pass --confirm to actually delete.");
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn na(v: Option<f64>, decimals: usize) -> String {
    v.map(|x| format!("{x:.decimals$}")).unwrap_or_else(|| "N/A".to_string())
}

fn print_summary(report: &RunReport) {
    println!();
    println!("=== StockPulse Run ===");
    println!("Window:   {}", report.window);
    println!(
        "Status:   {} ({} ready, {} failed, {} ms)",
        report.status().as_str(),
        report.ready_count(),
        report.failed_count(),
        report.elapsed_ms()
    );
    for outcome in &report.outcomes {
        println!();
        let name = outcome.display_name().unwrap_or("");
        match outcome {
            SymbolOutcome::Ready(r) => {
                let ind = &r.indicators;
                println!("--- {} {name} [{}] ---", r.symbol.dotted(), r.source);
                println!(
                    "Close:    {}  ({}%)",
                    na(ind.last_close, 2),
                    na(ind.change_pct, 2)
                );
                let mas: Vec<String> = ind
                    .moving_averages
                    .iter()
                    .map(|m| format!("MA{}={}", m.window, na(m.value, 2)))
                    .collect();
                println!("MAs:      {}  [{}]", mas.join(" "), ind.trend.label());
                println!(
                    "MACD:     DIF={} DEA={} {}",
                    na(ind.macd.dif, 3),
                    na(ind.macd.dea, 3),
                    ind.macd.cross.label()
                );
                println!("RSI:      {} {}", na(ind.rsi.value, 1), ind.rsi.zone.label());
                println!(
                    "Volume:   ratio {} {}",
                    na(ind.volume.ratio, 2),
                    ind.volume.band.map(|b| b.label()).unwrap_or("N/A")
                );
                if ind.overextended == Some(true) {
                    println!("WARNING: price far above short MA, do not chase");
                }
                if let Some(news) = &r.news {
                    println!("News:     {} item(s) from {:?}", news.items.len(), news.providers);
                }
                if let Some(text) = &r.commentary {
                    println!();
                    println!("{text}");
                }
            }
            SymbolOutcome::Failed { symbol, error, .. } => {
                println!("--- {} {name} FAILED ---", symbol.dotted());
                for cause in &error.causes {
                    println!("  {cause}");
                }
                if error.looks_invalid() {
                    println!("  (every source returned no rows: invalid or delisted code?)");
                }
            }
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_analyze() {
        let cli = Cli::try_parse_from([
            "stockpulse",
            "analyze",
            "--stocks",
            "600519:贵州茅台,000001",
            "--period",
            "1m",
            "--workers",
            "2",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Commands::Analyze {
                stocks,
                window,
                workers,
                dry_run,
                ..
            } => {
                assert_eq!(stocks, vec!["600519:贵州茅台", "000001"]);
                assert_eq!(window.period, Some(Period::OneMonth));
                assert_eq!(workers, Some(2));
                assert!(dry_run);
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn period_conflicts_with_start() {
        assert!(Cli::try_parse_from([
            "stockpulse",
            "fetch",
            "600519",
            "--period",
            "1m",
            "--start",
            "2024-01-01",
        ])
        .is_err());
    }

    #[test]
    fn window_flags_override_config() {
        let mut cfg = StockPulseConfig::default();
        cfg.fetch.start = Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        apply_window(
            &mut cfg,
            &WindowArgs {
                period: Some(Period::OneWeek),
                ..WindowArgs::default()
            },
        );
        assert_eq!(cfg.fetch.start, None);
        assert_eq!(cfg.fetch.period, Period::OneWeek);
    }

    #[test]
    fn clean_cutoff_rejects_out_of_range_ages() {
        let now = Utc::now();
        assert_eq!(clean_cutoff(now, 0).unwrap(), now);
        assert_eq!(clean_cutoff(now, 30).unwrap(), now - Duration::days(30));
        assert!(clean_cutoff(now, 999_999_999_999_999).is_err());
        assert!(clean_cutoff(now, u64::MAX).is_err());
    }

    #[test]
    fn sizes() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
