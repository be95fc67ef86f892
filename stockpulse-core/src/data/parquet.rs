//! Parquet-backed series cache with Hive-style partitioning.
//!
//! Layout: `{cache_dir}/symbol={CODE}/{start}_{end}.parquet` with a
//! `{start}_{end}.meta.json` sidecar (bar count, blake3 hash, source, cached_at).
//!
//! - Atomic writes (unique temp file in the same directory, persisted into place)
//! - Integrity validation on load (schema check, row count, hash)
//! - Quarantine for corrupt files ({filename}.quarantined), reported as a miss

use super::cache::{CacheEntry, CacheError, CacheKey, SeriesCache};
use crate::domain::{Bar, DateWindow, PriceSeries, Symbol};
use chrono::{DateTime, NaiveDate, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

const EXPECTED_COLUMNS: [&str; 7] = ["date", "open", "high", "low", "close", "volume", "amount"];

/// Metadata sidecar for one cached `(symbol, window)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub symbol: Symbol,
    pub window: DateWindow,
    pub bar_count: usize,
    pub data_hash: String,
    pub source: String,
    pub cached_at: DateTime<Utc>,
}

/// One cached entry as listed by `status()`.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub meta: CacheMeta,
    pub bytes: u64,
}

/// Outcome of `clean()`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanReport {
    pub removed: Vec<CacheMeta>,
    pub bytes_freed: u64,
    /// False when only listing what would be removed.
    pub applied: bool,
}

pub struct ParquetCache {
    cache_dir: PathBuf,
}

impl ParquetCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn symbol_dir(&self, symbol: &Symbol) -> PathBuf {
        self.cache_dir.join(format!("symbol={}", symbol.code()))
    }

    fn stem(window: &DateWindow) -> String {
        format!(
            "{}_{}",
            window.start().format("%Y%m%d"),
            window.end().format("%Y%m%d")
        )
    }

    fn data_path(&self, key: &CacheKey) -> PathBuf {
        self.symbol_dir(&key.symbol)
            .join(format!("{}.parquet", Self::stem(&key.window)))
    }

    fn meta_path(&self, key: &CacheKey) -> PathBuf {
        self.symbol_dir(&key.symbol)
            .join(format!("{}.meta.json", Self::stem(&key.window)))
    }

    fn quarantine(&self, path: &Path, reason: &str) {
        let mut target = path.as_os_str().to_owned();
        target.push(".quarantined");
        warn!(path = %path.display(), reason, "quarantining corrupt cache file");
        if let Err(e) = fs::rename(path, &target) {
            warn!(path = %path.display(), error = %e, "quarantine rename failed");
        }
    }

    fn read_meta(path: &Path) -> Result<CacheMeta, CacheError> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| CacheError::Meta(e.to_string()))
    }

    /// Every sidecar under the cache root, with the size of its data file.
    pub fn status(&self) -> Result<Vec<CacheStatus>, CacheError> {
        let mut out = Vec::new();
        if !self.cache_dir.exists() {
            return Ok(out);
        }
        for sym_entry in fs::read_dir(&self.cache_dir)? {
            let sym_dir = sym_entry?.path();
            if !sym_dir.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&sym_dir)? {
                let path = entry?.path();
                let is_meta = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(".meta.json"));
                if !is_meta {
                    continue;
                }
                match Self::read_meta(&path) {
                    Ok(meta) => {
                        let key = CacheKey::new(meta.symbol.clone(), meta.window);
                        let bytes = fs::metadata(self.data_path(&key)).map(|m| m.len()).unwrap_or(0);
                        out.push(CacheStatus { meta, bytes });
                    }
                    Err(e) => debug!(path = %path.display(), error = %e, "skipping unreadable sidecar"),
                }
            }
        }
        out.sort_by(|a, b| {
            (&a.meta.symbol, a.meta.window).cmp(&(&b.meta.symbol, b.meta.window))
        });
        Ok(out)
    }

    /// Remove entries written before `cutoff`. With `apply == false` nothing is
    /// deleted and the report lists what would be.
    pub fn clean(&self, cutoff: DateTime<Utc>, apply: bool) -> Result<CleanReport, CacheError> {
        let mut report = CleanReport {
            applied: apply,
            ..CleanReport::default()
        };
        for status in self.status()? {
            if status.meta.cached_at >= cutoff {
                continue;
            }
            if apply {
                let key = CacheKey::new(status.meta.symbol.clone(), status.meta.window);
                let data = self.data_path(&key);
                if data.exists() {
                    fs::remove_file(&data)?;
                }
                fs::remove_file(self.meta_path(&key))?;
            }
            report.bytes_freed += status.bytes;
            report.removed.push(status.meta);
        }
        Ok(report)
    }
}

impl SeriesCache for ParquetCache {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let data_path = self.data_path(key);
        if !data_path.exists() {
            return Ok(None);
        }

        let meta = match Self::read_meta(&self.meta_path(key)) {
            Ok(meta) => meta,
            Err(e) => {
                self.quarantine(&data_path, &format!("sidecar unreadable: {e}"));
                return Ok(None);
            }
        };

        let bars = match load_and_validate_parquet(&data_path) {
            Ok(bars) => bars,
            Err(e) => {
                self.quarantine(&data_path, &e.to_string());
                return Ok(None);
            }
        };

        if bars.len() != meta.bar_count || hash_bars(&bars)? != meta.data_hash {
            self.quarantine(&data_path, "content does not match sidecar hash");
            return Ok(None);
        }

        let series = match PriceSeries::new(key.symbol.clone(), bars) {
            Ok(series) => series,
            Err(e) => {
                self.quarantine(&data_path, &e.to_string());
                return Ok(None);
            }
        };

        Ok(Some(CacheEntry {
            key: key.clone(),
            series,
            source: meta.source,
            cached_at: meta.cached_at,
        }))
    }

    fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let bars = entry.series.bars();
        if bars.is_empty() {
            return Err(CacheError::Validation("no bars to cache".into()));
        }

        let dir = self.symbol_dir(&entry.key.symbol);
        fs::create_dir_all(&dir)?;

        let df = bars_to_dataframe(bars)?;
        let mut data_tmp = NamedTempFile::new_in(&dir)?;
        write_parquet(&df, data_tmp.as_file_mut())?;
        data_tmp
            .persist(self.data_path(&entry.key))
            .map_err(|e| CacheError::Io(e.error))?;

        let meta = CacheMeta {
            symbol: entry.key.symbol.clone(),
            window: entry.key.window,
            bar_count: bars.len(),
            data_hash: hash_bars(bars)?,
            source: entry.source,
            cached_at: entry.cached_at,
        };
        let meta_json =
            serde_json::to_string_pretty(&meta).map_err(|e| CacheError::Meta(e.to_string()))?;
        let mut meta_tmp = NamedTempFile::new_in(&dir)?;
        meta_tmp.write_all(meta_json.as_bytes())?;
        meta_tmp
            .persist(self.meta_path(&entry.key))
            .map_err(|e| CacheError::Io(e.error))?;

        debug!(key = %entry.key, bars = bars.len(), "cache entry written");
        Ok(())
    }
}

fn hash_bars(bars: &[Bar]) -> Result<String, CacheError> {
    let bytes = serde_json::to_vec(bars).map_err(|e| CacheError::Meta(format!("hash serialization: {e}")))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn bars_to_dataframe(bars: &[Bar]) -> Result<DataFrame, CacheError> {
    let dates: Vec<i32> = bars
        .iter()
        .map(|b| (b.date - epoch()).num_days() as i32)
        .collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let amounts: Vec<Option<f64>> = bars.iter().map(|b| b.amount).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| CacheError::Parquet(format!("date cast: {e}")))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
        Column::new("amount".into(), amounts),
    ])
    .map_err(|e| CacheError::Parquet(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, file: &mut fs::File) -> Result<(), CacheError> {
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| CacheError::Parquet(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path) -> Result<Vec<Bar>, CacheError> {
    let file = fs::File::open(path)?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| CacheError::Parquet(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(CacheError::Validation("empty parquet file".into()));
    }
    for col_name in EXPECTED_COLUMNS {
        if df.column(col_name).is_err() {
            return Err(CacheError::Validation(format!("missing column '{col_name}'")));
        }
    }

    dataframe_to_bars(&df)
}

fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<Bar>, CacheError> {
    let col = |name: &str| {
        df.column(name)
            .map_err(|e| CacheError::Parquet(format!("column read: {e}")))
    };
    let f64_col = |name: &'static str| -> Result<Float64Chunked, CacheError> {
        col(name)?
            .f64()
            .cloned()
            .map_err(|e| CacheError::Parquet(format!("{name} column type: {e}")))
    };

    let date_ca = col("date")?
        .date()
        .map_err(|e| CacheError::Parquet(format!("date column type: {e}")))?
        .clone();
    let open_ca = f64_col("open")?;
    let high_ca = f64_col("high")?;
    let low_ca = f64_col("low")?;
    let close_ca = f64_col("close")?;
    let vol_ca = f64_col("volume")?;
    let amount_ca = f64_col("amount")?;

    let n = df.height();
    let mut bars = Vec::with_capacity(n);
    for i in 0..n {
        let date_days = date_ca
            .get(i)
            .ok_or_else(|| CacheError::Validation(format!("null date at row {i}")))?;
        bars.push(Bar {
            date: epoch() + chrono::Duration::days(date_days as i64),
            open: open_ca.get(i).unwrap_or(f64::NAN),
            high: high_ca.get(i).unwrap_or(f64::NAN),
            low: low_ca.get(i).unwrap_or(f64::NAN),
            close: close_ca.get(i).unwrap_or(f64::NAN),
            volume: vol_ca.get(i).unwrap_or(0.0),
            amount: amount_ca.get(i),
        });
    }
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn sample_entry(cached_at: DateTime<Utc>) -> CacheEntry {
        let symbol = Symbol::parse("600519").unwrap();
        let window = DateWindow::new(d(1), d(31)).unwrap();
        let bars = vec![
            Bar {
                date: d(2),
                open: 100.0,
                high: 102.0,
                low: 99.0,
                close: 101.0,
                volume: 1000.0,
                amount: Some(101_000.0),
            },
            Bar {
                date: d(3),
                open: 101.0,
                high: 103.0,
                low: 100.0,
                close: 102.0,
                volume: 1100.5,
                amount: None,
            },
        ];
        CacheEntry {
            key: CacheKey::new(symbol.clone(), window),
            series: PriceSeries::new(symbol, bars).unwrap(),
            source: "eastmoney".into(),
            cached_at,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 2, 0, 0).unwrap()
    }

    #[test]
    fn put_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let entry = sample_entry(now());

        cache.put(entry.clone()).unwrap();
        let loaded = cache.get(&entry.key).unwrap().unwrap();

        assert_eq!(loaded.series, entry.series);
        assert_eq!(loaded.source, "eastmoney");
        assert_eq!(loaded.cached_at, now());
        assert!(dir
            .path()
            .join("symbol=600519/20240101_20240131.parquet")
            .exists());
        assert!(dir
            .path()
            .join("symbol=600519/20240101_20240131.meta.json")
            .exists());
    }

    #[test]
    fn concurrent_writers_leave_one_valid_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let entry = sample_entry(now());

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| cache.put(entry.clone()).unwrap());
            }
        });

        let loaded = cache.get(&entry.key).unwrap().unwrap();
        assert_eq!(loaded.series, entry.series);
        let mut names: Vec<String> = fs::read_dir(dir.path().join("symbol=600519"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, ["20240101_20240131.meta.json", "20240101_20240131.parquet"]);
    }

    #[test]
    fn missing_entry_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        assert!(cache.get(&sample_entry(now()).key).unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_quarantined_and_missed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let entry = sample_entry(now());
        cache.put(entry.clone()).unwrap();

        let data = dir.path().join("symbol=600519/20240101_20240131.parquet");
        fs::write(&data, b"not a parquet file").unwrap();

        assert!(cache.get(&entry.key).unwrap().is_none());
        assert!(!data.exists());
        assert!(dir
            .path()
            .join("symbol=600519/20240101_20240131.parquet.quarantined")
            .exists());
    }

    #[test]
    fn status_and_clean() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let old = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        cache.put(sample_entry(old)).unwrap();

        let status = cache.status().unwrap();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].meta.bar_count, 2);
        assert!(status[0].bytes > 0);

        let preview = cache.clean(now(), false).unwrap();
        assert_eq!(preview.removed.len(), 1);
        assert_eq!(cache.status().unwrap().len(), 1);

        let report = cache.clean(now(), true).unwrap();
        assert!(report.applied);
        assert_eq!(report.removed.len(), 1);
        assert!(cache.status().unwrap().is_empty());
    }

    #[test]
    fn clean_keeps_recent_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache.put(sample_entry(now())).unwrap();
        let cutoff = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        assert!(cache.clean(cutoff, true).unwrap().removed.is_empty());
        assert_eq!(cache.status().unwrap().len(), 1);
    }
}
