//! Per-symbol CSV cache of normalized daily series.
//!
//! Layout: `{cache_dir}/{SYMBOL}.csv`, header `date,open,high,low,close,volume`.
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Full rewrite on every save, no merging
//! - Unreadable or corrupt files load as "absent", never as an error
//! - Legacy layouts (provider headers, BOM, extra columns) are still read
//!   through the normalizer and flagged so callers can rewrite them

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::warn;

use super::canonicalize::Canonicalizer;
use super::provider::DataError;
use super::schema::BarSchema;
use crate::domain::DailySeries;

/// A successful cache read.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub series: DailySeries,
    /// The file was not in canonical layout and should be rewritten.
    pub legacy: bool,
}

/// Summary of the cache directory, for `cache status`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheReport {
    pub files: usize,
    pub readable: usize,
    pub legacy: usize,
    pub unreadable: Vec<String>,
    pub total_bars: usize,
    pub earliest: Option<NaiveDate>,
    pub latest: Option<NaiveDate>,
}

/// The CSV series cache.
#[derive(Debug, Clone)]
pub struct SeriesCache {
    cache_dir: PathBuf,
}

impl SeriesCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Root directory of the cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path to the cache file for a symbol: `{cache_dir}/{SYMBOL}.csv`
    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.cache_dir.join(format!("{symbol}.csv"))
    }

    /// Load the cached series for a symbol, or `None` if absent or unreadable.
    pub fn load(&self, symbol: &str) -> Option<DailySeries> {
        self.load_entry(symbol).map(|entry| entry.series)
    }

    /// Like [`SeriesCache::load`], also reporting whether the file is legacy layout.
    pub fn load_entry(&self, symbol: &str) -> Option<CacheEntry> {
        let path = self.path_for(symbol);
        if !path.is_file() {
            return None;
        }
        match read_entry(&path) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(symbol, path = %path.display(), error = %e, "ignoring unreadable cache file");
                None
            }
        }
    }

    /// Write the full series for a symbol, replacing any previous file.
    pub fn save(&self, symbol: &str, series: &DailySeries) -> Result<(), DataError> {
        if series.is_empty() {
            return Err(DataError::CacheError("no bars to cache".into()));
        }

        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let mut frame = Canonicalizer::to_frame(series)?;
        let path = self.path_for(symbol);
        let tmp_path = path.with_extension("csv.tmp");

        write_csv(&mut frame, &tmp_path)?;

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::CacheError(format!("atomic rename failed: {e}"))
        })
    }

    /// Scan every `*.csv` file in the cache directory.
    pub fn status(&self) -> Result<CacheReport, DataError> {
        let mut report = CacheReport::default();
        if !self.cache_dir.is_dir() {
            return Ok(report);
        }

        let entries = fs::read_dir(&self.cache_dir)
            .map_err(|e| DataError::CacheError(format!("read dir: {e}")))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("csv"))
            .collect();
        paths.sort();

        for path in paths {
            report.files += 1;
            match read_entry(&path) {
                Ok(entry) => {
                    report.readable += 1;
                    if entry.legacy {
                        report.legacy += 1;
                    }
                    report.total_bars += entry.series.len();
                    if let Some(first) = entry.series.first() {
                        report.earliest = Some(report.earliest.map_or(first.date, |d| d.min(first.date)));
                    }
                    if let Some(last) = entry.series.latest() {
                        report.latest = Some(report.latest.map_or(last.date, |d| d.max(last.date)));
                    }
                }
                Err(_) => {
                    let name = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or_default()
                        .to_string();
                    report.unreadable.push(name);
                }
            }
        }

        Ok(report)
    }
}

// ── CSV I/O helpers ─────────────────────────────────────────────────

fn read_entry(path: &Path) -> Result<CacheEntry, DataError> {
    let raw = read_csv(path)?;
    let headers: Vec<String> = raw
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    let legacy = !BarSchema::is_canonical(&headers);
    let series = Canonicalizer::normalize(raw)?;
    Ok(CacheEntry { series, legacy })
}

/// Read every column as text; the normalizer does the coercion.
fn read_csv(path: &Path) -> Result<DataFrame, DataError> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| DataError::CacheError(format!("open {}: {e}", path.display())))?
        .finish()
        .map_err(|e| DataError::CacheError(format!("parse {}: {e}", path.display())))
}

fn write_csv(frame: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    let file = fs::File::create(path)
        .map_err(|e| DataError::CacheError(format!("create file: {e}")))?;
    CsvWriter::new(file)
        .include_header(true)
        .finish(frame)
        .map_err(|e| DataError::CacheError(format!("write csv: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DailyBar;
    use std::env;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_cache_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = env::temp_dir().join(format!("screenlab_cache_test_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_series() -> DailySeries {
        DailySeries::new(vec![
            DailyBar {
                date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                open: 10.0,
                high: 10.2,
                low: 9.9,
                close: 10.1,
                volume: 123_456.0,
            },
            DailyBar {
                date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
                open: 10.1,
                high: 10.31,
                low: 10.0,
                close: 10.271828,
                volume: 98_765.5,
            },
        ])
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = temp_cache_dir();
        let cache = SeriesCache::new(&dir);

        cache.save("000001", &sample_series()).unwrap();
        let entry = cache.load_entry("000001").unwrap();

        assert_eq!(entry.series, sample_series());
        assert!(!entry.legacy);
        assert!(cache.path_for("000001").is_file());
        assert!(!dir.join("000001.csv.tmp").exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn save_overwrites_previous_series() {
        let dir = temp_cache_dir();
        let cache = SeriesCache::new(&dir);

        cache.save("000001", &sample_series()).unwrap();
        let shorter = DailySeries::new(sample_series().bars()[..1].to_vec());
        cache.save("000001", &shorter).unwrap();

        assert_eq!(cache.load("000001").unwrap().len(), 1);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_absent() {
        let dir = temp_cache_dir();
        let cache = SeriesCache::new(&dir);
        assert!(cache.load("600000").is_none());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_file_is_absent_not_fatal() {
        let dir = temp_cache_dir();
        let cache = SeriesCache::new(&dir);
        fs::write(cache.path_for("600000"), "garbage,header\n1,2\n").unwrap();

        assert!(cache.load("600000").is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn legacy_layout_is_read_and_flagged() {
        let dir = temp_cache_dir();
        let cache = SeriesCache::new(&dir);
        let legacy = "\u{feff}日期,收盘,最高,最低,成交量,ma120\n\
                      2024-01-02,10.1,10.2,9.9,1000,\n\
                      2024-01-03,10.2,10.3,10.0,1100,\n";
        fs::write(cache.path_for("000002"), legacy).unwrap();

        let entry = cache.load_entry("000002").unwrap();
        assert!(entry.legacy);
        assert_eq!(entry.series.len(), 2);
        assert_eq!(entry.series.bars()[0].open, 10.1);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_series_is_not_saved() {
        let dir = temp_cache_dir();
        let cache = SeriesCache::new(&dir);
        assert!(cache.save("000001", &DailySeries::default()).is_err());
        assert!(cache.load("000001").is_none());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn status_counts_files() {
        let dir = temp_cache_dir();
        let cache = SeriesCache::new(&dir);
        cache.save("000001", &sample_series()).unwrap();
        fs::write(cache.path_for("000009"), "nonsense").unwrap();

        let report = cache.status().unwrap();
        assert_eq!(report.files, 2);
        assert_eq!(report.readable, 1);
        assert_eq!(report.unreadable, vec!["000009".to_string()]);
        assert_eq!(report.total_bars, 2);
        assert_eq!(report.earliest, NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(report.latest, NaiveDate::from_ymd_opt(2024, 1, 3));

        let _ = fs::remove_dir_all(&dir);
    }
}
