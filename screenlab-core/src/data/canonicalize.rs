//! Series normalizer: raw provider/cache records → canonical [`DailySeries`].
//!
//! Steps:
//! 1. Resolve raw headers through the alias table (first match per column wins)
//! 2. Coerce numeric columns to `f64` (non-strict: bad cells become null)
//! 3. Backfill `open` from `close`, column-wide or per row
//! 4. Drop rows with any missing or non-finite required field, and rows that
//!    fail the bar sanity check (non-positive price, negative volume, high < low)
//! 5. Sort ascending by date (duplicates are kept)

use chrono::NaiveDate;
use polars::prelude::*;

use super::provider::DataError;
use super::schema::{BarSchema, CLOSE, DATE, HIGH, LOW, OPEN, VOLUME};
use crate::domain::{DailyBar, DailySeries};

/// Date layouts accepted in the `date` column.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d"];

fn frame_err(e: PolarsError) -> DataError {
    DataError::Frame(e.to_string())
}

/// Converts raw tabular records to and from the canonical series form.
pub struct Canonicalizer;

impl Canonicalizer {
    /// Normalize a raw record set into a daily series.
    ///
    /// Fails with [`DataError::MissingColumn`] when a required column has no
    /// recognized alias, and with [`DataError::Unusable`] when no row survives
    /// coercion.
    pub fn normalize(raw: DataFrame) -> Result<DailySeries, DataError> {
        let resolved = Self::resolve_columns(raw)?;
        let coerced = Self::coerce(resolved).collect().map_err(frame_err)?;
        let bars = Self::frame_to_bars(&coerced)?;
        if bars.is_empty() {
            return Err(DataError::Unusable("no row survived coercion".into()));
        }
        Ok(DailySeries::new(bars))
    }

    /// Render a series in the canonical column layout (dates as `YYYY-MM-DD`).
    pub fn to_frame(series: &DailySeries) -> Result<DataFrame, DataError> {
        let bars = series.bars();
        let dates: Vec<String> = bars
            .iter()
            .map(|b| b.date.format("%Y-%m-%d").to_string())
            .collect();
        let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
        let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

        DataFrame::new(vec![
            Column::new(DATE.into(), dates),
            Column::new(OPEN.into(), opens),
            Column::new(HIGH.into(), highs),
            Column::new(LOW.into(), lows),
            Column::new(CLOSE.into(), closes),
            Column::new(VOLUME.into(), volumes),
        ])
        .map_err(frame_err)
    }

    /// Select one raw column per canonical name and rename it.
    fn resolve_columns(raw: DataFrame) -> Result<LazyFrame, DataError> {
        let mut picked: Vec<(&'static str, String)> = Vec::new();
        for name in raw.get_column_names() {
            if let Some(canonical) = BarSchema::canonical_name(name.as_str()) {
                if !picked.iter().any(|(c, _)| *c == canonical) {
                    picked.push((canonical, name.to_string()));
                }
            }
        }

        let raw_name = |canonical: &str| {
            picked
                .iter()
                .find(|(c, _)| *c == canonical)
                .map(|(_, raw)| raw.clone())
        };

        for required in BarSchema::required() {
            if raw_name(required).is_none() {
                return Err(DataError::MissingColumn(required.to_string()));
            }
        }

        let mut exprs: Vec<Expr> = Vec::with_capacity(BarSchema::columns().len());
        for canonical in BarSchema::columns() {
            match raw_name(canonical) {
                Some(raw) => exprs.push(col(raw.as_str()).alias(canonical)),
                // Only `open` can be absent here; it starts out null and is
                // backfilled from close in `coerce`.
                None => exprs.push(lit(NULL).cast(DataType::Float64).alias(canonical)),
            }
        }

        Ok(raw.lazy().select(exprs))
    }

    fn coerce(frame: LazyFrame) -> LazyFrame {
        frame
            .with_columns([
                col(DATE).cast(DataType::String),
                col(OPEN).cast(DataType::Float64),
                col(HIGH).cast(DataType::Float64),
                col(LOW).cast(DataType::Float64),
                col(CLOSE).cast(DataType::Float64),
                col(VOLUME).cast(DataType::Float64),
            ])
            .with_column(col(OPEN).fill_null(col(CLOSE)))
    }

    fn frame_to_bars(df: &DataFrame) -> Result<Vec<DailyBar>, DataError> {
        let dates = df.column(DATE).map_err(frame_err)?.str().map_err(frame_err)?;
        let opens = df.column(OPEN).map_err(frame_err)?.f64().map_err(frame_err)?;
        let highs = df.column(HIGH).map_err(frame_err)?.f64().map_err(frame_err)?;
        let lows = df.column(LOW).map_err(frame_err)?.f64().map_err(frame_err)?;
        let closes = df.column(CLOSE).map_err(frame_err)?.f64().map_err(frame_err)?;
        let volumes = df.column(VOLUME).map_err(frame_err)?.f64().map_err(frame_err)?;

        let mut bars = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let Some(date) = dates.get(i).and_then(parse_date) else {
                continue;
            };
            let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = (
                opens.get(i),
                highs.get(i),
                lows.get(i),
                closes.get(i),
                volumes.get(i),
            ) else {
                continue;
            };
            let bar = DailyBar {
                date,
                open,
                high,
                low,
                close,
                volume,
            };
            if bar.is_sane() {
                bars.push(bar);
            }
        }
        Ok(bars)
    }
}

/// Parse a date cell; datetimes are truncated to their date part.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            s.get(..10)
                .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
        })
}
