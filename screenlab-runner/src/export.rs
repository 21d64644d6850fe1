//! Result table export — one CSV file per screen.
//!
//! Header depends on the strategy:
//! - `ma120`: symbol, name, latest_price, ma120, price_ma120_ratio, valuation_ratio
//! - `weekly_chip_breakout`: symbol, name, latest_week, latest_close, zone_low,
//!   zone_high, width_ratio, volume_concentration, attempts, breakout_strength
//!
//! An empty result still produces the header row. Numbers are written in
//! their shortest round-trip form.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use screenlab_core::strategy::{StrategyId, Verdict};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("verdict for {symbol} belongs to {found}, table is {expected}")]
    StrategyMismatch {
        symbol: String,
        found: StrategyId,
        expected: StrategyId,
    },
}

/// Render ranked verdicts as CSV text.
pub fn export_results_csv(strategy: StrategyId, verdicts: &[Verdict]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(strategy.result_header())?;

    for verdict in verdicts {
        if verdict.strategy_id() != strategy {
            return Err(ExportError::StrategyMismatch {
                symbol: verdict.instrument.symbol.clone(),
                found: verdict.strategy_id(),
                expected: strategy,
            });
        }
        wtr.write_record(verdict.record())?;
    }

    let data = wtr.into_inner().map_err(|e| ExportError::Io {
        path: PathBuf::new(),
        source: e.into_error(),
    })?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

/// Write the result table to `path`, creating parent directories.
pub fn write_results(path: &Path, strategy: StrategyId, verdicts: &[Verdict]) -> Result<(), ExportError> {
    let text = export_results_csv(strategy, verdicts)?;
    let io_err = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, text).map_err(io_err)
}
