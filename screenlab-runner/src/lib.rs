//! ScreenLab Runner — screen orchestration on top of `screenlab-core`.
//!
//! This crate provides:
//! - Run configuration (TOML + defaults)
//! - Per-symbol acquisition: cache, fetch with retry, normalize, persist
//! - The worker-pool orchestrator with progress reporting
//! - Ranking of accepted verdicts and result table export

pub mod acquire;
pub mod config;
pub mod export;
pub mod ranking;
pub mod screen;

pub use acquire::{AcquireOptions, Acquired, Acquisition};
pub use config::{parse_cli_date, ConfigError, ScreenConfig};
pub use export::{export_results_csv, write_results, ExportError};
pub use ranking::{rank_order, InsertResult, ResultTable};
pub use screen::{
    run_screen, screen_symbol, LogProgress, ProgressSnapshot, ScreenError, ScreenProgress,
    ScreenSources, ScreenStatus, ScreenSummary, SymbolOutcome, SymbolResult,
};
