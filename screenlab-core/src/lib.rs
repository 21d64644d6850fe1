//! ScreenLab Core — domain types, data layer, indicators and screening strategies.
//!
//! This crate contains everything that works on a single symbol:
//! - Domain types (daily/weekly bars, series, instruments)
//! - Provider traits plus the Eastmoney client and TOML universe/valuation files
//! - Series normalizer and the per-symbol CSV cache
//! - Rolling SMA, volume-weighted quantiles, weekly resampling
//! - The `ma120` and `weekly_chip_breakout` strategies
//!
//! Fan-out across a universe, retries and result export live in `screenlab-runner`.

pub mod data;
pub mod domain;
pub mod indicators;
pub mod strategy;
