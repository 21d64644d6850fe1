//! Serializable screen configuration.
//!
//! Every field has a default, so an empty TOML file (or none at all) is a
//! valid configuration. CLI flags are applied on top by the binary.
//!
//! ```toml
//! start = "2015-01-01"
//! adjust = "qfq"
//! workers = 16
//! cache_dir = "data/daily"
//!
//! [strategy]
//! type = "ma120"
//! max_ratio = 25.0
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use screenlab_core::data::Adjustment;
use screenlab_core::strategy::StrategyConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Run configuration for one screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    /// First day of history requested from the provider (inclusive).
    pub start: NaiveDate,
    /// Last day of history requested (inclusive).
    pub end: NaiveDate,
    pub adjust: Adjustment,
    /// Worker threads in the screening pool.
    pub workers: usize,
    /// Retries after the first failed fetch; total tries = retries + 1.
    pub retries: u32,
    /// Pause between fetch attempts, in seconds.
    pub retry_backoff_secs: f64,
    /// Per-request network timeout, in seconds.
    pub request_timeout_secs: f64,
    pub cache_dir: PathBuf,
    pub result_file: PathBuf,
    pub strategy: StrategyConfig,
    /// Read cached series before going to the network.
    pub use_cache: bool,
    /// Report progress every this many completed symbols.
    pub progress_every: usize,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2010, 1, 1).unwrap_or(NaiveDate::MIN),
            end: chrono::Local::now().date_naive(),
            adjust: Adjustment::Qfq,
            workers: 8,
            retries: 2,
            retry_backoff_secs: 0.15,
            request_timeout_secs: 15.0,
            cache_dir: PathBuf::from("data/daily"),
            result_file: PathBuf::from("output/screen_result.csv"),
            strategy: StrategyConfig::default(),
            use_cache: true,
            progress_every: 100,
        }
    }
}

impl ScreenConfig {
    /// Load a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::try_from_secs_f64(self.retry_backoff_secs).unwrap_or(Duration::ZERO)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.request_timeout_secs).unwrap_or(Duration::ZERO)
    }

    /// Override the valuation ceiling of the `ma120` strategy. No effect on
    /// strategies that do not use valuations.
    pub fn set_max_valuation_ratio(&mut self, max_ratio: f64) {
        if let StrategyConfig::Ma120(params) = &mut self.strategy {
            params.max_ratio = max_ratio;
        }
    }

    /// Reject configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.start > self.end {
            return Err(ConfigError::Invalid(format!(
                "start {} is after end {}",
                self.start, self.end
            )));
        }
        if !self.retry_backoff_secs.is_finite() || self.retry_backoff_secs < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "retry back-off must be a non-negative number of seconds, got {}",
                self.retry_backoff_secs
            )));
        }
        if !self.request_timeout_secs.is_finite() || self.request_timeout_secs <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "request timeout must be positive, got {}",
                self.request_timeout_secs
            )));
        }
        if self.progress_every == 0 {
            return Err(ConfigError::Invalid("progress_every must be at least 1".into()));
        }
        validate_strategy(&self.strategy)
    }
}

fn validate_strategy(strategy: &StrategyConfig) -> Result<(), ConfigError> {
    match strategy {
        StrategyConfig::Ma120(p) => {
            if p.period == 0 {
                return Err(ConfigError::Invalid("ma120 period must be at least 1".into()));
            }
            if !p.max_ratio.is_finite() || p.max_ratio <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "valuation ceiling must be positive, got {}",
                    p.max_ratio
                )));
            }
            if !p.discount.is_finite() || p.discount <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "discount must be positive, got {}",
                    p.discount
                )));
            }
        }
        StrategyConfig::WeeklyChipBreakout(p) => {
            let in_unit = |q: f64| (0.0..=1.0).contains(&q);
            if !in_unit(p.lower_quantile)
                || !in_unit(p.upper_quantile)
                || p.lower_quantile >= p.upper_quantile
            {
                return Err(ConfigError::Invalid(format!(
                    "zone quantiles must satisfy 0 <= lower < upper <= 1, got {} and {}",
                    p.lower_quantile, p.upper_quantile
                )));
            }
            if p.min_attempts > p.max_attempts {
                return Err(ConfigError::Invalid(format!(
                    "min_attempts {} exceeds max_attempts {}",
                    p.min_attempts, p.max_attempts
                )));
            }
            if p.base_exclude_recent >= p.base_lookback {
                return Err(ConfigError::Invalid(format!(
                    "base window is empty: lookback {} excludes {} recent weeks",
                    p.base_lookback, p.base_exclude_recent
                )));
            }
        }
    }
    Ok(())
}

/// Parse a command-line date, `YYYYMMDD` or `YYYY-MM-DD`.
pub fn parse_cli_date(raw: &str) -> Result<NaiveDate, ConfigError> {
    let s = raw.trim();
    NaiveDate::parse_from_str(s, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .map_err(|_| ConfigError::Invalid(format!("unrecognized date '{raw}'")))
}
