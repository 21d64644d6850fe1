//! Data provider traits and structured error types.
//!
//! The provider traits abstract over where the universe, the daily history and
//! the valuation snapshot come from (the Eastmoney HTTP API, TOML files, test
//! doubles) so the acquisition pipeline never knows which one it talks to.

use std::fmt;
use std::time::Duration;

use chrono::NaiveDate;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::valuation::Valuations;
use crate::domain::Instrument;

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("HTTP {status} for {context}")]
    HttpStatus { status: u16, context: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("provider returned no rows for '{symbol}'")]
    EmptyResponse { symbol: String },

    #[error("missing required column '{0}'")]
    MissingColumn(String),

    #[error("unusable series: {0}")]
    Unusable(String),

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("dataframe error: {0}")]
    Frame(String),

    #[error("file error: {0}")]
    File(String),
}

/// Corporate-action price adjustment requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Adjustment {
    /// Raw traded prices.
    #[serde(alias = "")]
    None,
    /// Forward-adjusted (前复权): latest prices unchanged, history rescaled.
    #[default]
    Qfq,
    /// Backward-adjusted (后复权): earliest prices unchanged.
    Hfq,
}

impl Adjustment {
    /// Provider-style code: `""`, `"qfq"` or `"hfq"`.
    pub fn code(&self) -> &'static str {
        match self {
            Adjustment::None => "",
            Adjustment::Qfq => "qfq",
            Adjustment::Hfq => "hfq",
        }
    }

    /// Parse `""`/`"none"`, `"qfq"` or `"hfq"` (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Some(Adjustment::None),
            "qfq" => Some(Adjustment::Qfq),
            "hfq" => Some(Adjustment::Hfq),
            _ => None,
        }
    }
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Adjustment::None => f.write_str("none"),
            other => f.write_str(other.code()),
        }
    }
}

/// One daily-history request.
///
/// The timeout bounds this single call; providers must not fall back to any
/// process-wide socket setting.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub adjust: Adjustment,
    pub timeout: Duration,
}

/// Where a series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    Cache,
    Network,
}

/// Daily price history source.
///
/// Returns the provider's raw tabular records; column names and types are
/// whatever the provider uses; the normalizer sorts that out. An empty frame
/// is a valid reply that the caller treats as a failed attempt.
pub trait HistoryProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily bars for `request.symbol` between `start` and `end` inclusive.
    fn fetch_daily(&self, request: &FetchRequest) -> Result<DataFrame, DataError>;
}

/// Source of the screening universe. Called once per run.
pub trait UniverseProvider {
    fn instruments(&self) -> Result<Vec<Instrument>, DataError>;
}

/// Source of the per-symbol valuation snapshot (dynamic P/E).
pub trait ValuationProvider {
    fn valuations(&self) -> Result<Valuations, DataError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjustment_codes() {
        assert_eq!(Adjustment::None.code(), "");
        assert_eq!(Adjustment::Qfq.code(), "qfq");
        assert_eq!(Adjustment::default(), Adjustment::Qfq);
        assert_eq!(Adjustment::parse("HFQ"), Some(Adjustment::Hfq));
        assert_eq!(Adjustment::parse(""), Some(Adjustment::None));
        assert_eq!(Adjustment::parse("both"), None);
    }

    #[test]
    fn adjustment_deserializes_empty_string_as_none() {
        #[derive(Deserialize)]
        struct Wrapper {
            adjust: Adjustment,
        }
        let w: Wrapper = toml::from_str(r#"adjust = """#).unwrap();
        assert_eq!(w.adjust, Adjustment::None);
        let w: Wrapper = toml::from_str(r#"adjust = "hfq""#).unwrap();
        assert_eq!(w.adjust, Adjustment::Hfq);
    }
}
