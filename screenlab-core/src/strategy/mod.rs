//! Screening strategies: evaluate one daily series, emit metrics or a rejection.
//!
//! Strategies are pure functions of a [`DailySeries`] plus an [`EvalContext`]
//! (the symbol's valuation ratio). They never see the cache, the provider or
//! any other symbol. The active strategy is chosen once per run from a
//! [`StrategyConfig`] and shared across worker threads as a trait object.

pub mod chip_breakout;
pub mod trend_valuation;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{DailySeries, Instrument};

pub use chip_breakout::{ChipBreakout, ChipBreakoutParams};
pub use trend_valuation::{TrendValuation, TrendValuationParams};

/// Identifier of a screening strategy, as used on the command line and in
/// configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyId {
    Ma120,
    WeeklyChipBreakout,
}

impl StrategyId {
    pub const ALL: [StrategyId; 2] = [StrategyId::Ma120, StrategyId::WeeklyChipBreakout];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyId::Ma120 => "ma120",
            StrategyId::WeeklyChipBreakout => "weekly_chip_breakout",
        }
    }

    /// Whether evaluation consults the valuation snapshot.
    pub fn needs_valuations(&self) -> bool {
        matches!(self, StrategyId::Ma120)
    }

    /// Header row of the result table.
    pub fn result_header(&self) -> &'static [&'static str] {
        match self {
            StrategyId::Ma120 => &[
                "symbol",
                "name",
                "latest_price",
                "ma120",
                "price_ma120_ratio",
                "valuation_ratio",
            ],
            StrategyId::WeeklyChipBreakout => &[
                "symbol",
                "name",
                "latest_week",
                "latest_close",
                "zone_low",
                "zone_high",
                "width_ratio",
                "volume_concentration",
                "attempts",
                "breakout_strength",
            ],
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown strategy identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown strategy '{0}' (expected one of: ma120, weekly_chip_breakout)")]
pub struct UnknownStrategy(pub String);

impl FromStr for StrategyId {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ma120" => Ok(StrategyId::Ma120),
            "weekly_chip_breakout" | "weekly" => Ok(StrategyId::WeeklyChipBreakout),
            _ => Err(UnknownStrategy(s.to_string())),
        }
    }
}

/// Per-symbol inputs a strategy may consult besides the price series.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EvalContext {
    /// Dynamic valuation ratio (P/E), if the snapshot has a finite one.
    pub valuation: Option<f64>,
    /// Last day the history was requested for. A trailing week whose anchor
    /// lies after this day is still in progress.
    pub as_of: Option<NaiveDate>,
}

/// Why a strategy declined a symbol.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("insufficient history: needed {needed}, got {got}")]
    InsufficientHistory { needed: usize, got: usize },

    #[error("no valuation ratio available")]
    MissingValuation,

    #[error("valuation ratio {ratio} outside (0, {max})")]
    ValuationOutOfRange { ratio: f64, max: f64 },

    #[error("price/ma ratio {ratio:.4} not below {threshold}")]
    NotDiscounted { ratio: f64, threshold: f64 },

    #[error("base window has {weeks} weeks, need {needed}")]
    BaseTooShort { weeks: usize, needed: usize },

    #[error("base window carries no volume")]
    NoBaseVolume,

    #[error("degenerate zone: high {high} <= low {low}")]
    DegenerateZone { low: f64, high: f64 },

    #[error("zone width {width_ratio:.4} above {max}")]
    ZoneTooWide { width_ratio: f64, max: f64 },

    #[error("volume concentration {concentration:.4} below {min}")]
    NotConcentrated { concentration: f64, min: f64 },

    #[error("{attempts} touch attempts, need {min}..={max}")]
    AttemptCount { attempts: usize, min: usize, max: usize },

    #[error("latest week does not break out of the zone")]
    NoBreakout,

    #[error("breakout already underway in the previous week")]
    BreakoutAlreadyUnderway,
}

impl Rejection {
    /// Too little data to evaluate at all, as opposed to a negative verdict.
    pub fn is_insufficient_history(&self) -> bool {
        matches!(self, Rejection::InsufficientHistory { .. })
    }
}

/// Metrics emitted by `ma120` on acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendValuationMetrics {
    pub latest_price: f64,
    pub ma120: f64,
    pub price_ma120_ratio: f64,
    pub valuation_ratio: f64,
}

/// Metrics emitted by `weekly_chip_breakout` on acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChipBreakoutMetrics {
    pub latest_week: NaiveDate,
    pub latest_close: f64,
    pub zone_low: f64,
    pub zone_high: f64,
    pub width_ratio: f64,
    pub volume_concentration: f64,
    pub attempts: usize,
    pub breakout_strength: f64,
}

/// Strategy-specific metrics of an accepted symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Metrics {
    #[serde(rename = "ma120")]
    TrendValuation(TrendValuationMetrics),
    #[serde(rename = "weekly_chip_breakout")]
    ChipBreakout(ChipBreakoutMetrics),
}

impl Metrics {
    pub fn strategy_id(&self) -> StrategyId {
        match self {
            Metrics::TrendValuation(_) => StrategyId::Ma120,
            Metrics::ChipBreakout(_) => StrategyId::WeeklyChipBreakout,
        }
    }

    /// Ranking order: `Less` sorts first.
    ///
    /// `ma120`: ascending price/ma ratio, then ascending valuation.
    /// `weekly_chip_breakout`: descending strength, then ascending width.
    /// Metrics of different strategies compare equal.
    pub fn rank_cmp(&self, other: &Metrics) -> Ordering {
        match (self, other) {
            (Metrics::TrendValuation(a), Metrics::TrendValuation(b)) => a
                .price_ma120_ratio
                .total_cmp(&b.price_ma120_ratio)
                .then_with(|| a.valuation_ratio.total_cmp(&b.valuation_ratio)),
            (Metrics::ChipBreakout(a), Metrics::ChipBreakout(b)) => b
                .breakout_strength
                .total_cmp(&a.breakout_strength)
                .then_with(|| a.width_ratio.total_cmp(&b.width_ratio)),
            _ => Ordering::Equal,
        }
    }

    /// Metric fields in result-table column order.
    pub fn fields(&self) -> Vec<String> {
        match self {
            Metrics::TrendValuation(m) => vec![
                m.latest_price.to_string(),
                m.ma120.to_string(),
                m.price_ma120_ratio.to_string(),
                m.valuation_ratio.to_string(),
            ],
            Metrics::ChipBreakout(m) => vec![
                m.latest_week.format("%Y-%m-%d").to_string(),
                m.latest_close.to_string(),
                m.zone_low.to_string(),
                m.zone_high.to_string(),
                m.width_ratio.to_string(),
                m.volume_concentration.to_string(),
                m.attempts.to_string(),
                m.breakout_strength.to_string(),
            ],
        }
    }
}

/// One accepted symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub instrument: Instrument,
    pub metrics: Metrics,
}

impl Verdict {
    pub fn new(instrument: Instrument, metrics: Metrics) -> Self {
        Self {
            instrument,
            metrics,
        }
    }

    pub fn strategy_id(&self) -> StrategyId {
        self.metrics.strategy_id()
    }

    /// A full result-table row: symbol, name, then the metric fields.
    pub fn record(&self) -> Vec<String> {
        let mut record = vec![self.instrument.symbol.clone(), self.instrument.name.clone()];
        record.extend(self.metrics.fields());
        record
    }
}

/// A screening strategy.
///
/// Implementations hold only their parameters, so one instance is shared by
/// every worker for the whole run.
pub trait ScreeningStrategy: Send + Sync {
    fn id(&self) -> StrategyId;

    /// Evaluate one normalized series.
    fn evaluate(&self, series: &DailySeries, ctx: &EvalContext) -> Result<Metrics, Rejection>;
}

/// Serializable strategy selection with parameter overrides.
///
/// ```toml
/// [strategy]
/// type = "weekly_chip_breakout"
/// max_width_ratio = 0.15
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    Ma120(TrendValuationParams),
    WeeklyChipBreakout(ChipBreakoutParams),
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::Ma120(TrendValuationParams::default())
    }
}

impl From<StrategyId> for StrategyConfig {
    fn from(id: StrategyId) -> Self {
        match id {
            StrategyId::Ma120 => StrategyConfig::Ma120(TrendValuationParams::default()),
            StrategyId::WeeklyChipBreakout => {
                StrategyConfig::WeeklyChipBreakout(ChipBreakoutParams::default())
            }
        }
    }
}

impl StrategyConfig {
    pub fn id(&self) -> StrategyId {
        match self {
            StrategyConfig::Ma120(_) => StrategyId::Ma120,
            StrategyConfig::WeeklyChipBreakout(_) => StrategyId::WeeklyChipBreakout,
        }
    }

    /// Instantiate the strategy.
    pub fn build(&self) -> Box<dyn ScreeningStrategy> {
        match self {
            StrategyConfig::Ma120(params) => Box::new(TrendValuation::new(params.clone())),
            StrategyConfig::WeeklyChipBreakout(params) => {
                Box::new(ChipBreakout::new(params.clone()))
            }
        }
    }
}
