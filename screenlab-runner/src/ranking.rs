//! Result table — accepted verdicts ranked by the active strategy's key.
//!
//! Verdicts arrive in completion order, which carries no meaning. Each
//! insert keeps the table sorted; verdicts whose metrics belong to another
//! strategy or carry a non-finite sort key are skipped. Equal keys fall back
//! to symbol order so reruns produce identical tables.

use std::cmp::Ordering;

use screenlab_core::strategy::{Metrics, StrategyId, Verdict};

/// Outcome of an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    Inserted,
    /// Wrong strategy, non-finite key, or symbol already present.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct ResultTable {
    strategy: StrategyId,
    verdicts: Vec<Verdict>,
}

impl ResultTable {
    pub fn new(strategy: StrategyId) -> Self {
        Self {
            strategy,
            verdicts: Vec::new(),
        }
    }

    /// Build a ranked table from verdicts in any order.
    pub fn from_verdicts(strategy: StrategyId, verdicts: impl IntoIterator<Item = Verdict>) -> Self {
        let mut table = Self::new(strategy);
        for verdict in verdicts {
            table.insert(verdict);
        }
        table
    }

    pub fn insert(&mut self, verdict: Verdict) -> InsertResult {
        if verdict.strategy_id() != self.strategy || !sort_key_is_finite(&verdict.metrics) {
            return InsertResult::Skipped;
        }
        if self
            .verdicts
            .iter()
            .any(|v| v.instrument.symbol == verdict.instrument.symbol)
        {
            return InsertResult::Skipped;
        }

        let idx = self
            .verdicts
            .partition_point(|v| rank_order(v, &verdict) != Ordering::Greater);
        self.verdicts.insert(idx, verdict);
        InsertResult::Inserted
    }

    pub fn verdicts(&self) -> &[Verdict] {
        &self.verdicts
    }

    pub fn into_verdicts(self) -> Vec<Verdict> {
        self.verdicts
    }

    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }
}

/// Total order over verdicts: strategy key, then symbol.
pub fn rank_order(a: &Verdict, b: &Verdict) -> Ordering {
    a.metrics
        .rank_cmp(&b.metrics)
        .then_with(|| a.instrument.symbol.cmp(&b.instrument.symbol))
}

fn sort_key_is_finite(metrics: &Metrics) -> bool {
    match metrics {
        Metrics::TrendValuation(m) => m.price_ma120_ratio.is_finite() && m.valuation_ratio.is_finite(),
        Metrics::ChipBreakout(m) => m.breakout_strength.is_finite() && m.width_ratio.is_finite(),
    }
}
