//! Daily series — the canonical per-symbol time series handed to strategies.

use super::bar::DailyBar;

/// Ordered sequence of daily bars for one symbol, ascending by date.
///
/// Built by the normalizer, which sorts but does not deduplicate; callers that
/// care about duplicate dates check [`DailySeries::is_strictly_increasing`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DailySeries {
    bars: Vec<DailyBar>,
}

impl DailySeries {
    /// Wrap bars, sorting them by date (stable, so same-day rows keep their order).
    pub fn new(mut bars: Vec<DailyBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        Self { bars }
    }

    pub fn bars(&self) -> &[DailyBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&DailyBar> {
        self.bars.first()
    }

    pub fn latest(&self) -> Option<&DailyBar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// True when no two bars share a date.
    pub fn is_strictly_increasing(&self) -> bool {
        self.bars.windows(2).all(|w| w[0].date < w[1].date)
    }
}
