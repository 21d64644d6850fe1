//! Simple Moving Average (SMA).
//!
//! Rolling mean of a value series over a lookback window.
//! Lookback: period - 1 (first valid value at index period-1).

/// Rolling arithmetic mean over a fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sma {
    period: usize,
}

impl Sma {
    /// `period` is clamped to at least 1.
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn lookback(&self) -> usize {
        self.period - 1
    }

    /// SMA at every index; `NaN` until the window is full or while a `NaN`
    /// sits inside the window.
    pub fn compute(&self, values: &[f64]) -> Vec<f64> {
        let n = values.len();
        let mut result = vec![f64::NAN; n];
        if n < self.period {
            return result;
        }

        let mut sum: f64 = values[..self.period].iter().sum();
        let mut nan_in_window = sum.is_nan();
        if !nan_in_window {
            result[self.period - 1] = sum / self.period as f64;
        }

        for i in self.period..n {
            let leaving = values[i - self.period];
            let entering = values[i];

            if entering.is_nan() || leaving.is_nan() || nan_in_window {
                // A NaN poisons the running sum; rescan the window.
                sum = values[(i + 1 - self.period)..=i].iter().sum();
                nan_in_window = sum.is_nan();
                if nan_in_window {
                    continue;
                }
            } else {
                sum = sum - leaving + entering;
            }

            result[i] = sum / self.period as f64;
        }

        result
    }

    /// Mean of the trailing window only, or `None` with too few values.
    ///
    /// Summed directly rather than rolled, so it carries no accumulated
    /// floating-point drift.
    pub fn latest(&self, values: &[f64]) -> Option<f64> {
        let start = values.len().checked_sub(self.period)?;
        let mean = values[start..].iter().sum::<f64>() / self.period as f64;
        mean.is_finite().then_some(mean)
    }
}
