//! `ma120` — deep discount to the long moving average at a modest valuation.
//!
//! Accepts when the latest close sits below `discount` times the
//! `period`-bar SMA of closes and the valuation ratio lies in `(0, max_ratio)`.

use serde::{Deserialize, Serialize};

use super::{EvalContext, Metrics, Rejection, ScreeningStrategy, StrategyId, TrendValuationMetrics};
use crate::domain::DailySeries;
use crate::indicators::Sma;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendValuationParams {
    /// SMA window in daily bars.
    pub period: usize,
    /// Latest close must be strictly below `ma * discount`.
    pub discount: f64,
    /// Exclusive valuation ceiling.
    pub max_ratio: f64,
}

impl Default for TrendValuationParams {
    fn default() -> Self {
        Self {
            period: 120,
            discount: 0.88,
            max_ratio: 20.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrendValuation {
    params: TrendValuationParams,
    sma: Sma,
}

impl TrendValuation {
    pub fn new(params: TrendValuationParams) -> Self {
        let sma = Sma::new(params.period);
        Self { params, sma }
    }
}

impl Default for TrendValuation {
    fn default() -> Self {
        Self::new(TrendValuationParams::default())
    }
}

impl ScreeningStrategy for TrendValuation {
    fn id(&self) -> StrategyId {
        StrategyId::Ma120
    }

    fn evaluate(&self, series: &DailySeries, ctx: &EvalContext) -> Result<Metrics, Rejection> {
        let closes = series.closes();
        let insufficient = Rejection::InsufficientHistory {
            needed: self.sma.period(),
            got: closes.len(),
        };
        let ma = self.sma.latest(&closes).ok_or(insufficient)?;
        let latest_price = closes.last().copied().unwrap_or(f64::NAN);

        let valuation_ratio = ctx.valuation.ok_or(Rejection::MissingValuation)?;
        let in_band = valuation_ratio > 0.0 && valuation_ratio < self.params.max_ratio;
        if !in_band {
            return Err(Rejection::ValuationOutOfRange {
                ratio: valuation_ratio,
                max: self.params.max_ratio,
            });
        }

        let price_ma120_ratio = latest_price / ma;
        let discounted = latest_price < ma * self.params.discount;
        if !discounted {
            return Err(Rejection::NotDiscounted {
                ratio: price_ma120_ratio,
                threshold: self.params.discount,
            });
        }

        Ok(Metrics::TrendValuation(TrendValuationMetrics {
            latest_price,
            ma120: ma,
            price_ma120_ratio,
            valuation_ratio,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};
    use crate::strategy::test_support::flat_series;

    fn with_last(n: usize, last: f64) -> DailySeries {
        let mut closes = vec![100.0; n];
        closes[n - 1] = last;
        flat_series(&closes)
    }

    fn ctx(valuation: f64) -> EvalContext {
        EvalContext {
            valuation: Some(valuation),
            as_of: None,
        }
    }

    #[test]
    fn accepts_deep_discount_with_modest_valuation() {
        let metrics = TrendValuation::default()
            .evaluate(&with_last(200, 85.0), &ctx(15.0))
            .unwrap();
        let Metrics::TrendValuation(m) = metrics else {
            panic!("wrong metrics variant");
        };
        assert_eq!(m.latest_price, 85.0);
        assert_approx(m.ma120, 99.875, DEFAULT_EPSILON);
        assert_approx(m.price_ma120_ratio, 85.0 / 99.875, DEFAULT_EPSILON);
        assert_eq!(m.valuation_ratio, 15.0);
    }

    #[test]
    fn shallow_discount_is_rejected() {
        let result = TrendValuation::default().evaluate(&with_last(200, 90.0), &ctx(15.0));
        assert!(matches!(result, Err(Rejection::NotDiscounted { .. })));
    }

    #[test]
    fn valuation_bounds_are_exclusive() {
        let strategy = TrendValuation::default();
        let series = with_last(200, 85.0);
        for pe in [0.0, -3.0, 20.0, 25.0, f64::NAN] {
            assert!(
                matches!(
                    strategy.evaluate(&series, &ctx(pe)),
                    Err(Rejection::ValuationOutOfRange { .. })
                ),
                "pe {pe} should be out of range"
            );
        }
        assert!(strategy.evaluate(&series, &ctx(19.99)).is_ok());
    }

    #[test]
    fn missing_valuation_is_rejected() {
        let result =
            TrendValuation::default().evaluate(&with_last(200, 85.0), &EvalContext::default());
        assert_eq!(result, Err(Rejection::MissingValuation));
    }

    #[test]
    fn short_history_is_insufficient() {
        let result = TrendValuation::default().evaluate(&with_last(119, 85.0), &ctx(15.0));
        assert_eq!(
            result,
            Err(Rejection::InsufficientHistory {
                needed: 120,
                got: 119
            })
        );
    }

    #[test]
    fn exactly_period_bars_is_enough() {
        assert!(TrendValuation::default()
            .evaluate(&with_last(120, 85.0), &ctx(15.0))
            .is_ok());
    }

    #[test]
    fn custom_max_ratio_widens_valuation_band() {
        let strategy = TrendValuation::new(TrendValuationParams {
            max_ratio: 30.0,
            ..TrendValuationParams::default()
        });
        assert!(strategy.evaluate(&with_last(200, 85.0), &ctx(25.0)).is_ok());
    }
}
