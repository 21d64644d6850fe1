//! End-to-end strategy scenarios on synthetic series.

use chrono::{Duration, NaiveDate};
use screenlab_core::domain::{DailyBar, DailySeries};
use screenlab_core::strategy::{
    EvalContext, Metrics, Rejection, StrategyConfig, StrategyId, TrendValuation,
};
use screenlab_core::strategy::{ChipBreakout, ScreeningStrategy};

// ── Helpers ──────────────────────────────────────────────────────────

fn daily(closes: &[f64]) -> DailySeries {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    DailySeries::new(
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| DailyBar {
                date: start + Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 10_000.0,
            })
            .collect(),
    )
}

/// One Friday bar per `(high, close, volume)` week.
fn weekly(weeks: &[(f64, f64, f64)]) -> DailySeries {
    let first_friday = NaiveDate::from_ymd_opt(2021, 1, 8).unwrap();
    DailySeries::new(
        weeks
            .iter()
            .enumerate()
            .map(|(i, &(high, close, volume))| DailyBar {
                date: first_friday + Duration::weeks(i as i64),
                open: close,
                high,
                low: close * 0.99,
                close,
                volume,
            })
            .collect(),
    )
}

fn pe(value: f64) -> EvalContext {
    EvalContext {
        valuation: Some(value),
        as_of: None,
    }
}

/// 70 weeks with a 9.0–9.6 volume zone, `touches` touch weeks inside the
/// 13-week pre-breakout window and a breakout to 10.0 in the final week.
fn breakout_with_touches(touches: usize) -> DailySeries {
    let mut weeks: Vec<(f64, f64, f64)> = vec![(9.1, 9.0, 1_000.0); 70];
    for w in weeks.iter_mut().take(42).skip(18) {
        *w = (9.6, 9.6, 1_000.0);
    }
    for &idx in [66, 68, 64, 62, 60].iter().take(touches) {
        weeks[idx] = (9.6, 9.5, 1_000.0);
    }
    weeks[69] = (10.1, 10.0, 1_000.0);
    weekly(&weeks)
}

// ── ma120 ────────────────────────────────────────────────────────────

#[test]
fn scenario_a_deep_discount_is_accepted() {
    let mut closes = vec![100.0; 200];
    closes[199] = 85.0;

    let result = TrendValuation::default().evaluate(&daily(&closes), &pe(15.0));
    let Ok(Metrics::TrendValuation(m)) = result else {
        panic!("expected acceptance, got {result:?}");
    };
    assert!((m.ma120 - 99.875).abs() < 1e-9);
    assert!((m.price_ma120_ratio - 0.851).abs() < 1e-3);
}

#[test]
fn scenario_a_shallow_drop_is_rejected() {
    let mut closes = vec![100.0; 200];
    closes[199] = 90.0;
    let result = TrendValuation::default().evaluate(&daily(&closes), &pe(15.0));
    assert!(matches!(result, Err(Rejection::NotDiscounted { .. })));
}

#[test]
fn scenario_b_expensive_valuation_is_rejected() {
    let mut closes = vec![100.0; 200];
    closes[199] = 85.0;
    let result = TrendValuation::default().evaluate(&daily(&closes), &pe(25.0));
    assert!(matches!(result, Err(Rejection::ValuationOutOfRange { .. })));
}

#[test]
fn ratio_of_exactly_088_is_rejected() {
    // Window: 118 × 100, one 112, last 88 → sum 12000, ma exactly 100.
    let mut closes = vec![100.0; 150];
    closes[140] = 112.0;
    closes[149] = 88.0;

    let result = TrendValuation::default().evaluate(&daily(&closes), &pe(10.0));
    match result {
        Err(Rejection::NotDiscounted { ratio, .. }) => assert_eq!(ratio, 0.88),
        other => panic!("expected NotDiscounted, got {other:?}"),
    }

    closes[149] = 87.99;
    assert!(TrendValuation::default()
        .evaluate(&daily(&closes), &pe(10.0))
        .is_ok());
}

// ── weekly_chip_breakout ─────────────────────────────────────────────

#[test]
fn scenario_c_wide_even_base_is_rejected() {
    // Closes climb evenly from 5 to 20 with flat volume: no concentration.
    let weeks: Vec<(f64, f64, f64)> = (0..70)
        .map(|i| {
            let close = 5.0 + 15.0 * i as f64 / 69.0;
            (close * 1.01, close, 1_000.0)
        })
        .collect();

    let result = ChipBreakout::default().evaluate(&weekly(&weeks), &EvalContext::default());
    assert!(
        matches!(result, Err(Rejection::ZoneTooWide { .. })),
        "got {result:?}"
    );
}

#[test]
fn breakout_accepts_only_two_or_three_attempts() {
    let strategy = ChipBreakout::default();
    for touches in 0..=5 {
        let result = strategy.evaluate(&breakout_with_touches(touches), &EvalContext::default());
        match touches {
            2 | 3 => match result {
                Ok(Metrics::ChipBreakout(m)) => assert_eq!(m.attempts, touches),
                other => panic!("{touches} touches: expected acceptance, got {other:?}"),
            },
            _ => assert_eq!(
                result,
                Err(Rejection::AttemptCount {
                    attempts: touches,
                    min: 2,
                    max: 3
                }),
                "{touches} touches"
            ),
        }
    }
}

#[test]
fn breakout_thresholds_are_configurable() {
    let config: StrategyConfig = toml::from_str(
        r#"
type = "weekly_chip_breakout"
max_attempts = 5
"#,
    )
    .unwrap();
    assert_eq!(config.id(), StrategyId::WeeklyChipBreakout);

    let strategy = config.build();
    assert!(strategy
        .evaluate(&breakout_with_touches(5), &EvalContext::default())
        .is_ok());
}

#[test]
fn breakout_ignores_valuation_context() {
    let strategy = ChipBreakout::default();
    let series = breakout_with_touches(2);
    assert_eq!(
        strategy.evaluate(&series, &EvalContext::default()),
        strategy.evaluate(&series, &pe(999.0))
    );
}
