//! `weekly_chip_breakout` — breakout from a volume-concentrated weekly base.
//!
//! Pipeline over the weekly resample of the daily series:
//!
//! 1. Base window `weekly[n-base_lookback .. n-base_exclude_recent]`
//! 2. Chip zone: volume-weighted `lower_quantile`/`upper_quantile` of base closes
//! 3. Zone quality: `width_ratio <= max_width_ratio`,
//!    `volume_concentration >= min_volume_concentration`
//! 4. Touch attempts on the zone top in `weekly[n-1-pre_window .. n-1]`
//! 5. Breakout on the latest completed week, from a previous week still inside the zone
//!
//! A trailing week that has not reached its anchor day by `EvalContext::as_of`
//! is dropped before any of this.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::{ChipBreakoutMetrics, EvalContext, Metrics, Rejection, ScreeningStrategy, StrategyId};
use crate::domain::{DailySeries, WeeklyBar};
use crate::indicators::{weighted_quantile, WeeklyResampler};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChipBreakoutParams {
    /// Minimum weekly bars after resampling.
    pub min_weeks: usize,
    /// Base window starts this many weeks before the end.
    pub base_lookback: usize,
    /// Most recent weeks left out of the base window.
    pub base_exclude_recent: usize,
    pub min_base_weeks: usize,
    pub lower_quantile: f64,
    pub upper_quantile: f64,
    /// `(zone_high - zone_low) / mean base close` ceiling.
    pub max_width_ratio: f64,
    /// Minimum share of base volume traded with close inside the zone.
    pub min_volume_concentration: f64,
    /// Weeks before the latest one scanned for touch attempts.
    pub pre_window: usize,
    /// A touch week's high reaches within this fraction below the zone top.
    pub touch_tolerance: f64,
    /// A touch week closes no further than this fraction above the zone top.
    pub close_tolerance: f64,
    pub min_attempts: usize,
    pub max_attempts: usize,
    /// Breakout close must clear the zone top by this fraction.
    pub breakout_margin: f64,
    pub week_end: Weekday,
}

impl Default for ChipBreakoutParams {
    fn default() -> Self {
        Self {
            min_weeks: 60,
            base_lookback: 52,
            base_exclude_recent: 4,
            min_base_weeks: 30,
            lower_quantile: 0.35,
            upper_quantile: 0.65,
            max_width_ratio: 0.18,
            min_volume_concentration: 0.40,
            pre_window: 13,
            touch_tolerance: 0.02,
            close_tolerance: 0.01,
            min_attempts: 2,
            max_attempts: 3,
            breakout_margin: 0.01,
            week_end: Weekday::Fri,
        }
    }
}

/// Price band where the base's volume concentrated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChipZone {
    pub low: f64,
    pub high: f64,
    pub width_ratio: f64,
    pub volume_concentration: f64,
}

#[derive(Debug, Clone)]
pub struct ChipBreakout {
    params: ChipBreakoutParams,
    resampler: WeeklyResampler,
}

impl ChipBreakout {
    pub fn new(params: ChipBreakoutParams) -> Self {
        let resampler = WeeklyResampler::new(params.week_end);
        Self { params, resampler }
    }

    /// Weekly resample of `series`, minus a trailing week still in progress.
    ///
    /// The last week counts as complete once the data reaches its anchor day
    /// or the request window ends on or after it.
    pub fn completed_weeks(&self, series: &DailySeries, as_of: Option<NaiveDate>) -> Vec<WeeklyBar> {
        let mut weekly = self.resampler.resample(series.bars());
        if let (Some(as_of), Some(last_day), Some(last_week)) =
            (as_of, series.latest(), weekly.last())
        {
            if last_day.date < last_week.week_end && as_of < last_week.week_end {
                weekly.pop();
            }
        }
        weekly
    }

    /// Weekly bars required before any window can be cut.
    fn required_weeks(&self) -> usize {
        let p = &self.params;
        p.min_weeks
            .max(p.base_lookback)
            .max(p.pre_window + 1)
            .max(2)
    }

    /// Compute the chip zone over a base window.
    pub fn chip_zone(&self, base: &[WeeklyBar]) -> Result<ChipZone, Rejection> {
        let p = &self.params;
        let observations: Vec<(f64, f64)> = base.iter().map(|w| (w.close, w.volume)).collect();

        let low = weighted_quantile(&observations, p.lower_quantile).ok_or(Rejection::NoBaseVolume)?;
        let high = weighted_quantile(&observations, p.upper_quantile).ok_or(Rejection::NoBaseVolume)?;
        if high <= low {
            return Err(Rejection::DegenerateZone { low, high });
        }

        let mean_close = base.iter().map(|w| w.close).sum::<f64>() / base.len() as f64;
        let total_volume: f64 = base.iter().map(|w| w.volume).sum();
        let zone_volume: f64 = base
            .iter()
            .filter(|w| low <= w.close && w.close <= high)
            .map(|w| w.volume)
            .sum();

        Ok(ChipZone {
            low,
            high,
            width_ratio: (high - low) / mean_close,
            volume_concentration: zone_volume / total_volume,
        })
    }

    /// Weeks that reached the zone top without closing clearly above it.
    pub fn count_attempts(&self, window: &[WeeklyBar], zone_high: f64) -> usize {
        let reach = zone_high * (1.0 - self.params.touch_tolerance);
        let close_cap = zone_high * (1.0 + self.params.close_tolerance);
        window
            .iter()
            .filter(|w| w.high >= reach && w.close <= close_cap)
            .count()
    }
}

impl Default for ChipBreakout {
    fn default() -> Self {
        Self::new(ChipBreakoutParams::default())
    }
}

impl ScreeningStrategy for ChipBreakout {
    fn id(&self) -> StrategyId {
        StrategyId::WeeklyChipBreakout
    }

    fn evaluate(&self, series: &DailySeries, ctx: &EvalContext) -> Result<Metrics, Rejection> {
        let p = &self.params;
        let weekly = self.completed_weeks(series, ctx.as_of);
        let n = weekly.len();

        let needed = self.required_weeks();
        if n < needed {
            return Err(Rejection::InsufficientHistory { needed, got: n });
        }

        let base_start = n - p.base_lookback;
        let base_end = n.saturating_sub(p.base_exclude_recent).max(base_start);
        let base = &weekly[base_start..base_end];
        if base.len() < p.min_base_weeks.max(1) {
            return Err(Rejection::BaseTooShort {
                weeks: base.len(),
                needed: p.min_base_weeks.max(1),
            });
        }

        let zone = self.chip_zone(base)?;
        if zone.width_ratio > p.max_width_ratio {
            return Err(Rejection::ZoneTooWide {
                width_ratio: zone.width_ratio,
                max: p.max_width_ratio,
            });
        }
        if zone.volume_concentration < p.min_volume_concentration {
            return Err(Rejection::NotConcentrated {
                concentration: zone.volume_concentration,
                min: p.min_volume_concentration,
            });
        }

        let pre = &weekly[n - 1 - p.pre_window..n - 1];
        let attempts = self.count_attempts(pre, zone.high);
        if !(p.min_attempts..=p.max_attempts).contains(&attempts) {
            return Err(Rejection::AttemptCount {
                attempts,
                min: p.min_attempts,
                max: p.max_attempts,
            });
        }

        let latest = weekly[n - 1];
        let previous = weekly[n - 2];
        let breakout_level = zone.high * (1.0 + p.breakout_margin);
        let broke_out = latest.close > breakout_level && latest.high > zone.high;
        if !broke_out {
            return Err(Rejection::NoBreakout);
        }
        if previous.close > breakout_level {
            return Err(Rejection::BreakoutAlreadyUnderway);
        }

        Ok(Metrics::ChipBreakout(ChipBreakoutMetrics {
            latest_week: latest.week_end,
            latest_close: latest.close,
            zone_low: zone.low,
            zone_high: zone.high,
            width_ratio: zone.width_ratio,
            volume_concentration: zone.volume_concentration,
            attempts,
            breakout_strength: latest.close / zone.high,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Duration};

    use crate::domain::DailyBar;

    /// One daily bar per week, each on a Friday, so weekly bars equal daily bars.
    fn weekly_series(weeks: &[(f64, f64, f64)]) -> DailySeries {
        let first_friday = NaiveDate::from_ymd_opt(2022, 1, 7).unwrap();
        DailySeries::new(
            weeks
                .iter()
                .enumerate()
                .map(|(i, &(high, close, volume))| DailyBar {
                    date: first_friday + Duration::weeks(i as i64),
                    open: close,
                    high,
                    low: close - 0.1,
                    close,
                    volume,
                })
                .collect(),
        )
    }

    /// 70 weeks: zone 9.0..9.6 from the base, two touches in weeks 66 and 68,
    /// breakout to 10.0 in week 69.
    fn breakout_weeks() -> Vec<(f64, f64, f64)> {
        let mut weeks: Vec<(f64, f64, f64)> = (0..70).map(|_| (9.1, 9.0, 1_000.0)).collect();
        for w in weeks.iter_mut().take(42).skip(18) {
            *w = (9.6, 9.6, 1_000.0);
        }
        weeks[66] = (9.6, 9.5, 1_000.0);
        weeks[68] = (9.6, 9.5, 1_000.0);
        weeks[69] = (10.1, 10.0, 1_000.0);
        weeks
    }

    #[test]
    fn detects_breakout_after_two_touches() {
        let series = weekly_series(&breakout_weeks());
        let metrics = ChipBreakout::default()
            .evaluate(&series, &EvalContext::default())
            .unwrap();
        let Metrics::ChipBreakout(m) = metrics else {
            panic!("wrong metrics variant");
        };
        assert_eq!(m.zone_low, 9.0);
        assert_eq!(m.zone_high, 9.6);
        assert_eq!(m.attempts, 2);
        assert_eq!(m.latest_close, 10.0);
        assert_eq!(m.volume_concentration, 1.0);
        assert!((m.breakout_strength - 10.0 / 9.6).abs() < 1e-12);
        assert_eq!(
            m.latest_week,
            NaiveDate::from_ymd_opt(2022, 1, 7).unwrap() + Duration::weeks(69)
        );
    }

    /// The breakout fixture plus a Wednesday bar that falls back into the zone.
    fn with_partial_week() -> (DailySeries, NaiveDate) {
        let mut bars = weekly_series(&breakout_weeks()).bars().to_vec();
        let last_friday = bars[bars.len() - 1].date;
        let wednesday = last_friday + Duration::days(5);
        bars.push(DailyBar {
            date: wednesday,
            open: 9.4,
            high: 9.4,
            low: 9.2,
            close: 9.3,
            volume: 1_000.0,
        });
        (DailySeries::new(bars), wednesday)
    }

    #[test]
    fn week_in_progress_is_not_evaluated() {
        let (series, wednesday) = with_partial_week();
        assert_eq!(wednesday.weekday(), Weekday::Wed);
        let strategy = ChipBreakout::default();

        assert_eq!(strategy.completed_weeks(&series, Some(wednesday)).len(), 70);
        let ctx = EvalContext {
            valuation: None,
            as_of: Some(wednesday),
        };
        let Ok(Metrics::ChipBreakout(m)) = strategy.evaluate(&series, &ctx) else {
            panic!("expected the completed breakout week to be accepted");
        };
        assert_eq!(m.latest_week, wednesday - Duration::days(5));
        assert_eq!(m.latest_close, 10.0);
    }

    #[test]
    fn week_ending_inside_request_window_counts_as_complete() {
        let (series, wednesday) = with_partial_week();
        let strategy = ChipBreakout::default();

        // data stops on Wednesday but the request ran through Friday
        let friday = wednesday + Duration::days(2);
        assert_eq!(strategy.completed_weeks(&series, Some(friday)).len(), 71);
        let ctx = EvalContext {
            valuation: None,
            as_of: Some(friday),
        };
        assert_eq!(strategy.evaluate(&series, &ctx), Err(Rejection::NoBreakout));

        // without a request date every week is taken as complete
        assert_eq!(strategy.completed_weeks(&series, None).len(), 71);
    }

    #[test]
    fn too_few_weeks_is_insufficient_history() {
        let weeks = &breakout_weeks()[..59];
        let result = ChipBreakout::default().evaluate(&weekly_series(weeks), &EvalContext::default());
        assert_eq!(
            result,
            Err(Rejection::InsufficientHistory {
                needed: 60,
                got: 59
            })
        );
    }

    #[test]
    fn previous_week_above_level_is_not_fresh() {
        let mut weeks = breakout_weeks();
        weeks[68] = (9.9, 9.8, 1_000.0);
        weeks[64] = (9.6, 9.5, 1_000.0);
        let result = ChipBreakout::default().evaluate(&weekly_series(&weeks), &EvalContext::default());
        assert_eq!(result, Err(Rejection::BreakoutAlreadyUnderway));
    }

    #[test]
    fn latest_close_inside_margin_is_no_breakout() {
        let mut weeks = breakout_weeks();
        weeks[69] = (10.1, 9.65, 1_000.0);
        let result = ChipBreakout::default().evaluate(&weekly_series(&weeks), &EvalContext::default());
        assert_eq!(result, Err(Rejection::NoBreakout));
    }

    #[test]
    fn flat_base_is_degenerate() {
        let weeks: Vec<(f64, f64, f64)> = (0..70).map(|_| (10.0, 10.0, 500.0)).collect();
        let result = ChipBreakout::default().evaluate(&weekly_series(&weeks), &EvalContext::default());
        assert!(matches!(result, Err(Rejection::DegenerateZone { .. })));
    }

    #[test]
    fn zero_volume_base_is_rejected() {
        let weeks: Vec<(f64, f64, f64)> = (0..70).map(|i| (10.0, 9.0 + (i % 3) as f64, 0.0)).collect();
        let result = ChipBreakout::default().evaluate(&weekly_series(&weeks), &EvalContext::default());
        assert_eq!(result, Err(Rejection::NoBaseVolume));
    }

    #[test]
    fn attempts_ignore_closes_far_above_zone() {
        let strategy = ChipBreakout::default();
        let bar = |high, close| WeeklyBar {
            week_end: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            open: close,
            high,
            low: close,
            close,
            volume: 1.0,
        };
        let window = [bar(10.0, 9.9), bar(9.7, 9.6), bar(10.5, 10.2), bar(9.79, 9.5)];
        // reach = 9.8, close cap = 10.1
        assert_eq!(strategy.count_attempts(&window, 10.0), 1);
    }
}
