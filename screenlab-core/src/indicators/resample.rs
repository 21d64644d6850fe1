//! Daily → weekly resampling.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::domain::{DailyBar, WeeklyBar};

/// Groups daily bars into calendar weeks ending on a fixed weekday.
///
/// Each daily bar belongs to the week ending on the first `week_end` day on
/// or after its date. Weeks without daily bars produce no weekly bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklyResampler {
    week_end: Weekday,
}

impl Default for WeeklyResampler {
    fn default() -> Self {
        Self::new(Weekday::Fri)
    }
}

impl WeeklyResampler {
    pub fn new(week_end: Weekday) -> Self {
        Self { week_end }
    }

    /// The week-ending anchor for `date`.
    pub fn week_end_for(&self, date: NaiveDate) -> NaiveDate {
        let target = self.week_end.num_days_from_monday();
        let current = date.weekday().num_days_from_monday();
        let ahead = (target + 7 - current) % 7;
        date + Duration::days(i64::from(ahead))
    }

    /// Aggregate ascending daily bars into weekly bars.
    ///
    /// open = first open, high = max high, low = min low, close = last close,
    /// volume = sum.
    pub fn resample(&self, bars: &[DailyBar]) -> Vec<WeeklyBar> {
        let mut weeks: Vec<WeeklyBar> = Vec::with_capacity(bars.len() / 5 + 1);

        for bar in bars {
            let week_end = self.week_end_for(bar.date);
            match weeks.last_mut() {
                Some(week) if week.week_end == week_end => {
                    week.high = week.high.max(bar.high);
                    week.low = week.low.min(bar.low);
                    week.close = bar.close;
                    week.volume += bar.volume;
                }
                _ => weeks.push(WeeklyBar {
                    week_end,
                    open: bar.open,
                    high: bar.high,
                    low: bar.low,
                    close: bar.close,
                    volume: bar.volume,
                }),
            }
        }

        weeks
    }
}
