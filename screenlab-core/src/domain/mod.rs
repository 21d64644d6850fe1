//! Domain types: bars, series, instruments.

pub mod bar;
pub mod instrument;
pub mod series;

pub use bar::{DailyBar, WeeklyBar};
pub use instrument::{normalize_symbol, Instrument, SYMBOL_WIDTH};
pub use series::DailySeries;
