//! Numeric building blocks used by the strategies.
//!
//! All functions are pure over slices; nothing here knows about symbols,
//! caches or providers.

pub mod quantile;
pub mod resample;
pub mod sma;

pub use quantile::weighted_quantile;
pub use resample::WeeklyResampler;
pub use sma::Sma;

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
