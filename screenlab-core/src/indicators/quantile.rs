//! Volume-weighted price quantiles.

/// Volume-weighted quantile of `(price, weight)` observations.
///
/// Observations are sorted by price; the result is the price of the first
/// observation whose cumulative weight share reaches `q`. Returns `None` when
/// the input is empty or carries no positive total weight. `q` is clamped to
/// `[0, 1]`.
pub fn weighted_quantile(observations: &[(f64, f64)], q: f64) -> Option<f64> {
    let total: f64 = observations.iter().map(|(_, w)| *w).sum();
    if total.is_nan() || total <= 0.0 {
        return None;
    }

    let mut sorted = observations.to_vec();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let target = q.clamp(0.0, 1.0);
    let mut cumulative = 0.0;
    for (price, weight) in &sorted {
        cumulative += weight;
        if cumulative / total >= target {
            return Some(*price);
        }
    }
    // Rounding can leave the final share a hair under 1.0.
    sorted.last().map(|(price, _)| *price)
}
