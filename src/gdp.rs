// 📈 GDP Estimator - population × random factor ÷ exchange rate
//
// The factor is drawn uniformly from [1000, 2000] (inclusive) on every call,
// so estimates move between refreshes. The RNG is a parameter: production
// passes an entropy-seeded generator, tests pass a seeded or stepped one.

use rand::Rng;

/// Lowest random multiplier (inclusive)
pub const RANDOM_FACTOR_MIN: u32 = 1000;

/// Highest random multiplier (inclusive)
pub const RANDOM_FACTOR_MAX: u32 = 2000;

/// Estimate GDP for one country.
///
/// `rate` is expected to be a positive, finite exchange rate; see
/// [`usable_rate`] for the filter the merger applies first.
pub fn estimate_gdp<R: Rng + ?Sized>(rng: &mut R, population: u64, rate: f64) -> f64 {
    let factor = rng.gen_range(RANDOM_FACTOR_MIN..=RANDOM_FACTOR_MAX);
    (population as f64 * f64::from(factor)) / rate
}

/// A rate the estimator can divide by. Zero, negative, NaN and infinite
/// rates count as "no matching rate".
pub fn usable_rate(rate: f64) -> Option<f64> {
    (rate.is_finite() && rate > 0.0).then_some(rate)
}
