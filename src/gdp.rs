//! GDP estimate attached to every refreshed country.
//!
//! The estimate is `population * U / exchange_rate` with `U` drawn
//! uniformly from `[1000, 2000)` on every call, so it is a simulated figure
//! rather than an economic one. The random source is injectable so callers
//! can reproduce a sequence.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const MULTIPLIER_MIN: f64 = 1000.0;
pub const MULTIPLIER_MAX: f64 = 2000.0;

pub struct GdpEstimator {
    rng: StdRng,
}

impl GdpEstimator {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seeded when a seed is configured, entropy-backed otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }

    /// Returns `Some(0.0)` when the country has no currency, `None` when the
    /// rate is unknown or zero, otherwise the randomized estimate.
    pub fn estimate(
        &mut self,
        population: i64,
        exchange_rate: Option<f64>,
        currency_code: Option<&str>,
    ) -> Option<f64> {
        if currency_code.is_none() {
            return Some(0.0);
        }
        let rate = exchange_rate.filter(|r| *r != 0.0)?;
        let multiplier = self.rng.gen_range(MULTIPLIER_MIN..MULTIPLIER_MAX);
        Some(population as f64 * multiplier / rate)
    }
}
