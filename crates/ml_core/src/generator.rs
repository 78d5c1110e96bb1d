//! Deterministic synthetic sample generation
//!
//! Draws catalog items uniformly, samples portion sizes from a
//! category-specific normal distribution and applies ±5% multiplicative
//! noise to the calorie target. The RNG stream is `ChaCha8`, so a given
//! `(count, seed)` pair yields the same records on every platform.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::catalog::{default_catalog, portion_for_category, FoodItem};
use crate::errors::GenerationError;
use crate::record::Record;

/// Smallest portion the generator will emit (grams).
pub const MIN_QUANTITY: f64 = 10.0;

/// Upper bound on a single generation request.
pub const MAX_SAMPLES: usize = 1_000_000;

/// Standard deviation of the multiplicative target noise.
pub const NOISE_STD_DEV: f64 = 0.05;

/// Synthetic dataset generator over a food catalog.
#[derive(Debug, Clone)]
pub struct SampleGenerator {
    catalog: Vec<FoodItem>,
}

impl Default for SampleGenerator {
    fn default() -> Self {
        Self {
            catalog: default_catalog(),
        }
    }
}

impl SampleGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom catalog instead of the built-in one.
    pub fn with_catalog(catalog: Vec<FoodItem>) -> Result<Self, GenerationError> {
        if catalog.is_empty() {
            return Err(GenerationError::EmptyCatalog);
        }
        if let Some(bad) = catalog
            .iter()
            .find(|f| !f.base_calories_per_100g.is_finite() || f.base_calories_per_100g < 0.0)
        {
            return Err(GenerationError::InvalidBaseRate {
                item: bad.name.clone(),
                rate: bad.base_calories_per_100g,
            });
        }
        Ok(Self { catalog })
    }

    pub fn catalog(&self) -> &[FoodItem] {
        &self.catalog
    }

    /// Produce `count` records from `seed`.
    pub fn generate(&self, count: usize, seed: u64) -> Result<Vec<Record>, GenerationError> {
        if count == 0 || count > MAX_SAMPLES {
            return Err(GenerationError::InvalidCount {
                count,
                max: MAX_SAMPLES,
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut records = Vec::with_capacity(count);

        for _ in 0..count {
            let food = &self.catalog[rng.gen_range(0..self.catalog.len())];
            let portion = portion_for_category(&food.category);

            let raw = portion.mean + portion.std_dev * standard_normal(&mut rng);
            let quantity = round_tenth(raw.max(MIN_QUANTITY));

            let noise = 1.0 + NOISE_STD_DEV * standard_normal(&mut rng);
            let target = round_tenth((food.base_calories_per_100g * (quantity / 100.0) * noise).max(0.0));

            records.push(Record::new(
                food.name.clone(),
                food.category.clone(),
                quantity,
                target,
            ));
        }

        let categories = distinct_categories(&records);
        info!(
            samples = records.len(),
            categories, seed, "Generated synthetic food samples"
        );
        debug!(first = ?records.first(), "First generated record");

        Ok(records)
    }
}

/// Generate with the built-in catalog.
pub fn generate(count: usize, seed: u64) -> Result<Vec<Record>, GenerationError> {
    SampleGenerator::default().generate(count, seed)
}

/// Box–Muller transform on two uniform draws.
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    // gen::<f64>() is in [0, 1); flip to (0, 1] so ln never sees zero
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn distinct_categories(records: &[Record]) -> usize {
    let mut seen: Vec<&str> = records.iter().map(|r| r.category.as_str()).collect();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}
