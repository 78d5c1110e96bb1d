//! Deterministic utilities for reproducible training
//!
//! Seeded `ChaCha8` streams, the train/test split and tie-breaking logic so
//! that a given seed yields the same partition and the same forest on every
//! platform.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::errors::FitError;

/// RNG for stream `stream` of a run seeded with `seed`.
///
/// Stream 0 drives the split; stream `i + 1` drives tree `i`'s bootstrap.
pub fn seeded_rng(seed: u64, stream: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(stream);
    rng
}

/// Held-out and training indices produced by [`train_test_split`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n` and hold out `ceil(n * test_fraction)` indices.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> Result<Split, FitError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(FitError::InvalidTestFraction(test_fraction));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut seeded_rng(seed, 0));

    let n_test = ((n as f64) * test_fraction).ceil() as usize;
    let train = indices.split_off(n_test.min(n));

    Ok(Split {
        train,
        test: indices,
    })
}

/// Map an `f64` onto an `i64` with the same total order.
pub fn ordered_bits(value: f64) -> i64 {
    let bits = value.to_bits() as i64;
    bits ^ ((((bits >> 63) as u64) >> 1) as i64)
}

/// Deterministic tie-breaker for split selection
/// Lower feature index wins, then lower threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SplitTieBreaker {
    pub feature_idx: usize,
    pub threshold_key: i64,
}

impl SplitTieBreaker {
    pub fn new(feature_idx: usize, threshold: f64) -> Self {
        Self {
            feature_idx,
            threshold_key: ordered_bits(threshold),
        }
    }
}
