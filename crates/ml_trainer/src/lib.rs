//! Calorie ML trainer - deterministic offline random-forest trainer
//!
//! Provides tools for training bagged regression trees with full
//! determinism and reproducibility across platforms.

mod cart;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod trainer;

use calorie_ml_core::features::{EncodingTables, FeatureBuilder};
use calorie_ml_core::forest::TrainedModel;
use std::path::Path;

pub use dataset::{load_records_csv, read_records_csv, records_to_csv, write_records_csv, CSV_HEADER};
pub use deterministic::{seeded_rng, train_test_split, Split, SplitTieBreaker};
pub use errors::{DatasetError, FitError};
pub use trainer::{ForestParams, ForestTrainer};

/// Errors from [`train_model_from_csv`].
#[derive(Debug, thiserror::Error)]
pub enum TrainerError {
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("training error: {0}")]
    Training(#[from] FitError),
}

/// Train a model directly from a training CSV file.
pub fn train_model_from_csv(
    path: &Path,
    params: ForestParams,
    test_fraction: f64,
    seed: u64,
) -> Result<(TrainedModel, EncodingTables), TrainerError> {
    let records = load_records_csv(path)?;
    let fitted = FeatureBuilder::new().fit_transform(&records);
    let trained = ForestTrainer::new(params).train(&fitted.rows(), &fitted.targets, test_fraction, seed)?;
    Ok((trained, fitted.tables))
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
