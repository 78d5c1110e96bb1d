//! Calorie ML core
//!
//! Data model, feature engineering and inference for the calorie
//! estimation batch pipeline.
//!
//! Modules:
//! - `record`: labeled and unlabeled food records
//! - `catalog`: built-in food catalog and portion distributions
//! - `generator`: deterministic synthetic sample generation
//! - `features`: encoding tables and fixed-order feature vectors
//! - `forest`: regression tree ensemble inference
//! - `metrics`: RMSE and R²
//! - `serialization`: canonical JSON for artifact hashing
//! - `errors`: generation and encoding errors

pub mod catalog;
pub mod errors;
pub mod features;
pub mod forest;
pub mod generator;
pub mod metrics;
pub mod record;
pub mod serialization;

pub use catalog::{default_catalog, FoodItem};
pub use errors::{EncodingField, GenerationError, UnknownCategory};
pub use features::{
    EncodingTable, EncodingTables, FeatureBuilder, FeatureVector, FittedFeatures, FEATURE_COUNT,
    FEATURE_NAMES,
};
pub use forest::{ForestMetadata, ForestModel, Node, TrainedModel, Tree};
pub use generator::{generate, SampleGenerator, MIN_QUANTITY};
pub use metrics::TrainingMetrics;
pub use record::{Observation, Record, UnlabeledRecord};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
