//! Calorie batch pipeline
//!
//! Runs one batch end to end: generate (or load) labeled samples, build
//! features, train a forest, score a prediction batch and export the results
//! to a blob sink.
//!
//! Modules:
//! - `predictor`: per-record batch prediction with skip reporting
//! - `sink`: blob sink trait with filesystem, HTTP and in-memory backends
//! - `exporter`: results document, training CSV and retrying upload
//! - `run`: run state machine and the pipeline driver
//! - `config`: TOML configuration with environment overrides
//! - `errors`: error taxonomy

pub mod config;
pub mod errors;
pub mod exporter;
pub mod predictor;
pub mod run;
pub mod sink;

pub use config::{PipelineConfig, SinkConfig};
pub use errors::{ConfigError, ErrorKind, ExportError, InputError, PipelineError, SinkError, Stage};
pub use exporter::{ArtifactNames, ExportSummary, ResultExporter, RunReport};
pub use predictor::{
    default_prediction_batch, load_prediction_inputs, predict, BatchPrediction, PredictionOutcome,
    PredictionResult, SkippedRecord,
};
pub use run::{Pipeline, RunOutcome, RunStage, RunState};
pub use sink::{BlobSink, FsSink, HttpSink, MemorySink};

use calorie_ml_core::record::UnlabeledRecord;

/// Resolve the prediction batch for a configuration.
pub fn prediction_batch(config: &PipelineConfig) -> Result<Vec<UnlabeledRecord>, InputError> {
    match &config.prediction.input_file {
        Some(path) => load_prediction_inputs(path),
        None => Ok(default_prediction_batch()),
    }
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
