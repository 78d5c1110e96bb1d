//! Error taxonomy for a pipeline run

use calorie_ml_core::GenerationError;
use calorie_ml_trainer::{DatasetError, FitError};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A single write to a blob sink failed.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("I/O error writing '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid blob name '{0}'")]
    InvalidName(String),

    #[error("HTTP {status} writing '{name}'")]
    Http { name: String, status: u16 },

    #[error("transport error writing '{name}': {message}")]
    Transport { name: String, message: String },

    #[error("write of '{name}' timed out after {after:?}")]
    Timeout { name: String, after: Duration },

    #[error("sink rejected '{name}': {reason}")]
    Rejected { name: String, reason: String },
}

/// Failure while producing or delivering run artifacts.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to render training data: {0}")]
    Dataset(#[from] DatasetError),

    #[error("failed to write local copy {path}: {source}")]
    Local {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upload of '{blob}' failed after {attempts} attempts: {source}; local copies kept at {local_copies:?}")]
    Sink {
        blob: String,
        attempts: u32,
        #[source]
        source: SinkError,
        local_copies: Vec<PathBuf>,
    },
}

/// Configuration could not be loaded or is invalid.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Prediction input file could not be read.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("failed to read prediction input {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse prediction input: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("record {index} has invalid quantity {quantity}")]
    InvalidQuantity { index: usize, quantity: f64 },
}

/// Pipeline component that was executing when a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Generation,
    FeatureBuilding,
    Training,
    Prediction,
    Export,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Generation => "generation",
            Stage::FeatureBuilding => "feature building",
            Stage::Training => "training",
            Stage::Prediction => "prediction",
            Stage::Export => "export",
        };
        f.write_str(name)
    }
}

/// Stage-level failure cause.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Fit(#[from] FitError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("invalid run state transition from {from:?} to {to:?}")]
    Transition {
        from: crate::run::RunStage,
        to: crate::run::RunStage,
    },
}

/// Error kind names reported for a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    GenerationError,
    DatasetError,
    FitError,
    SinkError,
    ExportError,
    StateError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A run aborted at `stage`.
#[derive(Error, Debug)]
#[error("pipeline failed during {stage}: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: StageError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: impl Into<StageError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match &self.source {
            StageError::Generation(_) => ErrorKind::GenerationError,
            StageError::Dataset(_) => ErrorKind::DatasetError,
            StageError::Fit(_) => ErrorKind::FitError,
            StageError::Export(ExportError::Sink { .. }) => ErrorKind::SinkError,
            StageError::Export(_) => ErrorKind::ExportError,
            StageError::Transition { .. } => ErrorKind::StateError,
        }
    }
}
