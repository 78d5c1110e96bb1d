use thiserror::Error;

/// Errors raised while fitting the forest. Always fatal for a run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FitError {
    #[error("feature/target length mismatch: {features} rows vs {targets} targets")]
    LengthMismatch { features: usize, targets: usize },

    #[error("test fraction {0} must lie strictly between 0 and 1")]
    InvalidTestFraction(f64),

    #[error("training partition has {0} samples, at least 2 required")]
    InsufficientSamples(usize),

    #[error("test partition is empty")]
    EmptyTestPartition,

    #[error("target at index {index} is not finite ({value})")]
    NonFiniteTarget { index: usize, value: f64 },

    #[error("invalid forest parameters: {0}")]
    InvalidParams(String),
}

/// Errors reading or writing the tabular training dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },

    #[error("dataset is empty")]
    Empty,
}
