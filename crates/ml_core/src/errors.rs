//! Error types for the core data model

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised before any record is produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    /// Requested sample count is zero or above the supported maximum
    #[error("invalid sample count {count} (expected 1..={max})")]
    InvalidCount { count: usize, max: usize },

    /// Custom catalog without entries
    #[error("food catalog is empty")]
    EmptyCatalog,

    /// Catalog entry with a non-finite or negative calorie rate
    #[error("catalog entry '{item}' has invalid base rate {rate}")]
    InvalidBaseRate { item: String, rate: f64 },
}

/// Which encoding table a lookup missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingField {
    Item,
    Category,
}

impl fmt::Display for EncodingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingField::Item => f.write_str("item"),
            EncodingField::Category => f.write_str("category"),
        }
    }
}

/// A record referenced an item or category that was never seen in training.
///
/// Per-record and recoverable: the record is skipped, the batch continues.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("unknown {field} '{value}'")]
pub struct UnknownCategory {
    pub field: EncodingField,
    pub value: String,
}
