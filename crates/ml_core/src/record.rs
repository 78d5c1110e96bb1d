//! Labeled and unlabeled food records

use serde::{Deserialize, Serialize};

/// Read-only view shared by training and prediction records.
pub trait Observation {
    fn item_name(&self) -> &str;
    fn category(&self) -> &str;
    /// Portion size in grams
    fn quantity(&self) -> f64;
}

/// One labeled training sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub item_name: String,
    pub category: String,
    /// Portion size in grams, always > 0
    pub quantity: f64,
    /// Calories, always >= 0
    pub target: f64,
}

impl Record {
    pub fn new(
        item_name: impl Into<String>,
        category: impl Into<String>,
        quantity: f64,
        target: f64,
    ) -> Self {
        Self {
            item_name: item_name.into(),
            category: category.into(),
            quantity,
            target,
        }
    }
}

impl Observation for Record {
    fn item_name(&self) -> &str {
        &self.item_name
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn quantity(&self) -> f64 {
        self.quantity
    }
}

/// A record submitted for prediction, without a known target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlabeledRecord {
    pub item_name: String,
    pub category: String,
    pub quantity: f64,
}

impl UnlabeledRecord {
    pub fn new(item_name: impl Into<String>, category: impl Into<String>, quantity: f64) -> Self {
        Self {
            item_name: item_name.into(),
            category: category.into(),
            quantity,
        }
    }
}

impl Observation for UnlabeledRecord {
    fn item_name(&self) -> &str {
        &self.item_name
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn quantity(&self) -> f64 {
        self.quantity
    }
}

impl From<&Record> for UnlabeledRecord {
    fn from(record: &Record) -> Self {
        Self {
            item_name: record.item_name.clone(),
            category: record.category.clone(),
            quantity: record.quantity,
        }
    }
}
