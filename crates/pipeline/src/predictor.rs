//! Batch prediction against a frozen model and encodings

use calorie_ml_core::features::{EncodingTables, FeatureBuilder};
use calorie_ml_core::forest::TrainedModel;
use calorie_ml_core::record::{Observation, UnlabeledRecord};
use calorie_ml_core::UnknownCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::errors::InputError;

/// A successful prediction for one input record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub item_name: String,
    pub category: String,
    pub quantity: f64,
    pub predicted_target: f64,
    pub produced_at: DateTime<Utc>,
}

/// An input record that could not be encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRecord {
    /// Position in the input batch
    pub index: usize,
    pub item_name: String,
    pub category: String,
    pub quantity: f64,
    pub reason: UnknownCategory,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutcome {
    Predicted(PredictionResult),
    Skipped(SkippedRecord),
}

impl PredictionOutcome {
    pub fn is_predicted(&self) -> bool {
        matches!(self, PredictionOutcome::Predicted(_))
    }
}

/// Outcomes in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchPrediction {
    outcomes: Vec<PredictionOutcome>,
}

impl BatchPrediction {
    pub fn outcomes(&self) -> &[PredictionOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn predictions(&self) -> impl Iterator<Item = &PredictionResult> {
        self.outcomes.iter().filter_map(|o| match o {
            PredictionOutcome::Predicted(p) => Some(p),
            PredictionOutcome::Skipped(_) => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = &SkippedRecord> {
        self.outcomes.iter().filter_map(|o| match o {
            PredictionOutcome::Skipped(s) => Some(s),
            PredictionOutcome::Predicted(_) => None,
        })
    }

    pub fn predicted_count(&self) -> usize {
        self.predictions().count()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped().count()
    }
}

/// Predict every record; unknown items or categories are skipped, not fatal.
pub fn predict<O: Observation>(
    trained: &TrainedModel,
    tables: &EncodingTables,
    records: &[O],
) -> BatchPrediction {
    let encoded = FeatureBuilder::new().transform(records, tables);
    let mut outcomes = Vec::with_capacity(records.len());

    for (index, (record, features)) in records.iter().zip(encoded).enumerate() {
        let outcome = match features {
            Ok(features) => {
                let predicted_target = trained.predict(&features);
                info!(
                    item = record.item_name(),
                    quantity = record.quantity(),
                    predicted = %format!("{predicted_target:.1}"),
                    "Predicted"
                );
                PredictionOutcome::Predicted(PredictionResult {
                    item_name: record.item_name().to_string(),
                    category: record.category().to_string(),
                    quantity: record.quantity(),
                    predicted_target,
                    produced_at: Utc::now(),
                })
            }
            Err(reason) => {
                warn!(item = record.item_name(), %reason, "Could not predict");
                PredictionOutcome::Skipped(SkippedRecord {
                    index,
                    item_name: record.item_name().to_string(),
                    category: record.category().to_string(),
                    quantity: record.quantity(),
                    reason,
                })
            }
        };
        outcomes.push(outcome);
    }

    BatchPrediction { outcomes }
}

/// Demo batch scored when no prediction input is configured.
pub fn default_prediction_batch() -> Vec<UnlabeledRecord> {
    vec![
        UnlabeledRecord::new("Chicken Breast", "protein", 150.0),
        UnlabeledRecord::new("Brown Rice", "grain", 80.0),
        UnlabeledRecord::new("Broccoli", "vegetable", 100.0),
        UnlabeledRecord::new("Almonds", "nuts", 25.0),
        UnlabeledRecord::new("Banana", "fruit", 120.0),
    ]
}

/// Parse a JSON array of `{item_name, category, quantity}`.
pub fn parse_prediction_inputs(json: &str) -> Result<Vec<UnlabeledRecord>, InputError> {
    let records: Vec<UnlabeledRecord> = serde_json::from_str(json)?;
    if let Some((index, record)) = records
        .iter()
        .enumerate()
        .find(|(_, r)| !(r.quantity.is_finite() && r.quantity > 0.0))
    {
        return Err(InputError::InvalidQuantity {
            index,
            quantity: record.quantity,
        });
    }
    Ok(records)
}

pub fn load_prediction_inputs(path: &Path) -> Result<Vec<UnlabeledRecord>, InputError> {
    let json = std::fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_prediction_inputs(&json)
}
