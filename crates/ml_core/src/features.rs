//! Feature engineering with frozen categorical encodings
//!
//! `fit_transform` walks the training set once and assigns ids to items and
//! categories in first-seen order. The resulting [`EncodingTables`] are then
//! only ever borrowed immutably: `transform` reports an [`UnknownCategory`]
//! for any value it has not seen instead of inventing an id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, instrument};

use crate::errors::{EncodingField, UnknownCategory};
use crate::record::{Observation, Record};

/// Number of model features.
pub const FEATURE_COUNT: usize = 6;

/// Column names in model order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "item_id",
    "category_id",
    "quantity",
    "quantity_scaled",
    "quantity_squared",
    "log_quantity",
];

/// Append-only mapping from a categorical value to a dense id.
///
/// Serialized as the label list in id order; the lookup index is rebuilt on
/// deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct EncodingTable {
    labels: Vec<String>,
    index: HashMap<String, u32>,
}

impl From<Vec<String>> for EncodingTable {
    fn from(labels: Vec<String>) -> Self {
        Self::from_labels(labels)
    }
}

impl From<EncodingTable> for Vec<String> {
    fn from(table: EncodingTable) -> Self {
        table.labels
    }
}

impl EncodingTable {
    /// Rebuild a table from labels in id order.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::default();
        for label in labels {
            table.intern(&label.into());
        }
        table
    }

    /// Id for a value, or the existing id if already present.
    pub(crate) fn intern(&mut self, value: &str) -> u32 {
        if let Some(&id) = self.index.get(value) {
            return id;
        }
        let id = self.labels.len() as u32;
        self.labels.push(value.to_string());
        self.index.insert(value.to_string(), id);
        id
    }

    pub fn get(&self, value: &str) -> Option<u32> {
        self.index.get(value).copied()
    }

    pub fn label(&self, id: u32) -> Option<&str> {
        self.labels.get(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels in id order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// Item and category encodings established at training time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingTables {
    pub items: EncodingTable,
    pub categories: EncodingTable,
}

impl EncodingTables {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Encode one observation without touching the tables.
    pub fn encode<O: Observation + ?Sized>(&self, record: &O) -> Result<FeatureVector, UnknownCategory> {
        let item_id = self.items.get(record.item_name()).ok_or_else(|| UnknownCategory {
            field: EncodingField::Item,
            value: record.item_name().to_string(),
        })?;
        let category_id = self
            .categories
            .get(record.category())
            .ok_or_else(|| UnknownCategory {
                field: EncodingField::Category,
                value: record.category().to_string(),
            })?;
        Ok(FeatureVector::derive(item_id, category_id, record.quantity()))
    }
}

/// Model input for one record. Field order is the model's column order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub item_id: u32,
    pub category_id: u32,
    pub quantity: f64,
    pub quantity_scaled: f64,
    pub quantity_squared: f64,
    pub log_quantity: f64,
}

impl FeatureVector {
    /// The only place quantity-derived features are computed.
    pub fn derive(item_id: u32, category_id: u32, quantity: f64) -> Self {
        Self {
            item_id,
            category_id,
            quantity,
            quantity_scaled: quantity / 100.0,
            quantity_squared: quantity * quantity,
            log_quantity: quantity.ln_1p(),
        }
    }

    /// Positional row in [`FEATURE_NAMES`] order.
    pub fn to_row(&self) -> [f64; FEATURE_COUNT] {
        [
            f64::from(self.item_id),
            f64::from(self.category_id),
            self.quantity,
            self.quantity_scaled,
            self.quantity_squared,
            self.log_quantity,
        ]
    }
}

/// Output of [`FeatureBuilder::fit_transform`].
#[derive(Debug, Clone)]
pub struct FittedFeatures {
    pub features: Vec<FeatureVector>,
    pub targets: Vec<f64>,
    pub tables: EncodingTables,
}

impl FittedFeatures {
    /// Feature rows in model column order.
    pub fn rows(&self) -> Vec<[f64; FEATURE_COUNT]> {
        self.features.iter().map(FeatureVector::to_row).collect()
    }
}

/// Stateless feature builder.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureBuilder;

impl FeatureBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Encode the training set, establishing encodings in first-seen order.
    #[instrument(skip_all, fields(records = records.len()))]
    pub fn fit_transform(&self, records: &[Record]) -> FittedFeatures {
        let mut tables = EncodingTables::default();
        let mut features = Vec::with_capacity(records.len());
        let mut targets = Vec::with_capacity(records.len());

        for record in records {
            let item_id = tables.items.intern(&record.item_name);
            let category_id = tables.categories.intern(&record.category);
            features.push(FeatureVector::derive(item_id, category_id, record.quantity));
            targets.push(record.target);
        }

        info!(
            features = FEATURE_COUNT,
            samples = features.len(),
            items = tables.items.len(),
            categories = tables.categories.len(),
            "Feature engineering completed"
        );

        FittedFeatures {
            features,
            targets,
            tables,
        }
    }

    /// Encode new records against frozen tables, one result per record.
    pub fn transform<O: Observation>(
        &self,
        records: &[O],
        tables: &EncodingTables,
    ) -> Vec<Result<FeatureVector, UnknownCategory>> {
        records.iter().map(|record| tables.encode(record)).collect()
    }
}
