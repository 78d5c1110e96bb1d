//! Regression tree ensemble used for inference
//!
//! Trees are stored as flat node arrays (node 0 is the root) so a model
//! serializes to a compact, order-stable document. Prediction is the plain
//! mean of tree outputs, summed in tree order, so identical inputs produce
//! bit-identical outputs.

use serde::{Deserialize, Serialize};

use crate::features::{FeatureVector, FEATURE_COUNT};
use crate::metrics::TrainingMetrics;
use crate::serialization::canonical_json_string;

/// A decision tree node (internal or leaf)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Feature column compared at this node (ignored for leaves)
    pub feature_index: u16,
    /// Samples with `feature <= threshold` go left
    pub threshold: f64,
    pub left: u32,
    pub right: u32,
    /// Leaf prediction; `None` for internal nodes
    pub value: Option<f64>,
}

impl Node {
    pub fn leaf(value: f64) -> Self {
        Self {
            feature_index: 0,
            threshold: 0.0,
            left: 0,
            right: 0,
            value: Some(value),
        }
    }

    pub fn split(feature_index: u16, threshold: f64) -> Self {
        Self {
            feature_index,
            threshold,
            left: 0,
            right: 0,
            value: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.value.is_some()
    }
}

/// A single regression tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Walk from the root to a leaf.
    ///
    /// Malformed trees (dangling child or feature index) evaluate to 0.0.
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;

        loop {
            let Some(node) = self.nodes.get(idx) else {
                return 0.0;
            };

            if let Some(value) = node.value {
                return value;
            }

            let Some(&feature_value) = features.get(node.feature_index as usize) else {
                return 0.0;
            };

            idx = if feature_value <= node.threshold {
                node.left as usize
            } else {
                node.right as usize
            };
        }
    }

    /// Number of edges on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(node) if !node.is_leaf() => {
                    1 + walk(nodes, node.left as usize).max(walk(nodes, node.right as usize))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }
}

/// Hyperparameters recorded alongside a trained forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestMetadata {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

/// Bagged regression forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestModel {
    pub trees: Vec<Tree>,
    pub feature_count: usize,
    pub metadata: ForestMetadata,
}

impl ForestModel {
    /// Predict from a positional row.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.trees.iter().map(|tree| tree.evaluate(row)).sum();
        sum / self.trees.len() as f64
    }

    /// Predict a single encoded record.
    pub fn predict(&self, features: &FeatureVector) -> f64 {
        self.predict_row(&features.to_row())
    }

    pub fn predict_rows(&self, rows: &[[f64; FEATURE_COUNT]]) -> Vec<f64> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }

    /// BLAKE3 digest (hex) of the canonical JSON form.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let json = canonical_json_string(self)?;
        Ok(hex::encode(blake3::hash(json.as_bytes()).as_bytes()))
    }
}

/// A fitted forest together with its held-out evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub model: ForestModel,
    pub metrics: TrainingMetrics,
}

impl TrainedModel {
    pub fn predict(&self, features: &FeatureVector) -> f64 {
        self.model.predict(features)
    }
}
