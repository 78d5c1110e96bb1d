//! Random forest trainer
//!
//! Bags exact-greedy CART trees over bootstrap samples. Every random draw
//! comes from a seeded `ChaCha8` stream (one per tree), so a fixed seed
//! produces the same forest, the same split and the same metrics.

use calorie_ml_core::forest::{ForestMetadata, ForestModel, TrainedModel};
use calorie_ml_core::metrics::{r_squared, rmse, TrainingMetrics};
use rand::Rng;
use tracing::{debug, info, instrument};

use crate::cart::{CartBuilder, TreeConfig};
use crate::deterministic::{seeded_rng, train_test_split};
use crate::errors::FitError;

/// Forest training configuration
#[derive(Clone, Debug, PartialEq)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Draw a bootstrap sample per tree; otherwise every tree sees all rows
    pub bootstrap: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 1,
            bootstrap: true,
        }
    }
}

impl ForestParams {
    pub fn validate(&self) -> Result<(), FitError> {
        if self.n_estimators == 0 {
            return Err(FitError::InvalidParams("n_estimators must be >= 1".into()));
        }
        if self.max_depth == 0 {
            return Err(FitError::InvalidParams("max_depth must be >= 1".into()));
        }
        if self.min_samples_split < 2 {
            return Err(FitError::InvalidParams("min_samples_split must be >= 2".into()));
        }
        if self.min_samples_leaf == 0 {
            return Err(FitError::InvalidParams("min_samples_leaf must be >= 1".into()));
        }
        Ok(())
    }

    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }
}

/// Random forest trainer
#[derive(Clone, Debug, Default)]
pub struct ForestTrainer {
    params: ForestParams,
}

impl ForestTrainer {
    pub fn new(params: ForestParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Split, fit on the training partition and score on the held-out one.
    #[instrument(skip(self, rows, targets), fields(samples = rows.len()))]
    pub fn train<R: AsRef<[f64]>>(
        &self,
        rows: &[R],
        targets: &[f64],
        test_fraction: f64,
        seed: u64,
    ) -> Result<TrainedModel, FitError> {
        check_inputs(rows, targets)?;

        let split = train_test_split(rows.len(), test_fraction, seed)?;
        if split.train.len() < 2 {
            return Err(FitError::InsufficientSamples(split.train.len()));
        }
        if split.test.is_empty() {
            return Err(FitError::EmptyTestPartition);
        }

        let train_rows: Vec<&[f64]> = split.train.iter().map(|&i| rows[i].as_ref()).collect();
        let train_targets: Vec<f64> = split.train.iter().map(|&i| targets[i]).collect();

        let model = self.fit(&train_rows, &train_targets, seed)?;

        let y_true: Vec<f64> = split.test.iter().map(|&i| targets[i]).collect();
        let y_pred: Vec<f64> = split
            .test
            .iter()
            .map(|&i| model.predict_row(rows[i].as_ref()))
            .collect();

        let metrics = TrainingMetrics {
            rmse: rmse(&y_true, &y_pred),
            r2: r_squared(&y_true, &y_pred),
            train_samples: split.train.len(),
            test_samples: split.test.len(),
        };

        info!(
            rmse = %format!("{:.2}", metrics.rmse),
            r2 = %format!("{:.4}", metrics.r2),
            train_samples = metrics.train_samples,
            test_samples = metrics.test_samples,
            "Model trained"
        );

        Ok(TrainedModel { model, metrics })
    }

    /// Fit a forest on every given row.
    pub fn fit<R: AsRef<[f64]>>(
        &self,
        rows: &[R],
        targets: &[f64],
        seed: u64,
    ) -> Result<ForestModel, FitError> {
        self.params.validate()?;
        check_inputs(rows, targets)?;
        if rows.len() < 2 {
            return Err(FitError::InsufficientSamples(rows.len()));
        }

        let n = rows.len();
        let builder = CartBuilder::new(rows, targets, self.params.tree_config());
        let mut trees = Vec::with_capacity(self.params.n_estimators);

        for tree_idx in 0..self.params.n_estimators {
            let sample: Vec<usize> = if self.params.bootstrap {
                let mut rng = seeded_rng(seed, tree_idx as u64 + 1);
                (0..n).map(|_| rng.gen_range(0..n)).collect()
            } else {
                (0..n).collect()
            };

            let tree = builder.build(&sample);
            debug!(
                tree = tree_idx + 1,
                nodes = tree.nodes.len(),
                depth = tree.depth(),
                "Built tree"
            );
            trees.push(tree);
        }

        Ok(ForestModel {
            trees,
            feature_count: rows[0].as_ref().len(),
            metadata: ForestMetadata {
                n_estimators: self.params.n_estimators,
                max_depth: self.params.max_depth,
                min_samples_split: self.params.min_samples_split,
                min_samples_leaf: self.params.min_samples_leaf,
                seed,
            },
        })
    }
}

fn check_inputs<R: AsRef<[f64]>>(rows: &[R], targets: &[f64]) -> Result<(), FitError> {
    if rows.len() != targets.len() {
        return Err(FitError::LengthMismatch {
            features: rows.len(),
            targets: targets.len(),
        });
    }
    if let Some((index, &value)) = targets.iter().enumerate().find(|(_, t)| !t.is_finite()) {
        return Err(FitError::NonFiniteTarget { index, value });
    }
    Ok(())
}
