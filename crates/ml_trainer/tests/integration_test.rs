//! Integration tests for the deterministic forest trainer
//!
//! Ensures identical models are produced across multiple runs and that the
//! default configuration learns the synthetic calorie data.

use anyhow::Result;
use calorie_ml_core::generate;
use calorie_ml_core::serialization::canonical_json_string;
use calorie_ml_core::FeatureBuilder;
use calorie_ml_trainer::{
    records_to_csv, train_model_from_csv, FitError, ForestParams, ForestTrainer, TrainerError,
};
use std::io::Write;
use tempfile::NamedTempFile;

fn quick_params() -> ForestParams {
    ForestParams {
        n_estimators: 10,
        max_depth: 8,
        min_samples_split: 5,
        min_samples_leaf: 1,
        bootstrap: true,
    }
}

#[test]
fn test_default_forest_quality_on_generated_data() -> Result<()> {
    let records = generate(500, 42)?;
    let fitted = FeatureBuilder::new().fit_transform(&records);

    let trained = ForestTrainer::new(ForestParams::default()).train(
        &fitted.rows(),
        &fitted.targets,
        0.2,
        42,
    )?;

    assert_eq!(trained.metrics.train_samples, 400);
    assert_eq!(trained.metrics.test_samples, 100);
    assert!(trained.metrics.r2 > 0.5, "r2 = {}", trained.metrics.r2);
    assert!(trained.metrics.r2 <= 1.0);
    assert!(trained.metrics.rmse < 50.0, "rmse = {}", trained.metrics.rmse);
    assert!(trained.metrics.rmse >= 0.0);

    Ok(())
}

#[test]
fn test_deterministic_training() -> Result<()> {
    let records = generate(200, 9)?;
    let fitted = FeatureBuilder::new().fit_transform(&records);
    let rows = fitted.rows();

    let model1 = ForestTrainer::new(quick_params()).train(&rows, &fitted.targets, 0.2, 42)?;
    let model2 = ForestTrainer::new(quick_params()).train(&rows, &fitted.targets, 0.2, 42)?;

    assert_eq!(model1.metrics, model2.metrics, "Metrics should be identical");
    assert_eq!(
        model1.model.trees.len(),
        model2.model.trees.len(),
        "Number of trees should be identical"
    );

    for (i, (tree1, tree2)) in model1.model.trees.iter().zip(&model2.model.trees).enumerate() {
        assert_eq!(tree1.nodes.len(), tree2.nodes.len(), "Tree {} size", i);
        for (j, (node1, node2)) in tree1.nodes.iter().zip(&tree2.nodes).enumerate() {
            assert_eq!(node1, node2, "Tree {} node {} should match", i, j);
        }
    }

    Ok(())
}

#[test]
fn test_cross_run_canonical_json() -> Result<()> {
    let records = generate(150, 3)?;
    let fitted = FeatureBuilder::new().fit_transform(&records);
    let rows = fitted.rows();

    let mut outputs = Vec::new();
    for _ in 0..3 {
        let trained = ForestTrainer::new(quick_params()).train(&rows, &fitted.targets, 0.2, 11)?;
        outputs.push(canonical_json_string(&trained.model)?);
    }

    for (i, json) in outputs.iter().enumerate().skip(1) {
        assert_eq!(&outputs[0], json, "JSON output from run {} should match run 0", i);
    }

    Ok(())
}

#[test]
fn test_predictions_bit_identical() -> Result<()> {
    let records = generate(120, 5)?;
    let fitted = FeatureBuilder::new().fit_transform(&records);
    let trained = ForestTrainer::new(quick_params()).train(&fitted.rows(), &fitted.targets, 0.2, 5)?;

    for features in fitted.features.iter().take(20) {
        let a = trained.predict(features);
        let b = trained.predict(features);
        assert_eq!(a.to_bits(), b.to_bits());
    }

    Ok(())
}

#[test]
fn test_train_from_csv() -> Result<()> {
    let records = generate(120, 21)?;
    let mut file = NamedTempFile::new()?;
    file.write_all(&records_to_csv(&records)?)?;
    file.flush()?;

    let (trained, tables) = train_model_from_csv(file.path(), quick_params(), 0.2, 21)?;

    assert_eq!(trained.metrics.train_samples + trained.metrics.test_samples, 120);
    assert_eq!(tables.items.get(&records[0].item_name), Some(0));
    assert_eq!(tables.categories.get(&records[0].category), Some(0));

    Ok(())
}

#[test]
fn test_degenerate_training_data_is_fatal() -> Result<()> {
    let records = generate(2, 1)?;
    let fitted = FeatureBuilder::new().fit_transform(&records);

    let err = ForestTrainer::new(quick_params())
        .train(&fitted.rows(), &fitted.targets, 0.5, 1)
        .unwrap_err();
    assert_eq!(err, FitError::InsufficientSamples(1));

    let mut file = NamedTempFile::new()?;
    writeln!(file, "item_name,category,quantity,target")?;
    file.flush()?;
    assert!(matches!(
        train_model_from_csv(file.path(), quick_params(), 0.2, 1),
        Err(TrainerError::Dataset(_))
    ));

    Ok(())
}
