//! End-to-end tests for prediction, export and full pipeline runs

use anyhow::Result;
use calorie_ml_core::{
    generate, EncodingTables, FeatureBuilder, Record, TrainedModel, UnlabeledRecord,
};
use calorie_ml_trainer::{ForestParams, ForestTrainer};
use calorie_pipeline::{
    default_prediction_batch, predict, ErrorKind, ExportError, ExportSummary, FsSink, MemorySink,
    Pipeline, PipelineConfig, PredictionOutcome, ResultExporter, RunReport, RunStage, SinkConfig,
    SinkError, Stage,
};
use chrono::Utc;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, NamedTempFile};

fn quick_params() -> ForestParams {
    ForestParams {
        n_estimators: 20,
        ..ForestParams::default()
    }
}

fn train_small() -> Result<(Vec<Record>, TrainedModel, EncodingTables)> {
    let records = generate(500, 42)?;
    let fitted = FeatureBuilder::new().fit_transform(&records);
    let trained = ForestTrainer::new(quick_params()).train(&fitted.rows(), &fitted.targets, 0.2, 42)?;
    Ok((records, trained, fitted.tables))
}

fn quick_config(local_dir: &std::path::Path, sink: SinkConfig) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.generation.samples = 200;
    config.training.n_estimators = 10;
    config.export.local_dir = local_dir.to_path_buf();
    config.export.sink = sink;
    config.export.sink_timeout_secs = 5;
    config
}

#[test]
fn test_known_item_predicts_positive() -> Result<()> {
    let (_, trained, tables) = train_small()?;
    let batch = vec![UnlabeledRecord::new("Chicken Breast", "protein", 150.0)];

    let out = predict(&trained, &tables, &batch);
    let prediction = out.predictions().next().expect("one prediction");

    assert_eq!(out.skipped_count(), 0);
    assert!(prediction.predicted_target > 0.0);
    assert_eq!(prediction.item_name, "Chicken Breast");
    Ok(())
}

#[test]
fn test_unknown_item_is_skipped_rest_predicted() -> Result<()> {
    let (_, trained, tables) = train_small()?;
    let mut batch = default_prediction_batch();
    batch.insert(2, UnlabeledRecord::new("Unicorn Meat", "mythical", 200.0));

    let out = predict(&trained, &tables, &batch);

    assert_eq!(out.len(), 6);
    assert_eq!(out.predicted_count(), 5);
    assert_eq!(out.skipped_count(), 1);
    assert!(matches!(out.outcomes()[2], PredictionOutcome::Skipped(_)));

    let skipped = out.skipped().next().expect("one skipped record");
    assert_eq!(skipped.index, 2);
    assert_eq!(skipped.reason.value, "Unicorn Meat");

    let predicted: Vec<&str> = out.predictions().map(|p| p.item_name.as_str()).collect();
    assert_eq!(
        predicted,
        vec!["Chicken Breast", "Brown Rice", "Broccoli", "Almonds", "Banana"]
    );
    Ok(())
}

#[test]
fn test_predictions_reproducible() -> Result<()> {
    let (_, trained, tables) = train_small()?;
    let batch = default_prediction_batch();

    let a = predict(&trained, &tables, &batch);
    let b = predict(&trained, &tables, &batch);
    for (x, y) in a.predictions().zip(b.predictions()) {
        assert_eq!(x.predicted_target.to_bits(), y.predicted_target.to_bits());
    }
    Ok(())
}

async fn export_with(
    sink: MemorySink,
    timeout: Duration,
) -> Result<(tempfile::TempDir, Result<ExportSummary, ExportError>)> {
    let (records, trained, tables) = train_small()?;
    let batch = predict(&trained, &tables, &default_prediction_batch());
    let report = RunReport::new(
        "ml-pipeline-test",
        Utc::now(),
        Duration::from_secs(1),
        records.len(),
        &trained.metrics,
        &batch,
    );

    let dir = tempdir()?;
    let exporter = ResultExporter::new(Arc::new(sink), dir.path()).with_timeout(timeout);
    let result = exporter
        .export(&report, &records, &[], "20240101-000000")
        .await;
    Ok((dir, result))
}

#[tokio::test]
async fn test_export_retries_once_and_succeeds() -> Result<()> {
    let sink = MemorySink::failing(1);
    let (dir, result) = export_with(sink.clone(), Duration::from_secs(5)).await?;
    let summary = result?;

    assert!(summary.all_uploaded());
    assert_eq!(summary.artifacts[0].attempts, 2);
    assert_eq!(summary.artifacts[1].attempts, 1);
    assert_eq!(sink.attempts(), 3);
    assert_eq!(
        sink.names(),
        vec![
            "processed-data/ml_pipeline_results_20240101-000000.json".to_string(),
            "raw-data/training_data_20240101-000000.csv".to_string(),
        ]
    );

    let csv = sink
        .get("raw-data/training_data_20240101-000000.csv")
        .expect("csv uploaded");
    assert!(csv.starts_with(b"item_name,category,quantity,target\n"));

    let summary_path = dir.path().join("ml_pipeline_summary_20240101-000000.json");
    let on_disk: ExportSummary = serde_json::from_slice(&std::fs::read(summary_path)?)?;
    assert_eq!(on_disk.artifacts, summary.artifacts);
    Ok(())
}

#[tokio::test]
async fn test_export_second_failure_is_fatal_and_keeps_local_copies() -> Result<()> {
    let sink = MemorySink::failing(2);
    let (dir, result) = export_with(sink.clone(), Duration::from_secs(5)).await?;

    match result {
        Err(ExportError::Sink {
            blob,
            attempts,
            local_copies,
            ..
        }) => {
            assert_eq!(blob, "processed-data/ml_pipeline_results_20240101-000000.json");
            assert_eq!(attempts, 2);
            assert_eq!(local_copies.len(), 3);
            for path in &local_copies {
                assert!(path.exists(), "{} should exist", path.display());
            }
        }
        other => panic!("expected sink error, got {other:?}"),
    }

    assert_eq!(sink.attempts(), 2);
    assert!(sink.names().is_empty());
    assert!(dir
        .path()
        .join("training_data_20240101-000000.csv")
        .exists());
    Ok(())
}

#[tokio::test]
async fn test_export_timeout_counts_as_failure() -> Result<()> {
    let sink = MemorySink::new().with_delay(Duration::from_millis(500));
    let (_dir, result) = export_with(sink.clone(), Duration::from_millis(20)).await?;

    match result {
        Err(ExportError::Sink { source, .. }) => {
            assert!(matches!(source, SinkError::Timeout { .. }));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(sink.attempts(), 2);
    Ok(())
}

#[tokio::test]
async fn test_full_run_with_fs_sink() -> Result<()> {
    let local = tempdir()?;
    let lake = tempdir()?;
    let config = quick_config(
        local.path(),
        SinkConfig::Fs {
            root: lake.path().to_path_buf(),
        },
    );

    let pipeline = Pipeline::new(config, Arc::new(FsSink::new(lake.path())));
    let outcome = pipeline.run(&default_prediction_batch()).await?;

    assert!(outcome.run_id.starts_with("ml-pipeline-"));
    assert_eq!(outcome.state.stage(), RunStage::Exported);
    assert!(!outcome.state.is_failed());
    assert_eq!(outcome.report.training_samples, 200);
    assert_eq!(outcome.report.metrics.train_samples, 160);
    assert_eq!(outcome.report.metrics.test_samples, 40);
    assert_eq!(outcome.report.predictions.len(), 5);
    assert_eq!(outcome.model_fingerprint.len(), 64);

    for artifact in &outcome.export.artifacts {
        assert!(lake.path().join(&artifact.blob).exists());
        assert!(artifact.local_path.exists());
        assert_eq!(
            std::fs::read(&artifact.local_path)?,
            std::fs::read(lake.path().join(&artifact.blob))?
        );
    }
    assert!(outcome.export.summary_path.exists());
    Ok(())
}

#[tokio::test]
async fn test_run_reports_sink_failure_stage() -> Result<()> {
    let local = tempdir()?;
    let config = quick_config(local.path(), SinkConfig::Memory);
    let pipeline = Pipeline::new(config, Arc::new(MemorySink::failing(2)));

    let err = pipeline
        .run(&default_prediction_batch())
        .await
        .expect_err("sink failure must abort the run");

    assert_eq!(err.stage, Stage::Export);
    assert_eq!(err.kind(), ErrorKind::SinkError);
    Ok(())
}

#[tokio::test]
async fn test_run_reports_dataset_failure_stage() -> Result<()> {
    let local = tempdir()?;
    let mut csv = NamedTempFile::new()?;
    writeln!(csv, "item_name,category,quantity,target")?;
    csv.flush()?;

    let mut config = quick_config(local.path(), SinkConfig::Memory);
    config.generation.input_csv = Some(csv.path().to_path_buf());
    let sink = MemorySink::new();
    let pipeline = Pipeline::new(config, Arc::new(sink.clone()));

    let err = pipeline
        .run(&default_prediction_batch())
        .await
        .expect_err("empty training data must abort the run");

    assert_eq!(err.stage, Stage::Generation);
    assert_eq!(err.kind(), ErrorKind::DatasetError);
    assert_eq!(sink.attempts(), 0);
    Ok(())
}

#[tokio::test]
async fn test_run_reports_fit_failure_stage() -> Result<()> {
    let local = tempdir()?;
    let mut config = quick_config(local.path(), SinkConfig::Memory);
    config.training.test_fraction = 1.5;
    let sink = MemorySink::new();
    let pipeline = Pipeline::new(config, Arc::new(sink.clone()));

    let err = pipeline
        .run(&default_prediction_batch())
        .await
        .expect_err("invalid split must abort the run");

    assert_eq!(err.stage, Stage::Training);
    assert_eq!(err.kind(), ErrorKind::FitError);
    assert_eq!(sink.attempts(), 0);
    assert!(std::fs::read_dir(local.path())?.next().is_none());
    Ok(())
}
