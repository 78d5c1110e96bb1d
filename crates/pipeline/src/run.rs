//! Run state machine and pipeline driver

use calorie_ml_core::features::FeatureBuilder;
use calorie_ml_core::generator::SampleGenerator;
use calorie_ml_core::record::{Record, UnlabeledRecord};
use calorie_ml_trainer::{load_records_csv, ForestTrainer};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::errors::{ErrorKind, ExportError, PipelineError, Stage, StageError};
use crate::exporter::{ExportSummary, ResultExporter, RunReport};
use crate::predictor::{self, BatchPrediction};
use crate::sink::BlobSink;

/// Stamp format shared by run ids and artifact names.
pub const STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Progress of a run. Stages only move forward, one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RunStage {
    Idle,
    Generated,
    FeatureBuilt,
    Trained,
    Predicted,
    Exported,
}

impl RunStage {
    pub fn next(self) -> Option<RunStage> {
        match self {
            RunStage::Idle => Some(RunStage::Generated),
            RunStage::Generated => Some(RunStage::FeatureBuilt),
            RunStage::FeatureBuilt => Some(RunStage::Trained),
            RunStage::Trained => Some(RunStage::Predicted),
            RunStage::Predicted => Some(RunStage::Exported),
            RunStage::Exported => None,
        }
    }

    /// Component that has to succeed to reach this stage.
    pub fn entered_by(self) -> Option<Stage> {
        match self {
            RunStage::Idle => None,
            RunStage::Generated => Some(Stage::Generation),
            RunStage::FeatureBuilt => Some(Stage::FeatureBuilding),
            RunStage::Trained => Some(Stage::Training),
            RunStage::Predicted => Some(Stage::Prediction),
            RunStage::Exported => Some(Stage::Export),
        }
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Failure {
    pub stage: Stage,
    pub kind: ErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    stage: RunStage,
    failure: Option<Failure>,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            stage: RunStage::Idle,
            failure: None,
        }
    }

    /// Last stage reached.
    pub fn stage(&self) -> RunStage {
        self.stage
    }

    pub fn failure(&self) -> Option<Failure> {
        self.failure
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.stage == RunStage::Exported
    }

    /// Move to `to`, which must be the immediate successor of the current
    /// stage. A failed run accepts no further transitions.
    pub fn advance(&mut self, to: RunStage) -> Result<(), StageError> {
        if self.failure.is_some() || self.stage.next() != Some(to) {
            return Err(StageError::Transition {
                from: self.stage,
                to,
            });
        }
        self.stage = to;
        Ok(())
    }

    pub fn fail(&mut self, error: &PipelineError) {
        self.failure = Some(Failure {
            stage: error.stage,
            kind: error.kind(),
        });
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub state: RunState,
    pub report: RunReport,
    pub predictions: BatchPrediction,
    pub export: ExportSummary,
    pub model_fingerprint: String,
}

/// One end-to-end batch run over a configuration and a sink.
pub struct Pipeline {
    config: PipelineConfig,
    sink: Arc<dyn BlobSink>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, sink: Arc<dyn BlobSink>) -> Self {
        Self { config, sink }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Execute every stage in order. On failure the error names the stage and
    /// the run stops; nothing after the failing stage executes.
    pub async fn run(&self, batch: &[UnlabeledRecord]) -> Result<RunOutcome, PipelineError> {
        let started_at = Utc::now();
        let stamp = started_at.format(STAMP_FORMAT).to_string();
        let run_id = format!("ml-pipeline-{stamp}");
        let mut state = RunState::new();

        match self.execute(&mut state, &run_id, &stamp, started_at, batch).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                state.fail(&err);
                error!(
                    run_id = %run_id,
                    reached = ?state.stage(),
                    failure = ?state.failure(),
                    error = %err.source,
                    "Run failed"
                );
                Err(err)
            }
        }
    }

    #[instrument(skip_all, fields(run_id = %run_id))]
    async fn execute(
        &self,
        state: &mut RunState,
        run_id: &str,
        stamp: &str,
        started_at: DateTime<Utc>,
        batch: &[UnlabeledRecord],
    ) -> Result<RunOutcome, PipelineError> {
        let clock = Instant::now();
        info!("Starting pipeline run");

        let records = self
            .training_records()
            .map_err(|e| PipelineError::new(Stage::Generation, e))?;
        advance(state, RunStage::Generated)?;
        info!(samples = records.len(), "Training data ready");

        let fitted = FeatureBuilder::new().fit_transform(&records);
        advance(state, RunStage::FeatureBuilt)?;
        info!(
            items = fitted.tables.items.len(),
            categories = fitted.tables.categories.len(),
            "Features built"
        );

        let training = &self.config.training;
        let trained = ForestTrainer::new(self.config.forest_params())
            .train(&fitted.rows(), &fitted.targets, training.test_fraction, training.seed)
            .map_err(|e| PipelineError::new(Stage::Training, e))?;
        advance(state, RunStage::Trained)?;

        let predictions = predictor::predict(&trained, &fitted.tables, batch);
        advance(state, RunStage::Predicted)?;
        info!(
            predicted = predictions.predicted_count(),
            skipped = predictions.skipped_count(),
            "Batch predicted"
        );
        for skipped in predictions.skipped() {
            warn!(
                index = skipped.index,
                item = %skipped.item_name,
                category = %skipped.category,
                reason = %skipped.reason,
                "Skipped record"
            );
        }

        let model_fingerprint = trained
            .model
            .fingerprint()
            .map_err(|e| PipelineError::new(Stage::Export, ExportError::from(e)))?;

        let report = RunReport::new(
            run_id,
            started_at,
            clock.elapsed(),
            records.len(),
            &trained.metrics,
            &predictions,
        );
        let skipped: Vec<_> = predictions.skipped().cloned().collect();
        let exporter = ResultExporter::new(self.sink.clone(), &self.config.export.local_dir)
            .with_timeout(self.config.export.sink_timeout());
        let export = exporter
            .export(&report, &records, &skipped, stamp)
            .await
            .map_err(|e| PipelineError::new(Stage::Export, e))?;
        advance(state, RunStage::Exported)?;

        info!(
            model = %model_fingerprint,
            runtime_s = clock.elapsed().as_secs_f64(),
            "Pipeline run complete"
        );

        Ok(RunOutcome {
            run_id: run_id.to_string(),
            state: state.clone(),
            report,
            predictions,
            export,
            model_fingerprint,
        })
    }

    fn training_records(&self) -> Result<Vec<Record>, StageError> {
        let generation = &self.config.generation;
        match &generation.input_csv {
            Some(path) => {
                info!(path = %path.display(), "Loading training data");
                Ok(load_records_csv(path)?)
            }
            None => {
                let records = SampleGenerator::new().generate(generation.samples, generation.seed)?;
                Ok(records)
            }
        }
    }
}

fn advance(state: &mut RunState, to: RunStage) -> Result<(), PipelineError> {
    state.advance(to).map_err(|e| {
        let stage = to.entered_by().unwrap_or(Stage::Generation);
        PipelineError::new(stage, e)
    })
}
