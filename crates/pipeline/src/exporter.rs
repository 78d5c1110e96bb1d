//! Result exporter
//!
//! Renders the structured results document and the tabular training data,
//! keeps local copies, then hands both to a [`BlobSink`]. Each sink write is
//! bounded by a timeout and retried once with identical bytes.

use calorie_ml_core::metrics::TrainingMetrics;
use calorie_ml_core::record::Record;
use calorie_ml_trainer::records_to_csv;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::errors::{ExportError, SinkError};
use crate::predictor::{BatchPrediction, PredictionResult, SkippedRecord};
use crate::sink::BlobSink;

/// Attempts per blob: the first write plus one retry.
pub const MAX_ATTEMPTS: u32 = 2;

/// Default per-attempt sink timeout.
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(180);

pub const RESULTS_PREFIX: &str = "processed-data";
pub const TRAINING_PREFIX: &str = "raw-data";

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Held-out metrics as published.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportMetrics {
    pub rmse: f64,
    pub r2: f64,
    pub train_samples: usize,
    pub test_samples: usize,
}

impl From<&TrainingMetrics> for ReportMetrics {
    fn from(m: &TrainingMetrics) -> Self {
        Self {
            rmse: round_to(m.rmse, 2),
            r2: round_to(m.r2, 4),
            train_samples: m.train_samples,
            test_samples: m.test_samples,
        }
    }
}

/// Structured results document for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub runtime_seconds: f64,
    pub training_samples: usize,
    pub metrics: ReportMetrics,
    pub predictions: Vec<PredictionResult>,
}

impl RunReport {
    pub fn new(
        run_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        runtime: Duration,
        training_samples: usize,
        metrics: &TrainingMetrics,
        batch: &BatchPrediction,
    ) -> Self {
        let predictions = batch
            .predictions()
            .map(|p| PredictionResult {
                predicted_target: round_to(p.predicted_target, 1),
                ..p.clone()
            })
            .collect();

        Self {
            run_id: run_id.into(),
            timestamp,
            runtime_seconds: round_to(runtime.as_secs_f64(), 2),
            training_samples,
            metrics: metrics.into(),
            predictions,
        }
    }
}

/// Blob and file names derived from a run stamp (`%Y%m%d-%H%M%S`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNames {
    pub results_blob: String,
    pub training_blob: String,
    pub results_file: String,
    pub training_file: String,
    pub summary_file: String,
}

impl ArtifactNames {
    pub fn for_stamp(stamp: &str) -> Self {
        let results_file = format!("ml_pipeline_results_{stamp}.json");
        let training_file = format!("training_data_{stamp}.csv");
        Self {
            results_blob: format!("{RESULTS_PREFIX}/{results_file}"),
            training_blob: format!("{TRAINING_PREFIX}/{training_file}"),
            results_file,
            training_file,
            summary_file: format!("ml_pipeline_summary_{stamp}.json"),
        }
    }
}

/// Delivery record for one artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub blob: String,
    pub local_path: PathBuf,
    pub bytes: usize,
    pub blake3: String,
    pub attempts: u32,
    pub uploaded: bool,
}

/// Local summary written next to the artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub run_id: String,
    pub sink: String,
    pub artifacts: Vec<ArtifactRecord>,
    pub skipped: Vec<SkippedRecord>,
    #[serde(skip)]
    pub summary_path: PathBuf,
}

impl ExportSummary {
    pub fn all_uploaded(&self) -> bool {
        self.artifacts.iter().all(|a| a.uploaded)
    }

    pub fn local_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.artifacts.iter().map(|a| a.local_path.clone()).collect();
        paths.push(self.summary_path.clone());
        paths
    }
}

pub struct ResultExporter {
    sink: Arc<dyn BlobSink>,
    local_dir: PathBuf,
    timeout: Duration,
}

impl ResultExporter {
    pub fn new(sink: Arc<dyn BlobSink>, local_dir: impl Into<PathBuf>) -> Self {
        Self {
            sink,
            local_dir: local_dir.into(),
            timeout: DEFAULT_SINK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    /// Export one run. Local copies exist before the first sink call and
    /// survive a failed upload.
    #[instrument(skip_all, fields(run_id = %report.run_id, sink = self.sink.kind()))]
    pub async fn export(
        &self,
        report: &RunReport,
        training: &[Record],
        skipped: &[SkippedRecord],
        stamp: &str,
    ) -> Result<ExportSummary, ExportError> {
        let names = ArtifactNames::for_stamp(stamp);
        let results = serde_json::to_vec_pretty(report)?;
        let csv = records_to_csv(training)?;

        tokio::fs::create_dir_all(&self.local_dir)
            .await
            .map_err(|source| ExportError::Local {
                path: self.local_dir.clone(),
                source,
            })?;

        let mut artifacts = Vec::with_capacity(2);
        for (blob, file, bytes) in [
            (&names.results_blob, &names.results_file, &results),
            (&names.training_blob, &names.training_file, &csv),
        ] {
            let local_path = self.write_local(file, bytes).await?;
            artifacts.push(ArtifactRecord {
                blob: blob.clone(),
                local_path,
                bytes: bytes.len(),
                blake3: hex::encode(blake3::hash(bytes).as_bytes()),
                attempts: 0,
                uploaded: false,
            });
        }

        let mut summary = ExportSummary {
            run_id: report.run_id.clone(),
            sink: self.sink.kind().to_string(),
            artifacts,
            skipped: skipped.to_vec(),
            summary_path: self.local_dir.join(&names.summary_file),
        };

        let payloads = [&results, &csv];
        let mut failure = None;
        for (artifact, bytes) in summary.artifacts.iter_mut().zip(payloads) {
            match self.put_with_retry(&artifact.blob, bytes).await {
                Ok(attempts) => {
                    artifact.attempts = attempts;
                    artifact.uploaded = true;
                }
                Err(source) => {
                    artifact.attempts = MAX_ATTEMPTS;
                    failure = Some((artifact.blob.clone(), source));
                    break;
                }
            }
        }

        let summary_json = serde_json::to_vec_pretty(&summary)?;
        if let Some((blob, source)) = failure {
            let mut local_copies: Vec<PathBuf> =
                summary.artifacts.iter().map(|a| a.local_path.clone()).collect();
            match self.write_local(&names.summary_file, &summary_json).await {
                Ok(path) => local_copies.push(path),
                Err(e) => warn!(error = %e, "Could not write export summary"),
            }
            return Err(ExportError::Sink {
                blob,
                attempts: MAX_ATTEMPTS,
                source,
                local_copies,
            });
        }

        self.write_local(&names.summary_file, &summary_json).await?;
        info!(
            results = %names.results_blob,
            training = %names.training_blob,
            "Export complete"
        );
        Ok(summary)
    }

    async fn write_local(&self, file: &str, bytes: &[u8]) -> Result<PathBuf, ExportError> {
        let path = self.local_dir.join(file);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| ExportError::Local {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    /// Returns the number of attempts used on success.
    async fn put_with_retry(&self, name: &str, bytes: &[u8]) -> Result<u32, SinkError> {
        let mut attempt = 1;
        loop {
            let result = match timeout(self.timeout, self.sink.put(name, bytes)).await {
                Ok(result) => result,
                Err(_) => Err(SinkError::Timeout {
                    name: name.to_string(),
                    after: self.timeout,
                }),
            };

            match result {
                Ok(()) => return Ok(attempt),
                Err(e) if attempt < MAX_ATTEMPTS => {
                    warn!(blob = name, attempt, error = %e, "Sink write failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
