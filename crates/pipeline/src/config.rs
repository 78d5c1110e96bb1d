//! Pipeline configuration
//!
//! Loaded from TOML, then overridden by `CALORIE_*` environment variables,
//! then by CLI flags in the binary.

use calorie_ml_core::generator::MAX_SAMPLES;
use calorie_ml_trainer::ForestParams;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::errors::{ConfigError, SinkError};
use crate::exporter::DEFAULT_SINK_TIMEOUT;
use crate::sink::{BlobSink, FsSink, HttpSink, MemorySink};

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "CALORIE_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub generation: GenerationConfig,
    pub training: TrainingConfig,
    pub prediction: PredictionConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub samples: usize,
    pub seed: u64,
    /// Train on this CSV instead of generating samples
    pub input_csv: Option<PathBuf>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            samples: 500,
            seed: 42,
            input_csv: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub test_fraction: f64,
    pub seed: u64,
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub bootstrap: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let params = ForestParams::default();
        Self {
            test_fraction: 0.2,
            seed: 42,
            n_estimators: params.n_estimators,
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            bootstrap: params.bootstrap,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// JSON array of records to score; the demo batch is used when unset
    pub input_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkConfig {
    Fs { root: PathBuf },
    Http { endpoint: String },
    Memory,
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig::Fs {
            root: PathBuf::from("data-lake"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub local_dir: PathBuf,
    pub sink: SinkConfig,
    pub sink_timeout_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            local_dir: PathBuf::from("results"),
            sink: SinkConfig::default(),
            sink_timeout_secs: DEFAULT_SINK_TIMEOUT.as_secs(),
        }
    }
}

impl ExportConfig {
    pub fn sink_timeout(&self) -> Duration {
        Duration::from_secs(self.sink_timeout_secs)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{ENV_PREFIX}{key}: cannot parse '{value}'")))
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply overrides from `CALORIE_*` variables in the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|key| env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Apply overrides from a lookup keyed without the prefix.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SAMPLES") {
            self.generation.samples = parse_var("SAMPLES", &v)?;
        }
        if let Some(v) = lookup("SEED") {
            let seed = parse_var("SEED", &v)?;
            self.generation.seed = seed;
            self.training.seed = seed;
        }
        if let Some(v) = lookup("TEST_FRACTION") {
            self.training.test_fraction = parse_var("TEST_FRACTION", &v)?;
        }
        if let Some(v) = lookup("TRAINING_CSV") {
            self.generation.input_csv = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("PREDICT_FILE") {
            self.prediction.input_file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("LOCAL_DIR") {
            self.export.local_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SINK_TIMEOUT_SECS") {
            self.export.sink_timeout_secs = parse_var("SINK_TIMEOUT_SECS", &v)?;
        }
        // Endpoint wins when both are set
        if let Some(v) = lookup("SINK_ROOT") {
            self.export.sink = SinkConfig::Fs {
                root: PathBuf::from(v),
            };
        }
        if let Some(v) = lookup("SINK_ENDPOINT") {
            self.export.sink = SinkConfig::Http { endpoint: v };
        }
        debug!(config = ?self, "Applied overrides");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.generation;
        if g.input_csv.is_none() && (g.samples == 0 || g.samples > MAX_SAMPLES) {
            return Err(ConfigError::Invalid(format!(
                "generation.samples must be in 1..={MAX_SAMPLES}, got {}",
                g.samples
            )));
        }

        let t = &self.training;
        if !(t.test_fraction > 0.0 && t.test_fraction < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "training.test_fraction must be in (0, 1), got {}",
                t.test_fraction
            )));
        }
        self.forest_params()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.export.sink_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "export.sink_timeout_secs must be > 0".into(),
            ));
        }
        if let SinkConfig::Http { endpoint } = &self.export.sink {
            url::Url::parse(endpoint)
                .map_err(|e| ConfigError::Invalid(format!("export.sink.endpoint: {e}")))?;
        }
        Ok(())
    }

    pub fn forest_params(&self) -> ForestParams {
        let t = &self.training;
        ForestParams {
            n_estimators: t.n_estimators,
            max_depth: t.max_depth,
            min_samples_split: t.min_samples_split,
            min_samples_leaf: t.min_samples_leaf,
            bootstrap: t.bootstrap,
        }
    }

    pub fn build_sink(&self) -> Result<Arc<dyn BlobSink>, SinkError> {
        let sink: Arc<dyn BlobSink> = match &self.export.sink {
            SinkConfig::Fs { root } => Arc::new(FsSink::new(root)),
            SinkConfig::Http { endpoint } => Arc::new(HttpSink::new(endpoint)?),
            SinkConfig::Memory => Arc::new(MemorySink::new()),
        };
        Ok(sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.generation.samples, 500);
        assert_eq!(config.generation.seed, 42);
        assert_eq!(config.training.test_fraction, 0.2);
        assert_eq!(config.training.n_estimators, 100);
        assert_eq!(config.export.sink_timeout(), Duration::from_secs(180));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [generation]
            samples = 200

            [export]
            local_dir = "out"
            sink = { type = "http", endpoint = "http://minio:9000/lake" }
            "#,
        )
        .unwrap();

        assert_eq!(config.generation.samples, 200);
        assert_eq!(config.generation.seed, 42);
        assert_eq!(config.export.local_dir, PathBuf::from("out"));
        assert_eq!(
            config.export.sink,
            SinkConfig::Http {
                endpoint: "http://minio:9000/lake".into()
            }
        );
        assert_eq!(config.export.sink_timeout_secs, 180);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("SAMPLES", "1000"),
            ("SEED", "7"),
            ("TEST_FRACTION", "0.25"),
            ("SINK_ROOT", "/tmp/lake"),
        ]
        .into_iter()
        .collect();

        let mut config = PipelineConfig::default();
        config
            .apply_overrides_from(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.generation.samples, 1000);
        assert_eq!(config.generation.seed, 7);
        assert_eq!(config.training.seed, 7);
        assert_eq!(config.training.test_fraction, 0.25);
        assert_eq!(
            config.export.sink,
            SinkConfig::Fs {
                root: PathBuf::from("/tmp/lake")
            }
        );
    }

    #[test]
    fn test_bad_override_is_reported() {
        let mut config = PipelineConfig::default();
        let err = config
            .apply_overrides_from(|k| (k == "SAMPLES").then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("CALORIE_SAMPLES"));
    }

    #[test]
    fn test_validation() {
        let mut config = PipelineConfig::default();
        config.training.test_fraction = 1.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.generation.samples = 0;
        assert!(config.validate().is_err());
        config.generation.input_csv = Some(PathBuf::from("train.csv"));
        assert!(config.validate().is_ok());

        let mut config = PipelineConfig::default();
        config.training.n_estimators = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.export.sink = SinkConfig::Http {
            endpoint: "nope".into(),
        };
        assert!(config.validate().is_err());
    }
}
