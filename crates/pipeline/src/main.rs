//! Calorie pipeline CLI
//!
//! `run` executes one batch end to end. `generate` only writes a synthetic
//! training CSV.

use anyhow::{Context, Result};
use calorie_ml_core::generator::SampleGenerator;
use calorie_ml_trainer::write_records_csv;
use calorie_pipeline::{prediction_batch, Pipeline, PipelineConfig, SinkConfig};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "calorie-pipeline")]
#[command(author = "Calorie Pipeline Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Batch calorie estimation pipeline", long_about = None)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate, train, predict and export one batch
    Run(RunArgs),
    /// Write a synthetic training CSV
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of synthetic samples
    #[arg(long)]
    samples: Option<usize>,

    /// Seed for generation, split and bootstrap
    #[arg(long)]
    seed: Option<u64>,

    /// Held-out fraction for evaluation
    #[arg(long)]
    test_fraction: Option<f64>,

    /// JSON file with records to score
    #[arg(long)]
    predict: Option<PathBuf>,

    /// Directory for local result copies
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Store blobs under this directory
    #[arg(long)]
    sink_root: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[arg(long, default_value = "500")]
    samples: usize,

    #[arg(long, default_value = "42")]
    seed: u64,

    /// Output CSV path
    #[arg(short, long)]
    out: PathBuf,
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {e}"))
}

fn load_config(args: &RunArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("Invalid environment override")?;

    if let Some(samples) = args.samples {
        config.generation.samples = samples;
    }
    if let Some(seed) = args.seed {
        config.generation.seed = seed;
        config.training.seed = seed;
    }
    if let Some(fraction) = args.test_fraction {
        config.training.test_fraction = fraction;
    }
    if let Some(path) = &args.predict {
        config.prediction.input_file = Some(path.clone());
    }
    if let Some(dir) = &args.output_dir {
        config.export.local_dir = dir.clone();
    }
    if let Some(root) = &args.sink_root {
        config.export.sink = SinkConfig::Fs { root: root.clone() };
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn run(args: RunArgs) -> Result<bool> {
    let config = load_config(&args)?;
    let batch = prediction_batch(&config).context("Failed to load prediction inputs")?;
    let sink = config.build_sink().context("Failed to build sink")?;

    info!("Calorie Pipeline v{}", env!("CARGO_PKG_VERSION"));
    info!("  Samples: {}", config.generation.samples);
    info!("  Seed: {}", config.generation.seed);
    info!("  Test fraction: {}", config.training.test_fraction);
    info!("  Trees: {}", config.training.n_estimators);
    info!("  Sink: {}", sink.kind());

    let pipeline = Pipeline::new(config, sink);
    match pipeline.run(&batch).await {
        Ok(outcome) => {
            let metrics = &outcome.report.metrics;
            info!("Run {} complete", outcome.run_id);
            info!("  RMSE: {:.2}", metrics.rmse);
            info!("  R²: {:.4}", metrics.r2);
            for p in &outcome.report.predictions {
                info!("  {} ({}g): {:.1}", p.item_name, p.quantity, p.predicted_target);
            }
            if outcome.predictions.skipped_count() > 0 {
                info!("  Skipped: {}", outcome.predictions.skipped_count());
            }
            info!("  Summary: {}", outcome.export.summary_path.display());
            Ok(true)
        }
        Err(err) => {
            error!(stage = %err.stage, kind = %err.kind(), "{err}");
            Ok(false)
        }
    }
}

fn generate(args: GenerateArgs) -> Result<()> {
    let records = SampleGenerator::new()
        .generate(args.samples, args.seed)
        .context("Sample generation failed")?;

    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    let file = std::fs::File::create(&args.out)
        .with_context(|| format!("Failed to create {}", args.out.display()))?;
    write_records_csv(&records, file).context("Failed to write training CSV")?;

    info!("Wrote {} samples to {}", records.len(), args.out.display());
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let ok = match cli.command {
        Command::Run(args) => run(args).await?,
        Command::Generate(args) => {
            generate(args)?;
            true
        }
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
