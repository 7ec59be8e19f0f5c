//! CLI command definitions for sweep_forge.
//!
//! Two commands wrap the sweep pipeline: `sweep` fits a whole grid, `train`
//! fits a single configuration. Settings come from `SWEEP_*` environment
//! variables first and command-line flags second.

use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use tracing::info;

use crate::error::FailureReport;
use crate::metrics::{export_metrics, init_metrics};
use crate::model::ModelSummary;
use crate::pipeline::{resolve_grid, SweepConfig, SweepError, SweepPipeline, SweepRun};
use crate::sweep::{grid_product, parse_axis, HyperparameterConfig};

/// `max_iter` used by `train` unless overridden.
const DEFAULT_TRAIN_MAX_ITER: u64 = 1000;

/// Parallel hyperparameter sweeps for tabular classifiers.
#[derive(Parser)]
#[command(name = "sweep-forge")]
#[command(about = "Fit a logistic regression per hyperparameter configuration, in parallel")]
#[command(version)]
#[command(
    long_about = "sweep-forge loads a labeled table, binarizes its label column and fits one logistic regression per grid entry with bounded concurrency.\n\nExample usage:\n  sweep-forge sweep --grid '[{\"C\": 0.1}, {\"C\": 0.01}, {\"C\": 0.001}]' --concurrency 5\n  sweep-forge sweep --axis C=0.1,0.01,0.001 --param max_iter=1000\n  sweep-forge train --param C=0.5"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Fit one model per grid entry.
    Sweep(SweepArgs),

    /// Fit a single model.
    Train(TrainArgs),
}

/// Data source flags shared by both commands.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct DataArgs {
    /// CSV file with a header row. Synthetic wine data is used when omitted.
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Label column name.
    #[arg(long)]
    pub label_column: Option<String>,

    /// Seed for synthetic data.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Row count for synthetic data.
    #[arg(long)]
    pub rows: Option<usize>,

    /// Require the loaded data to match a built-in schema (e.g. `wine`).
    #[arg(long)]
    pub schema: Option<String>,
}

/// Arguments for `sweep-forge sweep`.
#[derive(Parser, Debug)]
pub struct SweepArgs {
    /// Grid as inline JSON/YAML, or a path to a .json/.yaml file.
    #[arg(short, long, required_unless_present = "axis")]
    pub grid: Option<String>,

    /// Grid axis as name=v1,v2,... (repeatable; the grid is their product).
    #[arg(short, long, conflicts_with = "grid")]
    pub axis: Vec<String>,

    /// Parameter applied to every entry that does not set it (name=value).
    #[arg(short, long)]
    pub param: Vec<String>,

    /// Maximum number of fits in flight.
    #[arg(short = 'k', long, allow_negative_numbers = true)]
    pub concurrency: Option<i64>,

    #[command(flatten)]
    pub data: DataArgs,

    /// Retries for a transiently failing fit.
    #[arg(long)]
    pub retries: Option<u32>,

    /// Disable the model cache.
    #[arg(long)]
    pub no_cache: bool,

    /// Cache version; bump to invalidate earlier entries.
    #[arg(long)]
    pub cache_version: Option<String>,

    /// Print Prometheus metrics after the run.
    #[arg(long)]
    pub metrics: bool,

    /// Output results in JSON format.
    #[arg(short, long)]
    pub json: bool,
}

/// Arguments for `sweep-forge train`.
#[derive(Parser, Debug)]
pub struct TrainArgs {
    /// Hyperparameter as name=value (repeatable).
    #[arg(short, long)]
    pub param: Vec<String>,

    #[command(flatten)]
    pub data: DataArgs,

    /// Output results in JSON format.
    #[arg(short, long)]
    pub json: bool,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
///
/// For more control over logging initialization, use `parse_cli()` and
/// `run_with_cli()`.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Sweep(args) => run_sweep_command(args).await,
        Commands::Train(args) => run_train_command(args).await,
    }
}

// ============================================================================
// Output
// ============================================================================

#[derive(Debug, Serialize)]
struct StatsOutput {
    completed: u64,
    failed: u64,
    peak_in_flight: usize,
    average_fit_ms: f64,
}

#[derive(Debug, Serialize)]
struct SweepOutput {
    status: &'static str,
    grid_size: usize,
    concurrency: i64,
    dataset_fingerprint: String,
    elapsed_ms: u64,
    stats: StatsOutput,
    models: Vec<ModelSummary>,
}

#[derive(Debug, Serialize)]
struct FailureOutput<'a> {
    status: &'static str,
    report: &'a FailureReport,
}

impl SweepOutput {
    fn from_run(run: &SweepRun, concurrency: i64) -> Self {
        Self {
            status: "success",
            grid_size: run.models.len(),
            concurrency,
            dataset_fingerprint: run.dataset_fingerprint.to_string(),
            elapsed_ms: run.elapsed.as_millis() as u64,
            stats: StatsOutput {
                completed: run.stats.completed,
                failed: run.stats.failed,
                peak_in_flight: run.stats.peak_in_flight,
                average_fit_ms: run.stats.average_fit_duration.as_secs_f64() * 1000.0,
            },
            models: run.models.iter().map(|m| m.summary()).collect(),
        }
    }
}

fn print_table(output: &SweepOutput) {
    println!(
        "{:>5}  {:<40}  {:>9}  {:>6}  {:>8}  {:>10}",
        "index", "hyperparameters", "converged", "n_iter", "accuracy", "intercept"
    );
    for (i, model) in output.models.iter().enumerate() {
        println!(
            "{:>5}  {:<40}  {:>9}  {:>6}  {:>8.4}  {:>10.4}",
            i,
            model.hyperparameters.to_string(),
            model.converged,
            model.n_iter,
            model.training_accuracy,
            model.intercept
        );
    }
    println!();
    println!(
        "{} models in {} ms (peak {} in flight, concurrency {})",
        output.grid_size, output.elapsed_ms, output.stats.peak_in_flight, output.concurrency
    );
    println!("Dataset fingerprint: {}", output.dataset_fingerprint);
}

// ============================================================================
// Command Implementation
// ============================================================================

/// Applies command-line overrides on top of environment configuration.
fn build_config(data: &DataArgs) -> anyhow::Result<SweepConfig> {
    let mut config = SweepConfig::from_env()?;
    if let Some(path) = &data.data {
        config = config.with_data_path(path.clone());
    }
    if let Some(column) = &data.label_column {
        config = config.with_label_column(column.clone());
    }
    if let Some(seed) = data.seed {
        config = config.with_seed(seed);
    }
    if let Some(rows) = data.rows {
        config = config.with_synthetic_rows(rows);
    }
    if let Some(schema) = &data.schema {
        config = config.with_schema(schema.clone());
    }
    Ok(config)
}

/// Parses repeated `name=value` flags into a configuration.
fn parse_params(params: &[String]) -> anyhow::Result<HyperparameterConfig> {
    let mut config = HyperparameterConfig::new();
    for param in params {
        config
            .set_assignment(param)
            .map_err(|e| anyhow::anyhow!("Invalid --param: {}", e))?;
    }
    Ok(config)
}

/// Builds the grid from `--grid` or `--axis`, then fills in `--param`
/// defaults.
async fn build_grid(args: &SweepArgs) -> anyhow::Result<Vec<HyperparameterConfig>> {
    let fixed = parse_params(&args.param)?;

    let grid = match &args.grid {
        Some(source) => resolve_grid(source).await?,
        None => {
            let axes = args
                .axis
                .iter()
                .map(|axis| {
                    parse_axis(axis).map_err(|e| anyhow::anyhow!("Invalid --axis: {}", e))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            grid_product(&axes, &HyperparameterConfig::new())
        }
    };

    Ok(grid
        .into_iter()
        .map(|mut entry| {
            for (name, value) in fixed.iter() {
                if entry.get(name).is_none() {
                    entry.insert(name.clone(), value.clone());
                }
            }
            entry
        })
        .collect())
}

async fn run_sweep_command(args: SweepArgs) -> anyhow::Result<()> {
    let mut config = build_config(&args.data)?;
    if let Some(retries) = args.retries {
        config = config.with_retries(retries);
    }
    if args.no_cache {
        config = config.with_cache(false);
    }
    if let Some(version) = &args.cache_version {
        config = config.with_cache_version(version.clone());
    }
    config.validate()?;

    if args.metrics {
        init_metrics()?;
    }

    let grid = build_grid(&args).await?;
    let concurrency = args.concurrency.unwrap_or(config.concurrency as i64);
    info!(grid_size = grid.len(), concurrency = concurrency, "Parsed sweep request");

    let pipeline = SweepPipeline::from_config(&config);
    let result = pipeline.run_detailed(&grid, concurrency).await;
    let outcome = print_outcome(result, concurrency, args.json);

    if args.metrics {
        print!("{}", export_metrics());
    }
    outcome
}

async fn run_train_command(args: TrainArgs) -> anyhow::Result<()> {
    let config = build_config(&args.data)?.with_retries(0).with_cache(false);
    config.validate()?;

    let mut hyperparameters = parse_params(&args.param)?;
    if hyperparameters.get("max_iter").is_none() {
        hyperparameters.insert("max_iter", DEFAULT_TRAIN_MAX_ITER);
    }

    let pipeline = SweepPipeline::from_config(&config);
    let result = pipeline.run_detailed(&[hyperparameters], 1).await;

    if args.json {
        return print_outcome(result, 1, true);
    }

    let run = result?;
    for model in &run.models {
        let summary = model.summary();
        println!("Model {}", summary.id);
        println!("  hyperparameters:   {}", summary.hyperparameters);
        println!("  classes:           {:?}", summary.classes);
        println!("  converged:         {} ({} iterations)", summary.converged, summary.n_iter);
        println!("  training accuracy: {:.4}", summary.training_accuracy);
        println!("  intercept:         {:.6}", summary.intercept);
        for (name, weight) in &summary.coefficients {
            println!("  {:<30} {:>12.6}", name, weight);
        }
    }
    Ok(())
}

/// Prints a run outcome and converts failures into an error exit.
fn print_outcome(
    result: Result<SweepRun, SweepError>,
    concurrency: i64,
    json: bool,
) -> anyhow::Result<()> {
    match result {
        Ok(run) => {
            let output = SweepOutput::from_run(&run, concurrency);
            if json {
                let json_output = serde_json::to_string_pretty(&output)
                    .map_err(|e| anyhow::anyhow!("Failed to serialize JSON output: {}", e))?;
                println!("{}", json_output);
            } else {
                print_table(&output);
            }
            Ok(())
        }
        Err(SweepError::FitFailures(report)) => {
            if json {
                let json_output = serde_json::to_string_pretty(&FailureOutput {
                    status: "failed",
                    report: &report,
                })
                .map_err(|e| anyhow::anyhow!("Failed to serialize JSON output: {}", e))?;
                println!("{}", json_output);
            } else {
                for failure in &report.failures {
                    println!(
                        "[{}] {} -> {}",
                        failure.index, failure.hyperparameters, failure.error
                    );
                }
            }
            Err(SweepError::FitFailures(report).into())
        }
        Err(e) => Err(e.into()),
    }
}
