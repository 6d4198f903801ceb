//! Spatial ECOSSE post-processor.
//!
//! Aggregates the per-soil simulation results of a spatial study into
//! per-metric result files, and converts those into NetCDF rasters.

mod commands;
mod settings;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use commands::Stage;
use settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "post-processor")]
#[command(about = "Aggregate Spatial ECOSSE results into CSV and NetCDF")]
struct Cli {
    /// Settings file path
    #[arg(long, global = true, env = "POST_PROCESSOR_SETTINGS")]
    settings: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format (json, pretty)
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite simulation directories into per-metric result files
    AggregateToCsv(StageArgs),
    /// Convert result files into one raw NetCDF file
    CsvToRawNc(StageArgs),
    /// Convert result files into one COARDS NetCDF file per metric
    CsvToCoardsNc(StageArgs),
    /// Derive CO2 equivalent from result files into a COARDS NetCDF file
    CsvToCo2eNc(StageArgs),
    /// Cut result files down to a window of years, into cut_outdir
    CutCsv(CutArgs),
}

impl Command {
    fn split(self) -> (Stage, StageArgs) {
        match self {
            Command::AggregateToCsv(args) => (Stage::AggregateToCsv, args),
            Command::CsvToRawNc(args) => (Stage::CsvToRawNc, args),
            Command::CsvToCoardsNc(args) => (Stage::CsvToCoardsNc, args),
            Command::CsvToCo2eNc(args) => (Stage::CsvToCo2eNc, args),
            Command::CutCsv(cut) => (
                Stage::CutCsv {
                    first_year: cut.from_year,
                    last_year: cut.to_year,
                },
                cut.stage,
            ),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct StageArgs {
    /// Study definition JSON file
    #[arg(long)]
    pub study_definition: PathBuf,

    /// Directory holding one directory per simulated soil
    #[arg(long)]
    pub sims_dir: Option<String>,

    /// Directory of the per-metric result files and rasters
    #[arg(long)]
    pub results_dir: Option<String>,

    /// Climate scenario written to output, default from the study definition
    #[arg(long)]
    pub scenario: Option<String>,

    /// Land use, default from the study definition
    #[arg(long)]
    pub land_use: Option<String>,

    /// Optional metrics to include, e.g. `no3,npp`
    #[arg(long)]
    pub include: Option<String>,

    /// Failures tolerated before the run is aborted
    #[arg(long)]
    pub max_failures: Option<usize>,

    /// Replace existing output files
    #[arg(long)]
    pub overwrite: bool,

    /// Write one row per granular longitude of a cell, splitting its area
    #[arg(long)]
    pub expand_granular: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CutArgs {
    #[command(flatten)]
    pub stage: StageArgs,

    /// First year kept
    #[arg(long)]
    pub from_year: i32,

    /// Last year kept, default the study's last year
    #[arg(long)]
    pub to_year: Option<i32>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => settings::load_settings(path)?,
        None => Settings::default(),
    };

    let level = cli.log_level.as_deref().unwrap_or(&settings.logging.level);
    let format = cli.log_format.as_deref().unwrap_or(&settings.logging.format);
    settings::validate_logging(level, format)?;
    init_tracing(level, format);

    let (stage, args) = cli.command.split();
    info!(stage = stage.name(), "Starting post-processor");

    let config = commands::build_run_config(stage, &args, &settings)
        .context("Invalid run configuration")?;
    commands::run_stage(stage, &config)
        .with_context(|| format!("{} failed", stage.name()))?;

    Ok(())
}

/// Initialize tracing; `RUST_LOG` overrides the configured level.
fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    match format {
        "pretty" => builder.pretty().init(),
        _ => builder.json().init(),
    }
}
