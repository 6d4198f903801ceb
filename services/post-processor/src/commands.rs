//! Stage selection and run configuration from flags and settings.

use std::fs;
use std::path::PathBuf;

use aggregation::{
    AggregationPipeline, CutPipeline, RasterKind, RasterPipeline, RunConfig, StudyDefinition,
    YearWindow,
};
use anyhow::{Context, Result};
use ecosse_common::{LandUse, MetricSet};
use tracing::info;

use crate::settings::{expand_path, Settings};
use crate::StageArgs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AggregateToCsv,
    CsvToRawNc,
    CsvToCoardsNc,
    CsvToCo2eNc,
    CutCsv {
        first_year: i32,
        last_year: Option<i32>,
    },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::AggregateToCsv => "aggregate-to-csv",
            Stage::CsvToRawNc => "csv-to-raw-nc",
            Stage::CsvToCoardsNc => "csv-to-coards-nc",
            Stage::CsvToCo2eNc => "csv-to-co2e-nc",
            Stage::CutCsv { .. } => "cut-csv",
        }
    }

    fn raster_kind(&self) -> Option<RasterKind> {
        match self {
            Stage::AggregateToCsv | Stage::CutCsv { .. } => None,
            Stage::CsvToRawNc => Some(RasterKind::Raw),
            Stage::CsvToCoardsNc => Some(RasterKind::Coards),
            Stage::CsvToCo2eNc => Some(RasterKind::Co2e),
        }
    }
}

/// Combine the study definition, flags and settings into a run config.
///
/// Flags win over settings. Only aggregation reads the simulations
/// directory; the raster stages read the results directory.
pub fn build_run_config(stage: Stage, args: &StageArgs, settings: &Settings) -> Result<RunConfig> {
    let study = StudyDefinition::load(&args.study_definition)?;

    let results_dir = resolve_dir(args.results_dir.as_deref(), settings.results_dir.as_deref())
        .context("No results directory, pass --results-dir or set results_dir")?;
    let sims_dir = match resolve_dir(args.sims_dir.as_deref(), settings.sims_dir.as_deref()) {
        Some(dir) => dir,
        None if stage == Stage::AggregateToCsv => {
            anyhow::bail!("No simulations directory, pass --sims-dir or set sims_dir")
        }
        None => results_dir.clone(),
    };

    if stage == Stage::AggregateToCsv {
        anyhow::ensure!(
            sims_dir.is_dir(),
            "Simulations directory {:?} does not exist",
            sims_dir
        );
        fs::create_dir_all(&results_dir)
            .with_context(|| format!("Failed to create results directory {:?}", results_dir))?;
    } else {
        anyhow::ensure!(
            results_dir.is_dir(),
            "Results directory {:?} does not exist",
            results_dir
        );
    }

    let metrics = match &args.include {
        Some(list) => MetricSet::parse_extras(list)
            .with_context(|| format!("Invalid --include list '{}'", list))?,
        None => settings.metrics()?,
    };

    let mut config = RunConfig::new(study, sims_dir, results_dir)
        .with_metrics(metrics)
        .with_max_failures(args.max_failures.unwrap_or(settings.max_failures))
        .with_overwrite(args.overwrite || settings.overwrite)
        .with_progress_interval(settings.progress_interval())
        .with_expand_granular(args.expand_granular);

    if let Some(scenario) = &args.scenario {
        config = config.with_scenario(scenario.as_str());
    }
    if let Some(land_use) = &args.land_use {
        let land_use: LandUse = land_use
            .parse()
            .with_context(|| format!("Invalid --land-use '{}'", land_use))?;
        config = config.with_land_use(land_use);
    }

    info!(
        study = %config.study_name(),
        sims_dir = %config.sims_dir.display(),
        results_dir = %config.results_dir.display(),
        land_use = %config.land_use,
        scenario = %config.climate_scenario,
        metrics = config.metrics.len(),
        max_failures = config.max_failures,
        "Run configuration"
    );
    Ok(config)
}

fn resolve_dir(flag: Option<&str>, setting: Option<&str>) -> Option<PathBuf> {
    flag.or(setting).map(expand_path)
}

pub fn run_stage(stage: Stage, config: &RunConfig) -> Result<()> {
    if let Stage::CutCsv {
        first_year,
        last_year,
    } = stage
    {
        let window = YearWindow::new(first_year, last_year.unwrap_or(config.study.fut_end_year))?;
        let run = CutPipeline::new(config)?.run(window)?;
        for path in &run.paths {
            println!("{}", path.display());
        }
        println!("{}", run.summary);
        return Ok(());
    }

    match stage.raster_kind() {
        None => {
            let summary = AggregationPipeline::new(config).run()?;
            println!("{}", summary);
        }
        Some(kind) => {
            netcdf_writer::silence_hdf5_errors();
            let run = RasterPipeline::new(config)?.run_netcdf(kind)?;
            for output in &run.outputs {
                println!("{}", output.path.display());
            }
            println!("{}", run.summary);
        }
    }
    Ok(())
}
