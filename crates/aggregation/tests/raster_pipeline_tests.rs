//! Result files to rasters, written into memory sinks.

use std::path::Path;

use aggregation::transform::{CH4_PER_C, GWP_CH4, GWP_N2O, N2O_PER_N};
use aggregation::{
    AggregationError, PipelineState, RasterKind, RasterPipeline, RunConfig, StudyDefinition,
};
use netcdf_writer::MemorySink;
use tempfile::TempDir;
use test_utils::fixtures::bbox;
use test_utils::{
    assert_approx_eq, assert_series_approx_eq, constant_series, ramp_series,
    study_definition_json, write_result_file, ResultRow,
};

/// Wales at 0.5 degrees: the cell at (52.0, -3.5) is (2, 3).
const CELL: (usize, usize) = (2, 3);

fn config(results: &Path) -> RunConfig {
    let json = study_definition_json("wales", bbox::WALES, 0.5, "ara", (2079, 2080));
    let study = StudyDefinition::from_json_str(&json).unwrap();
    RunConfig::new(study, results, results)
}

fn write_metric(results: &Path, metric: &str, rows: &[ResultRow]) {
    write_result_file(&results.join(format!("wales_{}.txt", metric)), rows);
}

fn memory_sink(_: &Path) -> netcdf_writer::WriterResult<MemorySink> {
    Ok(MemorySink::new())
}

#[test]
fn test_raw_layout() {
    let results = TempDir::new().unwrap();
    let soc = ramp_series(24, 100.0, 1.0);
    write_metric(
        results.path(),
        "soc",
        &[ResultRow::new(52.0, -3.5, soc.clone()), ResultRow::new(60.0, -3.5, soc.clone())],
    );
    for metric in ["co2", "ch4", "n2o"] {
        write_metric(
            results.path(),
            metric,
            &[
                ResultRow::new(52.0, -3.5, constant_series(24, 2.0)),
                ResultRow::new(60.0, -3.5, constant_series(24, 2.0)),
            ],
        );
    }

    let config = config(results.path());
    let mut pipeline = RasterPipeline::new(&config).unwrap();
    let run = pipeline.run(RasterKind::Raw, memory_sink).unwrap();

    assert_eq!(pipeline.state(), PipelineState::Done);
    assert_eq!(run.summary.completed, 1);
    // The second line lies north of the grid
    assert_eq!(run.summary.skipped, 1);

    assert_eq!(run.outputs.len(), 1);
    let output = &run.outputs[0];
    assert!(output.path.ends_with("wales.nc"));

    let sink = &output.sink;
    let (i, j) = CELL;
    assert_eq!(sink.surface("area", i, j), Some(25.0));
    assert_eq!(sink.surface("mu_global", i, j), Some(10090.0));

    let stored = sink.series("soc", i, j).unwrap();
    assert_eq!(stored.len(), 26);
    assert_eq!(&stored[..24], &soc[..]);

    assert_series_approx_eq!(sink.series("soc_yrs", i, j).unwrap(), [105.5, 117.5]);
    assert_series_approx_eq!(sink.series("co2_yrs", i, j).unwrap(), [24.0, 24.0]);
    assert_approx_eq!(sink.surface("soc_diff", i, j).unwrap(), 23.0);

    assert!(!sink.has_variable("npp"));
    assert_eq!(sink.populated_cells("soc"), 1);
    assert_eq!(
        sink.attribute("future_climate_scenario"),
        Some("UKCP18_RCP85")
    );
    assert!(sink
        .attribute("attributation")
        .is_some_and(|a| a.starts_with("Created at")));
}

#[test]
fn test_raw_layout_halves_npp() {
    let results = TempDir::new().unwrap();
    write_metric(results.path(), "soc", &[ResultRow::new(52.0, -3.5, constant_series(24, 50.0))]);
    write_metric(results.path(), "npp", &[ResultRow::new(52.0, -3.5, constant_series(24, 8.0))]);

    let config = config(results.path())
        .with_metrics(ecosse_common::MetricSet::parse_extras("npp").unwrap());
    let run = RasterPipeline::new(&config)
        .unwrap()
        .run(RasterKind::Raw, memory_sink)
        .unwrap();

    let sink = &run.outputs[0].sink;
    let (i, j) = CELL;
    assert_eq!(sink.series("npp", i, j).unwrap()[0], 4.0);
    assert!(!sink.has_variable("npp_yrs"));
}

#[test]
fn test_coards_layout() {
    let results = TempDir::new().unwrap();
    write_metric(results.path(), "soc", &[ResultRow::new(52.0, -3.5, constant_series(24, 10_000.0))]);
    write_metric(results.path(), "co2", &[ResultRow::new(52.0, -3.5, constant_series(24, 10_000.0))]);

    let config = config(results.path());
    let run = RasterPipeline::new(&config)
        .unwrap()
        .run(RasterKind::Coards, memory_sink)
        .unwrap();

    assert_eq!(run.summary.completed, 1);
    assert_eq!(run.outputs.len(), 2);

    let (i, j) = CELL;
    let soc = run
        .outputs
        .iter()
        .find(|o| o.path.ends_with("wales_soc.nc"))
        .unwrap();
    let values = soc.sink.series("fsoc_soil_ara", i, j).unwrap();
    assert_eq!(values.len(), 24);
    assert_approx_eq!(values[0], 1.0);
    assert_eq!(soc.sink.surface("area", i, j), Some(25.0));

    let co2 = run
        .outputs
        .iter()
        .find(|o| o.path.ends_with("wales_co2.nc"))
        .unwrap();
    let values = co2.sink.series("fco2_soil_ara", i, j).unwrap();
    assert_approx_eq!(values[0], 365.0 / 31.0);
    assert_approx_eq!(values[1], 365.0 / 28.0);
    assert_eq!(co2.sink.attribute("weather_dataset"), Some("UKCP18_RCP85"));
}

#[test]
fn test_co2e_layout() {
    let results = TempDir::new().unwrap();
    let inputs = [("ch4", 1.0), ("n2o", 0.5), ("co2", 3.0), ("soc", 100.0)];
    for (metric, value) in inputs {
        write_metric(results.path(), metric, &[ResultRow::new(52.0, -3.5, constant_series(24, value))]);
    }

    let config = config(results.path());
    let run = RasterPipeline::new(&config)
        .unwrap()
        .run(RasterKind::Co2e, memory_sink)
        .unwrap();

    assert_eq!(run.outputs.len(), 1);
    let output = &run.outputs[0];
    assert!(output.path.ends_with("wales_co2e.nc"));

    let (i, j) = CELL;
    let co2e = output.sink.series("fco2e_soil_ara", i, j).unwrap();
    assert_eq!(co2e[0], 0.0);
    assert_approx_eq!(co2e[1], GWP_CH4 * CH4_PER_C + GWP_N2O * 0.5 * N2O_PER_N);
}

#[test]
fn test_co2e_needs_all_inputs() {
    let results = TempDir::new().unwrap();
    write_metric(results.path(), "soc", &[ResultRow::new(52.0, -3.5, constant_series(24, 1.0))]);

    let config = config(results.path());
    let mut pipeline = RasterPipeline::new(&config).unwrap();
    let result = pipeline.run(RasterKind::Co2e, memory_sink);

    assert!(matches!(result, Err(AggregationError::NoInput(_))));
    assert_eq!(pipeline.state(), PipelineState::Aborted);
}

#[test]
fn test_files_are_read_in_lock_step() {
    let results = TempDir::new().unwrap();
    let rows: Vec<ResultRow> = [51.0, 51.5, 52.0]
        .iter()
        .map(|lat| ResultRow::new(*lat, -3.5, constant_series(24, 1.0)))
        .collect();
    write_metric(results.path(), "soc", &rows);
    write_metric(results.path(), "co2", &rows[..2]);

    let config = config(results.path());
    let run = RasterPipeline::new(&config)
        .unwrap()
        .run(RasterKind::Raw, memory_sink)
        .unwrap();

    // The shorter file ends the run
    assert_eq!(run.summary.completed, 2);
    assert_eq!(run.outputs[0].sink.populated_cells("soc"), 2);
}

#[test]
fn test_malformed_lines_count_as_failures() {
    let results = TempDir::new().unwrap();
    write_metric(
        results.path(),
        "soc",
        &[
            ResultRow::new(52.0, -3.5, constant_series(24, 1.0)),
            ResultRow::new(52.5, -3.5, constant_series(20, 1.0)),
            ResultRow::new(53.0, -3.5, constant_series(24, 1.0)),
        ],
    );

    let config = config(results.path());
    let run = RasterPipeline::new(&config)
        .unwrap()
        .run(RasterKind::Raw, memory_sink)
        .unwrap();
    assert_eq!(run.summary.completed, 2);
    assert_eq!(run.summary.failed, 1);

    let config = config.with_max_failures(0);
    let mut pipeline = RasterPipeline::new(&config).unwrap();
    let result = pipeline.run(RasterKind::Raw, memory_sink);
    assert!(matches!(result, Err(AggregationError::TooManyFailures { .. })));
    assert_eq!(pipeline.state(), PipelineState::Aborted);
}
