//! End-to-end runs of the simulation-to-CSV stage.

use std::fs;

use aggregation::{AggregationError, AggregationPipeline, PipelineState, RunConfig, StudyDefinition};
use tempfile::TempDir;
use test_utils::fixtures::bbox;
use test_utils::{manifest_json, study_definition_json, summary_out, SimsDirFixture, TestLocation};

const CELL_A: &str = "lat0000001_lon0000001_mu10090";
const CELL_B: &str = "lat0000002_lon0000001_mu10090";
const CELL_C: &str = "lat0000003_lon0000001_mu10091";

fn study() -> StudyDefinition {
    let json = study_definition_json("wales", bbox::WALES, 0.5, "ara", (2079, 2080));
    StudyDefinition::from_json_str(&json).unwrap()
}

/// 24 monthly rows with a constant soil carbon and unit fluxes.
fn summary(soc: f64) -> String {
    summary_out(24, move |column, _| if column == "Total_SOC" { soc } else { 1.0 })
}

fn data_line<'a>(contents: &'a str, n: usize) -> Vec<&'a str> {
    contents.lines().nth(n).unwrap().split('\t').collect()
}

#[test]
fn test_aggregate_to_csv() {
    let sims = SimsDirFixture::new();
    let results = TempDir::new().unwrap();

    // Two soils, both with shares
    sims.add_soil(CELL_A, 1, &summary(100.0));
    sims.add_soil(CELL_A, 2, &summary(200.0));
    sims.add_manifest(CELL_A, &TestLocation::new("Wales", 52.0, -3.5, 25.0), &[(1, 60.0), (2, 40.0)]);

    // No manifest
    sims.add_soil(CELL_B, 1, &summary(100.0));

    // Slot 1 has a share but no result
    sims.add_soil(CELL_C, 2, &summary(200.0));
    sims.add_manifest(CELL_C, &TestLocation::new("Wales", 52.5, -3.5, 20.0), &[(1, 60.0), (2, 40.0)]);

    let config = RunConfig::new(study(), sims.path(), results.path());
    let mut pipeline = AggregationPipeline::new(&config);
    let summary = pipeline.run().unwrap();

    assert_eq!(pipeline.state(), PipelineState::Done);
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.warnings, 1);
    assert!((summary.total_area_km2 - 45.0).abs() < 1e-9);

    let soc = fs::read_to_string(results.path().join("wales_soc.txt")).unwrap();
    assert_eq!(soc.lines().count(), 3);

    let header = data_line(&soc, 0);
    assert_eq!(header.len(), 8 + 24);
    assert_eq!(header[8], "2079-01");
    assert_eq!(header[31], "2080-12");

    let first = data_line(&soc, 1);
    assert_eq!(
        &first[..8],
        &["Wales", "52", "-3.5", "10090", "UKCP18_RCP85", "2", "ara", "25"]
    );
    assert_eq!(first[8], "140.0");

    // 0.4 * 200 scaled by 1 + 0.6 for the missing soil
    let second = data_line(&soc, 2);
    assert_eq!(second[3], "10091");
    assert_eq!(second[5], "1");
    assert_eq!(second[8], "128.0");

    let ch4 = fs::read_to_string(results.path().join("wales_ch4.txt")).unwrap();
    assert_eq!(data_line(&ch4, 1)[8], "1.00000");

    for metric in ["co2", "n2o"] {
        assert!(results.path().join(format!("wales_{}.txt", metric)).is_file());
    }
    assert!(!results.path().join("wales_npp.txt").exists());
}

#[test]
fn test_unprocessable_slot_is_a_warning() {
    let sims = SimsDirFixture::new();
    let results = TempDir::new().unwrap();

    sims.add_soil(CELL_A, 1, &summary(100.0));
    sims.add_soil(CELL_A, 10, &summary(500.0));
    sims.add_manifest(CELL_A, &TestLocation::new("Wales", 52.0, -3.5, 25.0), &[(1, 100.0)]);

    let config = RunConfig::new(study(), sims.path(), results.path());
    let summary = AggregationPipeline::new(&config).run().unwrap();

    assert_eq!(summary.completed, 1);
    assert_eq!(summary.warnings, 1);

    let soc = fs::read_to_string(results.path().join("wales_soc.txt")).unwrap();
    assert_eq!(data_line(&soc, 1)[8], "100.0");
}

#[test]
fn test_too_many_failures_aborts() {
    let sims = SimsDirFixture::new();
    let results = TempDir::new().unwrap();

    sims.add_soil(CELL_A, 1, &summary(100.0));
    sims.add_manifest(CELL_A, &TestLocation::new("Wales", 52.0, -3.5, 25.0), &[(1, 100.0)]);
    sims.add_soil(CELL_B, 1, "units\nYear Month Total_SOC\n2001 1 not-a-number\n");
    sims.add_soil(CELL_C, 1, &summary_out(13, |_, _| 1.0));

    let config = RunConfig::new(study(), sims.path(), results.path()).with_max_failures(1);
    let mut pipeline = AggregationPipeline::new(&config);
    let result = pipeline.run();

    assert!(matches!(
        result,
        Err(AggregationError::TooManyFailures { failures: 2, max_failures: 1 })
    ));
    assert_eq!(pipeline.state(), PipelineState::Aborted);
    assert_eq!(pipeline.summary().completed, 1);
}

#[test]
fn test_existing_output_requires_overwrite() {
    let sims = SimsDirFixture::new();
    let results = TempDir::new().unwrap();
    sims.add_soil(CELL_A, 1, &summary(100.0));
    sims.add_manifest(CELL_A, &TestLocation::new("Wales", 52.0, -3.5, 25.0), &[(1, 100.0)]);
    fs::write(results.path().join("wales_soc.txt"), "stale").unwrap();

    let config = RunConfig::new(study(), sims.path(), results.path());
    let result = AggregationPipeline::new(&config).run();
    assert!(matches!(result, Err(AggregationError::OutputExists(_))));

    let config = config.with_overwrite(true);
    let summary = AggregationPipeline::new(&config).run().unwrap();
    assert_eq!(summary.completed, 1);
}

#[test]
fn test_empty_sims_dir() {
    let sims = SimsDirFixture::new();
    let results = TempDir::new().unwrap();

    let config = RunConfig::new(study(), sims.path(), results.path());
    let mut pipeline = AggregationPipeline::new(&config);
    assert!(matches!(pipeline.run(), Err(AggregationError::NoInput(_))));
    assert_eq!(pipeline.state(), PipelineState::Aborted);
}

#[test]
fn test_unreadable_manifest_skips_cell() {
    let sims = SimsDirFixture::new();
    let results = TempDir::new().unwrap();

    sims.add_soil(CELL_A, 1, &summary(100.0));
    sims.add_manifest(CELL_A, &TestLocation::new("Wales", 52.0, -3.5, 25.0), &[(1, 100.0)]);
    sims.add_soil(CELL_B, 1, &summary(100.0));
    sims.add_manifest_contents(CELL_B, b"{\"location\": \xff\xfe}");
    sims.add_soil(CELL_C, 1, &summary(100.0));
    sims.add_manifest(CELL_C, &TestLocation::new("Wales", 52.5, -3.5, 20.0), &[(1, 100.0)]);

    let config = RunConfig::new(study(), sims.path(), results.path());
    let mut pipeline = AggregationPipeline::new(&config);
    let summary = pipeline.run().unwrap();

    assert_eq!(pipeline.state(), PipelineState::Done);
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);

    let soc = fs::read_to_string(results.path().join("wales_soc.txt")).unwrap();
    assert_eq!(soc.lines().count(), 3);
}

#[test]
fn test_granular_longitudes_expand_rows() {
    let sims = SimsDirFixture::new();
    let results = TempDir::new().unwrap();

    let location = TestLocation::new("Wales", 52.0, -3.5, 25.0);
    let mut manifest: serde_json::Value =
        serde_json::from_str(&manifest_json(&location, &[(1, 100.0)])).unwrap();
    manifest["granular_longs"] = serde_json::json!({"1": 20160, "2": 20161});
    sims.add_soil(CELL_A, 1, &summary(100.0));
    sims.add_manifest_contents(CELL_A, manifest.to_string());

    let config = RunConfig::new(study(), sims.path(), results.path());
    AggregationPipeline::new(&config).run().unwrap();
    let soc = fs::read_to_string(results.path().join("wales_soc.txt")).unwrap();
    assert_eq!(soc.lines().count(), 2);
    assert_eq!(data_line(&soc, 1)[7], "25");

    let config = config.with_overwrite(true).with_expand_granular(true);
    let summary = AggregationPipeline::new(&config).run().unwrap();
    assert_eq!(summary.completed, 1);
    assert!((summary.total_area_km2 - 25.0).abs() < 1e-9);

    let soc = fs::read_to_string(results.path().join("wales_soc.txt")).unwrap();
    assert_eq!(soc.lines().count(), 4);
    for n in 1..4 {
        let line = data_line(&soc, n);
        assert_eq!(line[7], "8.333333");
        assert_eq!(line[8], "100.0");
    }
}
