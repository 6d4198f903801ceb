//! Round trips through real NetCDF files.

use ecosse_common::{BoundingBox, LatLonGrid, MonthlyTimeAxis};
use netcdf_writer::{
    DatasetSpec, NetCdfSink, RasterGridWriter, VariableSpec, WriterError, MISSING_VALUE,
};
use tempfile::TempDir;

fn grid() -> LatLonGrid {
    LatLonGrid::from_bbox(&BoundingBox::new(-2.0, 52.0, 0.0, 54.0), 0.5).unwrap()
}

// ============================================================================
// Raw layout
// ============================================================================

#[test]
fn test_raw_layout_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("study.nc");

    let spec = DatasetSpec::raw(grid(), MonthlyTimeAxis::new(2020, 24), 26)
        .with_attribute("history", "study consisting of study study")
        .with_variable(VariableSpec::surface("area", "km**2"))
        .with_variable(VariableSpec::surface("mu_global", "HWSD global mapping unit").integer())
        .with_variable(VariableSpec::series("soc", "kg/hectare"))
        .with_variable(VariableSpec::annual("soc_yrs", "kg/hectare"));

    let sink = NetCdfSink::create(&path, false).unwrap();
    let mut writer = RasterGridWriter::create(spec, sink).unwrap();

    let (i, j) = writer.resolve_index(53.0, -1.0).unwrap();
    writer.write_surface(i, j, "area", 81.5).unwrap();
    writer.write_surface(i, j, "mu_global", 10090.0).unwrap();
    let series: Vec<f64> = (0..24).map(f64::from).collect();
    writer.write_series(i, j, "soc", &series).unwrap();
    writer.write_series(i, j, "soc_yrs", &[5.5, 17.5]).unwrap();
    drop(writer.finish().unwrap());

    let file = netcdf::open(&path).unwrap();
    assert_eq!(file.dimension("lat").unwrap().len(), 7);
    assert_eq!(file.dimension("lon").unwrap().len(), 7);
    assert_eq!(file.dimension("time").unwrap().len(), 26);
    assert_eq!(file.dimension("year").unwrap().len(), 2);

    let soc: Vec<f32> = file
        .variable("soc")
        .unwrap()
        .get_values((i, j, ..))
        .unwrap();
    assert_eq!(soc.len(), 26);
    assert_eq!(soc[23], 23.0);
    assert_eq!(soc[24], MISSING_VALUE);

    let mu: Vec<i32> = file
        .variable("mu_global")
        .unwrap()
        .get_values([i, j])
        .unwrap();
    assert_eq!(mu, vec![10090]);

    let untouched: Vec<f32> = file
        .variable("area")
        .unwrap()
        .get_values([0, 0])
        .unwrap();
    assert_eq!(untouched, vec![MISSING_VALUE]);
}

// ============================================================================
// COARDS layout
// ============================================================================

#[test]
fn test_coards_layout_time_axis() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("study_soc.nc");

    let spec = DatasetSpec::coards(grid(), MonthlyTimeAxis::new(1900, 12))
        .with_variable(VariableSpec::surface("area", "km**2"))
        .with_variable(
            VariableSpec::series("fsoc_soil_ara", "kg C m-2").with_long_name("soil organic carbon Arable"),
        );

    let sink = NetCdfSink::create(&path, false).unwrap();
    let mut writer = RasterGridWriter::create(spec, sink).unwrap();
    let (i, j) = writer.resolve_index(52.5, -0.5).unwrap();
    writer
        .write_series(i, j, "fsoc_soil_ara", &[1.5; 12])
        .unwrap();
    drop(writer.finish().unwrap());

    let file = netcdf::open(&path).unwrap();
    assert_eq!(file.dimension("latitude").unwrap().len(), 7);
    assert_eq!(file.dimension("bnds").unwrap().len(), 2);

    let times: Vec<f32> = file.variable("time").unwrap().get_values(..).unwrap();
    assert_eq!(times.len(), 12);
    assert_eq!(times[0], 15.0);

    let bnds: Vec<f32> = file.variable("time_bnds").unwrap().get_values(..).unwrap();
    assert_eq!(&bnds[..4], &[0.0, 30.0, 31.0, 58.0]);

    let values: Vec<f32> = file
        .variable("fsoc_soil_ara")
        .unwrap()
        .get_values((.., i, j))
        .unwrap();
    assert_eq!(values, vec![1.5; 12]);
}

// ============================================================================
// Output file handling
// ============================================================================

#[test]
fn test_existing_output_requires_overwrite() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("exists.nc");
    std::fs::write(&path, b"stale").unwrap();

    let err = NetCdfSink::create(&path, false).err().unwrap();
    assert!(matches!(err, WriterError::OutputExists(_)));

    let sink = NetCdfSink::create(&path, true).unwrap();
    assert_eq!(sink.path(), path.as_path());
}
