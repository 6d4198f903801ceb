//! Per-metric result files to NetCDF rasters.
//!
//! All three layouts read the result files in lock step and place every
//! line at the grid cell nearest its latitude and longitude:
//!
//! - [`RasterKind::Raw`]: one `<study>.nc` holding every metric per hectare,
//!   annual rollups and the change in soil carbon
//! - [`RasterKind::Coards`]: one `<study>_<metric>.nc` per metric, per square
//!   metre on a mid-month time axis
//! - [`RasterKind::Co2e`]: `<study>_co2e.nc` holding the CO2 equivalent
//!   derived from ch4, n2o and soc

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Local;
use ecosse_common::{LatLonGrid, Metric, MonthlyTimeAxis, Timestep};
use netcdf_writer::{
    DatasetSpec, GridSink, NetCdfSink, RasterGridWriter, VariableSpec, WriterError, WriterResult,
};
use tracing::{debug, info, instrument, warn};

use super::{PipelineState, StateTracker};
use crate::config::RunConfig;
use crate::error::{AggregationError, Result};
use crate::progress::{FailureBudget, ProgressReporter, RunSummary};
use crate::records::{CombinedRecord, MetricFileSet, ResultsInventory};
use crate::transform::{
    annual_rollup, co2e_series, daily_to_monthly, halve_npp, rescale, stock_difference,
};

/// Units of the raw per-hectare variables.
const RAW_UNITS: &str = "kg/hectare";

/// Units of the CO2 equivalent, computed from per-hectare values.
const CO2E_UNITS: &str = "kg CO2e/hectare";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterKind {
    Raw,
    Coards,
    Co2e,
}

impl RasterKind {
    pub fn stage_name(&self) -> &'static str {
        match self {
            RasterKind::Raw => "csv-to-raw-nc",
            RasterKind::Coards => "csv-to-coards-nc",
            RasterKind::Co2e => "csv-to-co2e-nc",
        }
    }
}

/// A finished raster and the sink holding it.
pub struct RasterOutput<S> {
    pub path: PathBuf,
    pub sink: S,
}

pub struct RasterRun<S> {
    pub summary: RunSummary,
    pub outputs: Vec<RasterOutput<S>>,
}

/// An open raster and its output path.
struct Target<S: GridSink> {
    path: PathBuf,
    writer: RasterGridWriter<S>,
}

impl<S: GridSink> Target<S> {
    fn finish(self) -> WriterResult<RasterOutput<S>> {
        Ok(RasterOutput {
            path: self.path,
            sink: self.writer.finish()?,
        })
    }
}

pub struct RasterPipeline<'a> {
    config: &'a RunConfig,
    inventory: ResultsInventory,
    grid: LatLonGrid,
    budget: FailureBudget,
    state: StateTracker,
    summary: RunSummary,
}

impl<'a> RasterPipeline<'a> {
    /// Discover the result files of the configured metrics.
    pub fn new(config: &'a RunConfig) -> Result<Self> {
        let inventory = ResultsInventory::discover(&config.results_dir, &config.metrics)?;
        Self::with_inventory(config, inventory)
    }

    pub fn with_inventory(config: &'a RunConfig, inventory: ResultsInventory) -> Result<Self> {
        let grid = LatLonGrid::from_bbox(&config.study.bbox, config.study.resolution)?;
        info!(
            n_lat = grid.n_lat,
            n_lon = grid.n_lon,
            resolution = grid.resolution,
            "Output grid"
        );

        Ok(Self {
            config,
            inventory,
            grid,
            budget: FailureBudget::new(config.max_failures),
            state: StateTracker::new(),
            summary: RunSummary::default(),
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state.get()
    }

    pub fn grid(&self) -> &LatLonGrid {
        &self.grid
    }

    pub fn inventory(&self) -> &ResultsInventory {
        &self.inventory
    }

    /// Write NetCDF files into the results directory.
    pub fn run_netcdf(&mut self, kind: RasterKind) -> Result<RasterRun<NetCdfSink>> {
        let overwrite = self.config.overwrite;
        self.run(kind, |path| NetCdfSink::create(path, overwrite))
    }

    /// Build the rasters of `kind`, opening one sink per output path.
    #[instrument(skip(self, open_sink), fields(stage = kind.stage_name()))]
    pub fn run<S, F>(&mut self, kind: RasterKind, open_sink: F) -> Result<RasterRun<S>>
    where
        S: GridSink,
        F: FnMut(&Path) -> WriterResult<S>,
    {
        self.state.set(PipelineState::Scanning);
        let result = match kind {
            RasterKind::Raw => self.write_raw(open_sink),
            RasterKind::Coards => self.write_coards(open_sink),
            RasterKind::Co2e => self.write_co2e(open_sink),
        };

        match result {
            Ok(outputs) => {
                self.state.set(PipelineState::Done);
                self.summary.log(kind.stage_name());
                for output in &outputs {
                    info!(path = %output.path.display(), "Wrote raster");
                }
                Ok(RasterRun {
                    summary: self.summary.clone(),
                    outputs,
                })
            }
            Err(e) => {
                self.state.set(PipelineState::Aborted);
                warn!(error = %e, "Raster stage aborted");
                self.summary.log(kind.stage_name());
                Err(e)
            }
        }
    }

    fn output_path(&self, suffix: Option<&str>) -> PathBuf {
        let name = match suffix {
            Some(suffix) => format!("{}_{}.nc", self.config.study_name(), suffix),
            None => format!("{}.nc", self.config.study_name()),
        };
        self.config.results_dir.join(name)
    }

    /// Monthly time axis ending in the study's last year.
    fn time_axis(&self) -> MonthlyTimeAxis {
        let num_months = self.inventory.timestep.num_months(self.inventory.nfields);
        MonthlyTimeAxis::ending_in(self.config.study.fut_end_year, num_months)
    }

    fn attributation() -> String {
        format!(
            "Created at {} from Spatial Ecosse",
            Local::now().format("%H:%M %d-%m-%Y")
        )
    }

    fn data_used(&self) -> String {
        format!(
            "Data used: HWSD soil and {} weather dataset",
            self.config.climate_scenario
        )
    }

    fn coards_spec(&self, variable: VariableSpec) -> DatasetSpec {
        let study = self.config.study_name();
        DatasetSpec::coards(self.grid.clone(), self.time_axis())
            .with_attribute(
                "history",
                format!("{} study of {} land use", study, self.config.crop_label()),
            )
            .with_attribute("attributation", Self::attributation())
            .with_attribute("weather_dataset", self.config.climate_scenario.as_str())
            .with_attribute("dataUsed", self.data_used())
            .with_variable(VariableSpec::surface("area", "km**2").with_long_name("cell area"))
            .with_variable(variable)
    }

    fn coards_variable_name(&self, quantity: &str) -> String {
        format!("f{}_soil_{}", quantity, self.config.land_use.abbreviation())
    }

    fn flux_long_name(&self, quantity: &str) -> String {
        format!("flux {} {}", quantity, self.config.crop_label())
    }

    fn open_target<S, F>(
        &self,
        spec: DatasetSpec,
        path: PathBuf,
        open_sink: &mut F,
    ) -> Result<Target<S>>
    where
        S: GridSink,
        F: FnMut(&Path) -> WriterResult<S>,
    {
        let sink = open_sink(&path)?;
        let writer = RasterGridWriter::create(spec, sink)?;
        Ok(Target { path, writer })
    }

    // ========================================================================
    // Layouts
    // ========================================================================

    fn write_raw<S, F>(&mut self, mut open_sink: F) -> Result<Vec<RasterOutput<S>>>
    where
        S: GridSink,
        F: FnMut(&Path) -> WriterResult<S>,
    {
        let files = self.inventory.files.clone();
        let timestep = self.inventory.timestep;
        let study = self.config.study_name();

        let time_len = self.inventory.nfields + 2;
        let mut spec = DatasetSpec::raw(self.grid.clone(), self.time_axis(), time_len)
            .with_attribute(
                "history",
                format!("{} consisting of {} metrics", study, files.len()),
            )
            .with_attribute("attributation", Self::attributation())
            .with_attribute("future_climate_scenario", self.config.climate_scenario.as_str())
            .with_attribute("dataUsed", self.data_used())
            .with_variable(VariableSpec::surface("area", "km**2").with_long_name("cell area"))
            .with_variable(
                VariableSpec::surface("mu_global", "HWSD global mapping unit")
                    .integer()
                    .with_long_name("mu_global"),
            );
        for metric in files.keys() {
            spec = spec.with_variable(
                VariableSpec::series(metric.name(), RAW_UNITS).with_long_name(metric.description()),
            );
            if *metric != Metric::Npp {
                spec = spec.with_variable(
                    VariableSpec::annual(format!("{}_yrs", metric), RAW_UNITS)
                        .with_long_name(format!("annual {}", metric.description())),
                );
            }
        }
        if files.contains_key(&Metric::Soc) {
            spec = spec.with_variable(
                VariableSpec::surface("soc_diff", RAW_UNITS)
                    .with_long_name("change in soil organic carbon"),
            );
        }

        let path = self.output_path(None);
        let mut target = self.open_target(spec, path, &mut open_sink)?;

        let steps_per_year = timestep.steps_per_year();
        self.process(&files, |record, lat_index, lon_index| {
            write_raw_cell(&mut target.writer, record, lat_index, lon_index, steps_per_year)
        })?;

        Ok(vec![target.finish()?])
    }

    fn write_coards<S, F>(&mut self, mut open_sink: F) -> Result<Vec<RasterOutput<S>>>
    where
        S: GridSink,
        F: FnMut(&Path) -> WriterResult<S>,
    {
        let files = self.inventory.files.clone();
        let timestep = self.inventory.timestep;
        let num_months = self.time_axis().num_months;

        let mut targets: BTreeMap<Metric, (String, Target<S>)> = BTreeMap::new();
        for metric in files.keys() {
            let name = self.coards_variable_name(metric.name());
            let variable = VariableSpec::series(name.as_str(), metric.rescaled_units())
                .with_long_name(self.flux_long_name(metric.name()));
            let spec = self.coards_spec(variable);
            let path = self.output_path(Some(metric.name()));
            targets.insert(*metric, (name, self.open_target(spec, path, &mut open_sink)?));
        }

        self.process(&files, |record, lat_index, lon_index| {
            let mut cell = Vec::with_capacity(record.values.len());
            for (metric, values) in &record.values {
                let Some((name, target)) = targets.get(metric) else {
                    continue;
                };
                let rescaled = rescale(values, *metric, timestep, num_months);
                target.writer.check_series(name, rescaled.len())?;
                cell.push((*metric, rescaled));
            }

            for (metric, rescaled) in cell {
                let Some((name, target)) = targets.get_mut(&metric) else {
                    continue;
                };
                let writer = &mut target.writer;
                writer.write_surface(lat_index, lon_index, "area", record.prefix.area_km2)?;
                writer.write_series(lat_index, lon_index, name, &rescaled)?;
                writer.mark_cell_written();
            }
            Ok(())
        })?;

        targets
            .into_values()
            .map(|(_, target)| target.finish().map_err(AggregationError::from))
            .collect()
    }

    fn write_co2e<S, F>(&mut self, mut open_sink: F) -> Result<Vec<RasterOutput<S>>>
    where
        S: GridSink,
        F: FnMut(&Path) -> WriterResult<S>,
    {
        let files = self.inventory.subset(&Metric::CO2E_INPUTS).ok_or_else(|| {
            AggregationError::NoInput(format!(
                "CO2 equivalent needs result files for {}",
                Metric::CO2E_INPUTS.map(|m| m.name()).join(", ")
            ))
        })?;
        let timestep = self.inventory.timestep;

        let name = self.coards_variable_name("co2e");
        let variable = VariableSpec::series(name.as_str(), CO2E_UNITS)
            .with_long_name(self.flux_long_name("co2e"));
        let spec = self.coards_spec(variable);
        let path = self.output_path(Some("co2e"));
        let mut target = self.open_target(spec, path, &mut open_sink)?;

        self.process(&files, |record, lat_index, lon_index| {
            let monthly = |metric: Metric| -> Vec<f64> {
                let values = record.values(metric).unwrap_or_default();
                match timestep {
                    Timestep::Daily => daily_to_monthly(values, metric),
                    Timestep::Monthly => values.to_vec(),
                }
            };
            let co2e = co2e_series(
                &monthly(Metric::Ch4),
                &monthly(Metric::N2o),
                &monthly(Metric::Soc),
            );

            let writer = &mut target.writer;
            writer.check_series(&name, co2e.len())?;
            writer.write_surface(lat_index, lon_index, "area", record.prefix.area_km2)?;
            writer.write_series(lat_index, lon_index, &name, &co2e)?;
            writer.mark_cell_written();
            Ok(())
        })?;

        Ok(vec![target.finish()?])
    }

    // ========================================================================
    // Record loop
    // ========================================================================

    /// Feed every combined line to `write_cell` at its grid position.
    ///
    /// Malformed lines count against the failure budget. Lines outside the
    /// grid and cells whose series do not fit their variables are skipped.
    fn process<W>(&mut self, files: &BTreeMap<Metric, PathBuf>, mut write_cell: W) -> Result<()>
    where
        W: FnMut(&CombinedRecord, usize, usize) -> WriterResult<()>,
    {
        let records = MetricFileSet::open(files, self.inventory.nfields)?;
        let mut progress =
            ProgressReporter::new(self.config.progress_interval, self.inventory.data_lines());
        self.state.set(PipelineState::PerCellAccumulate);

        for record in records {
            let record = match record {
                Ok(record) => record,
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, "Skipping bad line");
                    self.budget.charge(&mut self.summary)?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let (lat, lon) = (record.prefix.latitude, record.prefix.longitude);
            let (lat_index, lon_index) = match self.grid.resolve_index(lat, lon) {
                Ok(indices) => indices,
                Err(_) => {
                    let e = AggregationError::OutOfBoundsCoordinate { lat, lon };
                    warn!(error = %e, "Skipping cell");
                    self.summary.skipped += 1;
                    continue;
                }
            };

            self.state.set(PipelineState::Writing);
            match write_cell(&record, lat_index, lon_index) {
                Ok(()) => self.summary.record_completed(record.prefix.area_km2),
                Err(e @ WriterError::SeriesLengthMismatch { .. }) => {
                    warn!(lat = lat, lon = lon, error = %e, "Skipping cell");
                    self.summary.skipped += 1;
                }
                Err(e) => return Err(e.into()),
            }
            progress.update(&self.summary);
            self.state.set(PipelineState::PerCellAccumulate);
        }

        debug!(cells = self.summary.completed, "Processed result lines");
        Ok(())
    }
}

/// Store one line of the raw layout. Every series is checked before the
/// first value of the cell is stored, so a rejected cell stays at fill.
fn write_raw_cell<S: GridSink>(
    writer: &mut RasterGridWriter<S>,
    record: &CombinedRecord,
    lat_index: usize,
    lon_index: usize,
    steps_per_year: usize,
) -> WriterResult<()> {
    let mut series: Vec<(String, Vec<f64>)> = Vec::with_capacity(2 * record.values.len());
    let mut soc_diff = None;
    for (metric, values) in &record.values {
        let values = match metric {
            Metric::Npp => halve_npp(values),
            _ => values.clone(),
        };
        if *metric == Metric::Soc {
            soc_diff = stock_difference(&values);
        }
        let yearly = (*metric != Metric::Npp)
            .then(|| annual_rollup(&values, *metric, steps_per_year));
        series.push((metric.name().to_string(), values));
        if let Some(yearly) = yearly {
            series.push((format!("{}_yrs", metric), yearly));
        }
    }
    for (name, values) in &series {
        writer.check_series(name, values.len())?;
    }

    writer.write_surface(lat_index, lon_index, "area", record.prefix.area_km2)?;
    if let Some(mu_global) = record.prefix.mu_global {
        writer.write_surface(lat_index, lon_index, "mu_global", f64::from(mu_global))?;
    }
    for (name, values) in &series {
        writer.write_series(lat_index, lon_index, name, values)?;
    }
    if let Some(diff) = soc_diff {
        writer.write_surface(lat_index, lon_index, "soc_diff", diff)?;
    }
    writer.mark_cell_written();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::RecordPrefix;
    use ecosse_common::BoundingBox;
    use netcdf_writer::MemorySink;

    fn raw_writer() -> RasterGridWriter<MemorySink> {
        let grid = LatLonGrid::from_bbox(&BoundingBox::new(-5.0, 51.0, -2.5, 53.5), 0.5).unwrap();
        let spec = DatasetSpec::raw(grid, MonthlyTimeAxis::new(2079, 24), 26)
            .with_variable(VariableSpec::surface("area", "km**2"))
            .with_variable(VariableSpec::surface("mu_global", "HWSD global mapping unit").integer())
            .with_variable(VariableSpec::series("soc", RAW_UNITS))
            .with_variable(VariableSpec::annual("soc_yrs", RAW_UNITS))
            .with_variable(VariableSpec::surface("soc_diff", RAW_UNITS));
        RasterGridWriter::create(spec, MemorySink::new()).unwrap()
    }

    fn record(soc: Vec<f64>) -> CombinedRecord {
        CombinedRecord {
            prefix: RecordPrefix {
                fields: ["Wales", "52", "-3.5", "10090", "RCP85", "1", "ara", "25"].map(String::from),
                latitude: 52.0,
                longitude: -3.5,
                mu_global: Some(10090),
                area_km2: 25.0,
            },
            values: BTreeMap::from([(Metric::Soc, soc)]),
        }
    }

    #[test]
    fn test_write_raw_cell() {
        let mut writer = raw_writer();
        let soc: Vec<f64> = (0..24).map(f64::from).collect();
        write_raw_cell(&mut writer, &record(soc), 2, 3, 12).unwrap();

        assert_eq!(writer.cells_written(), 1);
        let sink = writer.finish().unwrap();
        assert_eq!(sink.surface("area", 2, 3), Some(25.0));
        assert_eq!(sink.surface("mu_global", 2, 3), Some(10090.0));
        assert_eq!(sink.surface("soc_diff", 2, 3), Some(23.0));
        assert_eq!(sink.series("soc_yrs", 2, 3).unwrap(), vec![5.5, 17.5]);
    }

    #[test]
    fn test_rejected_raw_cell_stays_at_fill() {
        let mut writer = raw_writer();
        let err = write_raw_cell(&mut writer, &record(vec![1.0; 30]), 2, 3, 12).unwrap_err();
        assert!(matches!(err, WriterError::SeriesLengthMismatch { len: 30, .. }));

        assert_eq!(writer.cells_written(), 0);
        let sink = writer.finish().unwrap();
        assert_eq!(sink.surface("area", 2, 3), None);
        assert_eq!(sink.surface("mu_global", 2, 3), None);
        assert_eq!(sink.surface("soc_diff", 2, 3), None);
        assert_eq!(sink.populated_cells("soc"), 0);
    }
}
