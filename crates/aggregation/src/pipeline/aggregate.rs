//! Simulation directories to per-metric result files.
//!
//! Directories are visited in name order, so the soil slots of a cell are
//! adjacent and ascending. The slots of a cell are collected until the next
//! directory belongs to another cell, then composited with the cell's
//! manifest shares and written as one row per metric file.

use ecosse_common::time::{day_labels, month_labels};
use ecosse_common::{CellId, GridCell, Timestep};
use tracing::{debug, info, instrument, warn};

use super::{PipelineState, StateTracker};
use crate::compositor::{compose, SoilSlots};
use crate::config::RunConfig;
use crate::error::{AggregationError, Result};
use crate::manifest::{Manifest, ManifestStore};
use crate::output::CsvResultWriter;
use crate::progress::{FailureBudget, ProgressReporter, RunSummary};
use crate::scan::{scan_simulation_dirs, ScannedDir};
use crate::summary::read_simulation_dir;

/// Layout of the run's series, declared from the first readable result.
#[derive(Debug, Clone)]
struct SeriesLayout {
    len: usize,
    labels: Vec<String>,
}

/// Cell whose slots are being collected.
struct OpenCell {
    cell_id: CellId,
    mu_global: u32,
    slots: SoilSlots,
}

pub struct AggregationPipeline<'a> {
    config: &'a RunConfig,
    manifests: ManifestStore,
    budget: FailureBudget,
    state: StateTracker,
    summary: RunSummary,
}

impl<'a> AggregationPipeline<'a> {
    pub fn new(config: &'a RunConfig) -> Self {
        Self {
            manifests: ManifestStore::new(&config.sims_dir),
            budget: FailureBudget::new(config.max_failures),
            state: StateTracker::new(),
            summary: RunSummary::default(),
            config,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state.get()
    }

    /// Counters so far; complete once `run` has returned.
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Aggregate every simulation directory into `<study>_<metric>.txt` files.
    ///
    /// Files written before an abort remain on disk.
    #[instrument(skip(self), fields(study = %self.config.study_name()))]
    pub fn run(&mut self) -> Result<RunSummary> {
        match self.execute() {
            Ok(()) => {
                self.state.set(PipelineState::Done);
                self.summary.log("aggregate-to-csv");
                Ok(self.summary.clone())
            }
            Err(e) => {
                self.state.set(PipelineState::Aborted);
                warn!(error = %e, "Aggregation aborted");
                self.summary.log("aggregate-to-csv");
                Err(e)
            }
        }
    }

    fn execute(&mut self) -> Result<()> {
        self.state.set(PipelineState::Scanning);
        let dirs = scan_simulation_dirs(&self.config.sims_dir)?;
        if dirs.is_empty() {
            return Err(AggregationError::NoInput(format!(
                "no simulation directories in {}",
                self.config.sims_dir.display()
            )));
        }
        let num_cells = self.manifests.count_manifests()?;
        info!(
            sims_dir = %self.config.sims_dir.display(),
            directories = dirs.len(),
            manifests = num_cells,
            "Found simulations"
        );

        let layout = self.declare_layout(&dirs)?;
        let mut writer = CsvResultWriter::create(
            &self.config.results_dir,
            self.config.study_name(),
            &self.config.metrics,
            &layout.labels,
            self.config.overwrite,
        )?;
        let mut progress = ProgressReporter::new(self.config.progress_interval, num_cells);

        let mut open: Option<OpenCell> = None;
        for scanned in &dirs {
            let dir = &scanned.dir;
            if open.as_ref().is_some_and(|cell| cell.cell_id != dir.cell_id) {
                if let Some(cell) = open.take() {
                    self.complete_cell(&cell, &mut writer)?;
                }
            }
            let cell = open.get_or_insert_with(|| OpenCell {
                cell_id: dir.cell_id.clone(),
                mu_global: dir.mu_global,
                slots: SoilSlots::new(),
            });

            self.state.set(PipelineState::PerCellAccumulate);
            self.accumulate(scanned, layout.len, &mut cell.slots)?;
            progress.update(&self.summary);
        }
        if let Some(cell) = open.take() {
            self.complete_cell(&cell, &mut writer)?;
        }

        self.state.set(PipelineState::Writing);
        let paths = writer.finish()?;
        debug!(files = paths.len(), "Closed result files");
        Ok(())
    }

    /// Length and column labels of the run's series, from the first
    /// simulation whose SUMMARY.OUT can be read.
    fn declare_layout(&self, dirs: &[ScannedDir]) -> Result<SeriesLayout> {
        for scanned in dirs {
            match read_simulation_dir(&scanned.path, &self.config.metrics) {
                Ok(result) => {
                    let len = result.len();
                    let labels = self.time_labels(len);
                    info!(
                        path = %scanned.path.display(),
                        timesteps = len,
                        first_label = labels.first().map(String::as_str).unwrap_or(""),
                        "Declared series length"
                    );
                    return Ok(SeriesLayout { len, labels });
                }
                Err(e) if e.is_recoverable() => debug!(error = %e, "Skipping unreadable result"),
                Err(e) => return Err(e),
            }
        }
        Err(AggregationError::NoInput(
            "no readable SUMMARY.OUT in any simulation directory".to_string(),
        ))
    }

    /// Column labels for `len` timesteps ending in the study's last year.
    fn time_labels(&self, len: usize) -> Vec<String> {
        let study = &self.config.study;
        match Timestep::from_summary_rows(len) {
            Some(timestep) => {
                let num_years = timestep.num_years(len) as i32;
                let start_year = study.fut_end_year - num_years + 1;
                match timestep {
                    Timestep::Monthly => month_labels(start_year, study.fut_end_year),
                    Timestep::Daily => day_labels(start_year, study.fut_end_year),
                }
            }
            None => {
                warn!(
                    timesteps = len,
                    "Cannot deduce timestep, labelling months from the study's start year"
                );
                month_labels(study.fut_start_year, study.fut_end_year)
            }
        }
    }

    fn accumulate(
        &mut self,
        scanned: &ScannedDir,
        expected_len: usize,
        slots: &mut SoilSlots,
    ) -> Result<()> {
        match read_simulation_dir(&scanned.path, &self.config.metrics) {
            Ok(result) if result.len() == expected_len => {
                if !slots.insert(scanned.dir.slot, result) {
                    warn!(
                        path = %scanned.path.display(),
                        slot = scanned.dir.slot,
                        "Cannot process dominant soil number"
                    );
                    self.summary.warnings += 1;
                }
                Ok(())
            }
            Ok(result) => {
                warn!(
                    path = %scanned.path.display(),
                    timesteps = result.len(),
                    expected = expected_len,
                    "Simulation length differs from the run"
                );
                self.budget.charge(&mut self.summary)
            }
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "Failed to read simulation");
                self.budget.charge(&mut self.summary)
            }
            Err(e) => Err(e),
        }
    }

    fn complete_cell(&mut self, cell: &OpenCell, writer: &mut CsvResultWriter) -> Result<()> {
        self.state.set(PipelineState::CellComplete);

        let manifest = match self.manifests.load(&cell.cell_id, Some(cell.mu_global)) {
            Ok(manifest) => manifest,
            Err(e) if e.is_recoverable() => {
                warn!(cell = %cell.cell_id, error = %e, "Skipping cell without a usable manifest");
                self.summary.skipped += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match compose(&cell.slots, &manifest, &self.config.metrics) {
            Ok(Some(composition)) => {
                self.summary.warnings += composition.warnings;
                let grid_cell = self.grid_cell(cell, &manifest);
                let (copies, row_area) = self.row_split(&grid_cell, &manifest);
                let prefix = row_prefix(&grid_cell, row_area, composition.num_dom_soils);
                writer.write_cell_rows(&prefix, copies, composition.result.iter())?;
                self.summary.record_completed(grid_cell.area_km2);
                debug!(
                    cell = %grid_cell.cell_id,
                    soils = composition.num_dom_soils,
                    multiplier = composition.multiplier,
                    rows = copies,
                    "Wrote cell"
                );
            }
            Ok(None) => {
                debug!(cell = %cell.cell_id, "No soil results for cell");
                self.summary.skipped += 1;
            }
            Err(e) if e.is_recoverable() => {
                warn!(cell = %cell.cell_id, error = %e, "Skipping cell");
                self.summary.skipped += 1;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn grid_cell(&self, cell: &OpenCell, manifest: &Manifest) -> GridCell {
        let location = &manifest.location;
        GridCell {
            cell_id: cell.cell_id.clone(),
            province: location.province.clone(),
            latitude: location.latitude,
            longitude: location.longitude,
            mu_global: Some(cell.mu_global),
            area_km2: location.area,
            land_use: self.config.land_use,
            climate_scenario: self.config.climate_scenario.clone(),
        }
    }

    /// Rows written for a cell and the area of each. An expanded cell gets
    /// one row for itself and one per granular longitude, each with an
    /// equal part of the area.
    fn row_split(&self, cell: &GridCell, manifest: &Manifest) -> (usize, f64) {
        let extra = manifest.granular_longs().len();
        if !self.config.expand_granular || extra == 0 {
            return (1, cell.area_km2);
        }
        let copies = extra + 1;
        (copies, round6(cell.area_km2 / copies as f64))
    }
}

/// The 8 leading columns of a result row.
fn row_prefix(cell: &GridCell, area_km2: f64, num_dom_soils: usize) -> Vec<String> {
    vec![
        cell.province.clone(),
        round6(cell.latitude).to_string(),
        round6(cell.longitude).to_string(),
        cell.mu_global.map(|mu| mu.to_string()).unwrap_or_default(),
        cell.climate_scenario.clone(),
        num_dom_soils.to_string(),
        cell.land_use.abbreviation().to_string(),
        area_km2.to_string(),
    ]
}

fn round6(value: f64) -> f64 {
    (value * 1.0e6).round() / 1.0e6
}
