//! Year-window cut of per-metric result files.
//!
//! Copies the result files of a study into `<results_dir>/cut_outdir`,
//! keeping the 8 prefix columns and only the values of the years inside a
//! window, e.g. a 300 year run cut down to 2001-2100. Values are copied as
//! text so their precision is unchanged. The files are read in lock step;
//! a line that is malformed in any file is dropped from all of them.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Lines};
use std::ops::Range;
use std::path::PathBuf;

use csv::{Writer, WriterBuilder};
use ecosse_common::Metric;
use tracing::{debug, info, instrument, warn};

use super::{PipelineState, StateTracker};
use crate::config::RunConfig;
use crate::error::{AggregationError, Result};
use crate::output::prepare_output;
use crate::progress::{FailureBudget, ProgressReporter, RunSummary};
use crate::records::{parse_record, split_fields, ResultsInventory, PREFIX_LEN};

/// Directory of the cut files, inside the results directory.
pub const CUT_DIR_NAME: &str = "cut_outdir";

/// Inclusive range of calendar years.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearWindow {
    pub first: i32,
    pub last: i32,
}

impl YearWindow {
    pub fn new(first: i32, last: i32) -> Result<Self> {
        if last < first {
            return Err(AggregationError::ConfigInvalid(format!(
                "last year {} precedes first year {}",
                last, first
            )));
        }
        Ok(Self { first, last })
    }
}

pub struct CutRun {
    pub summary: RunSummary,
    pub paths: Vec<PathBuf>,
}

struct CutFile {
    metric: Metric,
    lines: Lines<BufReader<File>>,
    writer: Writer<File>,
}

pub struct CutPipeline<'a> {
    config: &'a RunConfig,
    inventory: ResultsInventory,
    budget: FailureBudget,
    state: StateTracker,
    summary: RunSummary,
}

impl<'a> CutPipeline<'a> {
    /// Discover the result files of the configured metrics.
    pub fn new(config: &'a RunConfig) -> Result<Self> {
        let inventory = ResultsInventory::discover(&config.results_dir, &config.metrics)?;
        Ok(Self::with_inventory(config, inventory))
    }

    pub fn with_inventory(config: &'a RunConfig, inventory: ResultsInventory) -> Self {
        Self {
            config,
            inventory,
            budget: FailureBudget::new(config.max_failures),
            state: StateTracker::new(),
            summary: RunSummary::default(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state.get()
    }

    pub fn output_dir(&self) -> PathBuf {
        self.config.results_dir.join(CUT_DIR_NAME)
    }

    /// Value columns, counted after the prefix, of the years in `window`.
    ///
    /// The series ends in the study's last year. The window is clipped to
    /// the years the series covers; a window outside them is an error.
    pub fn value_range(&self, window: YearWindow) -> Result<Range<usize>> {
        let inventory = &self.inventory;
        let steps_per_year = inventory.timestep.steps_per_year();
        let end_year = self.config.study.fut_end_year;
        let start_year = end_year - inventory.timestep.num_years(inventory.nfields) as i32 + 1;

        let first = window.first.max(start_year);
        let last = window.last.min(end_year);
        if first > last {
            return Err(AggregationError::ConfigInvalid(format!(
                "years {}-{} are outside the results, which cover {}-{}",
                window.first, window.last, start_year, end_year
            )));
        }

        let start = (first - start_year) as usize * steps_per_year;
        let end = ((last - start_year + 1) as usize * steps_per_year).min(inventory.nfields);
        Ok(start..end)
    }

    #[instrument(skip(self), fields(study = %self.config.study_name()))]
    pub fn run(&mut self, window: YearWindow) -> Result<CutRun> {
        match self.execute(window) {
            Ok(paths) => {
                self.state.set(PipelineState::Done);
                self.summary.log("cut-csv");
                Ok(CutRun {
                    summary: self.summary.clone(),
                    paths,
                })
            }
            Err(e) => {
                self.state.set(PipelineState::Aborted);
                warn!(error = %e, "Cut aborted");
                self.summary.log("cut-csv");
                Err(e)
            }
        }
    }

    fn execute(&mut self, window: YearWindow) -> Result<Vec<PathBuf>> {
        self.state.set(PipelineState::Scanning);
        let range = self.value_range(window)?;
        let out_dir = self.output_dir();
        fs::create_dir_all(&out_dir)?;
        info!(
            out_dir = %out_dir.display(),
            first_year = window.first,
            last_year = window.last,
            columns = range.len(),
            "Cutting result files"
        );

        let mut files = Vec::with_capacity(self.inventory.files.len());
        let mut paths = Vec::with_capacity(self.inventory.files.len());
        for (metric, path) in &self.inventory.files {
            let file_name = path.file_name().ok_or_else(|| {
                AggregationError::NoInput(format!("{} is not a file", path.display()))
            })?;
            let out_path = out_dir.join(file_name);
            prepare_output(&out_path, self.config.overwrite)?;

            let writer = WriterBuilder::new()
                .delimiter(b'\t')
                .has_headers(false)
                .flexible(true)
                .from_path(&out_path)?;
            let lines = BufReader::new(File::open(path)?).lines();
            info!(path = %out_path.display(), metric = %metric, "Created cut file");

            files.push(CutFile {
                metric: *metric,
                lines,
                writer,
            });
            paths.push(out_path);
        }

        let nfields = self.inventory.nfields;
        let mut progress =
            ProgressReporter::new(self.config.progress_interval, self.inventory.data_lines());
        let mut line_no = 0;

        while let Some(lines) = next_lines(&mut files)? {
            line_no += 1;
            if line_no == 1 {
                for (file, line) in files.iter_mut().zip(&lines) {
                    file.writer.write_record(cut_fields(&split_fields(line), &range))?;
                }
                continue;
            }

            self.state.set(PipelineState::PerCellAccumulate);
            let parsed = lines
                .iter()
                .map(|line| parse_record(line, nfields, line_no))
                .collect::<Result<Vec<_>>>();
            let area_km2 = match parsed {
                Ok(records) => records.first().map(|r| r.prefix.area_km2).unwrap_or_default(),
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, "Skipping bad line");
                    self.budget.charge(&mut self.summary)?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            self.state.set(PipelineState::Writing);
            for (file, line) in files.iter_mut().zip(&lines) {
                file.writer.write_record(cut_fields(&split_fields(line), &range))?;
            }
            self.summary.record_completed(area_km2);
            progress.update(&self.summary);
        }

        for file in &mut files {
            file.writer.flush()?;
            debug!(metric = %file.metric, "Closed cut file");
        }
        Ok(paths)
    }
}

/// Next line of every file, `None` once any file is exhausted.
fn next_lines(files: &mut [CutFile]) -> Result<Option<Vec<String>>> {
    let mut lines = Vec::with_capacity(files.len());
    for file in files.iter_mut() {
        match file.lines.next() {
            Some(line) => lines.push(line?),
            None => return Ok(None),
        }
    }
    Ok(Some(lines))
}

/// The prefix fields followed by the value fields in `range`.
fn cut_fields<'a>(fields: &[&'a str], range: &Range<usize>) -> Vec<&'a str> {
    let prefix_len = PREFIX_LEN.min(fields.len());
    let start = (PREFIX_LEN + range.start).min(fields.len());
    let end = (PREFIX_LEN + range.end).min(fields.len());

    let mut cut = Vec::with_capacity(prefix_len + end - start);
    cut.extend_from_slice(&fields[..prefix_len]);
    cut.extend_from_slice(&fields[start..end]);
    cut
}
