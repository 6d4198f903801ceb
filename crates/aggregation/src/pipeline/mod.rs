//! Pipeline stages turning simulation output into result files and rasters.
//!
//! - [`aggregate`]: simulation directories to per-metric CSV files
//! - [`raster`]: per-metric CSV files to raw, COARDS or CO2-equivalent NetCDF
//! - [`cut`]: per-metric CSV files trimmed to a window of years

pub mod aggregate;
pub mod cut;
pub mod raster;

use std::fmt;

use tracing::debug;

pub use aggregate::AggregationPipeline;
pub use cut::{CutPipeline, CutRun, YearWindow, CUT_DIR_NAME};
pub use raster::{RasterKind, RasterOutput, RasterPipeline, RasterRun};

/// Lifecycle of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Scanning,
    PerCellAccumulate,
    CellComplete,
    Writing,
    Done,
    /// Terminated by the failure limit
    Aborted,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Init => "init",
            PipelineState::Scanning => "scanning",
            PipelineState::PerCellAccumulate => "accumulate",
            PipelineState::CellComplete => "cell-complete",
            PipelineState::Writing => "writing",
            PipelineState::Done => "done",
            PipelineState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Current state of a run, with transitions logged at debug level.
#[derive(Debug)]
struct StateTracker {
    state: PipelineState,
}

impl StateTracker {
    fn new() -> Self {
        Self {
            state: PipelineState::Init,
        }
    }

    fn get(&self) -> PipelineState {
        self.state
    }

    fn set(&mut self, next: PipelineState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Pipeline state");
            self.state = next;
        }
    }
}
