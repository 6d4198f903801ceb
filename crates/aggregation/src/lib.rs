//! Aggregation of Spatial ECOSSE simulation results.
//!
//! Turns the per-soil `SUMMARY.OUT` files of a spatial simulation into
//! per-metric result files, and those into gridded NetCDF datasets.
//!
//! # Architecture
//!
//! This crate is used by the `post-processor` service. It handles:
//!
//! - Study definitions and run configuration
//! - Reading SUMMARY.OUT files, soil share manifests and result files
//! - Area-weighted compositing of dominant soils into cell results
//! - Unit conversion, annual rollups and CO2 equivalents
//! - The CSV, year-window cut and NetCDF pipeline stages, with failure
//!   budget and progress

pub mod compositor;
pub mod config;
pub mod error;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod records;
pub mod scan;
pub mod summary;
pub mod transform;

// Re-exports
pub use compositor::{compose, CompositeResult, Composition, SoilSlots};
pub use config::{RunConfig, StudyDefinition, DEFAULT_MAX_FAILURES, DEFAULT_PROGRESS_INTERVAL};
pub use error::{AggregationError, Result};
pub use manifest::{Manifest, ManifestLocation, ManifestStore};
pub use output::CsvResultWriter;
pub use pipeline::{
    AggregationPipeline, CutPipeline, CutRun, PipelineState, RasterKind, RasterOutput,
    RasterPipeline, RasterRun, YearWindow, CUT_DIR_NAME,
};
pub use progress::{FailureBudget, ProgressReporter, RunSummary};
pub use records::{parse_record, CombinedRecord, MetricFileSet, ResultRecord, ResultsInventory};
pub use summary::{read_summary, DominantSoilResult};
