//! Error types for the aggregation crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while aggregating simulation results.
#[derive(Error, Debug)]
pub enum AggregationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Raster writer error: {0}")]
    Writer(#[from] netcdf_writer::WriterError),

    #[error(transparent)]
    Common(#[from] ecosse_common::CommonError),

    /// A data line that does not match the run's declared layout
    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    /// SUMMARY.OUT that cannot be used for the cell
    #[error("Unusable simulation result {}: {reason}", path.display())]
    UnusableResult { path: PathBuf, reason: String },

    #[error("Manifest not found: {}", .0.display())]
    ManifestNotFound(PathBuf),

    #[error("Corrupt manifest {}: {reason}", path.display())]
    ManifestCorrupt { path: PathBuf, reason: String },

    #[error("Coordinate ({lat}, {lon}) outside the output grid")]
    OutOfBoundsCoordinate { lat: f64, lon: f64 },

    #[error("Series for {metric} has {len} values, expected {expected}")]
    SeriesLengthMismatch {
        metric: String,
        len: usize,
        expected: usize,
    },

    #[error("Aborting after {failures} failures (limit {max_failures})")]
    TooManyFailures { failures: usize, max_failures: usize },

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("No input found: {0}")]
    NoInput(String),

    #[error("Output file already exists: {}", .0.display())]
    OutputExists(PathBuf),
}

impl AggregationError {
    /// Whether the error only affects the record or cell being processed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AggregationError::MalformedRecord { .. }
                | AggregationError::UnusableResult { .. }
                | AggregationError::ManifestNotFound(_)
                | AggregationError::ManifestCorrupt { .. }
                | AggregationError::OutOfBoundsCoordinate { .. }
                | AggregationError::SeriesLengthMismatch { .. }
        )
    }
}

/// Result type for aggregation operations.
pub type Result<T> = std::result::Result<T, AggregationError>;
