//! Error types for the shared domain types.

use thiserror::Error;

/// Result type alias using CommonError.
pub type CommonResult<T> = Result<T, CommonError>;

#[derive(Debug, Error)]
pub enum CommonError {
    #[error("Invalid simulation directory name: {0}")]
    InvalidSimulationDir(String),

    #[error("Invalid bounding box: {0}")]
    InvalidBbox(String),

    #[error("Invalid resolution: {0}")]
    InvalidResolution(f64),

    #[error(
        "Coordinate ({lat}, {lon}) resolves to indices ({lat_index}, {lon_index}) outside 0..={max_lat_index}, 0..={max_lon_index}"
    )]
    OutOfBounds {
        lat: f64,
        lon: f64,
        lat_index: i64,
        lon_index: i64,
        max_lat_index: usize,
        max_lon_index: usize,
    },

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Unknown land use: {0}")]
    UnknownLandUse(String),
}
