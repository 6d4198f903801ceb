//! Error types for raster writing operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for raster writer operations.
pub type WriterResult<T> = Result<T, WriterError>;

#[derive(Error, Debug)]
pub enum WriterError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// NetCDF library error
    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    /// Coordinate outside the raster, or a bad grid definition
    #[error(transparent)]
    Grid(#[from] ecosse_common::CommonError),

    /// Series longer than the declared axis of its variable
    #[error("Series of {len} values for '{variable}' exceeds the declared length {declared}")]
    SeriesLengthMismatch {
        variable: String,
        len: usize,
        declared: usize,
    },

    /// Grid indices outside the declared dimensions
    #[error("Indices ({lat_index}, {lon_index}) outside the {n_lat}x{n_lon} grid")]
    IndexOutOfRange {
        lat_index: usize,
        lon_index: usize,
        n_lat: usize,
        n_lon: usize,
    },

    /// Variable not declared in the dataset
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    /// Variable used with the wrong shape
    #[error("Variable '{variable}' is {actual}, not {expected}")]
    ShapeMismatch {
        variable: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Output exists and overwriting was not requested
    #[error("Output file already exists: {0}")]
    OutputExists(PathBuf),

    /// Sink used before the dataset was defined
    #[error("Dataset has not been defined")]
    NotDefined,
}

impl WriterError {
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(
            self,
            WriterError::Grid(ecosse_common::CommonError::OutOfBounds { .. })
                | WriterError::IndexOutOfRange { .. }
        )
    }
}
