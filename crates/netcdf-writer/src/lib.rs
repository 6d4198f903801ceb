//! Raster assembly for Spatial ECOSSE results.
//!
//! A [`DatasetSpec`] declares the layout, axes and variables of an output
//! raster. [`RasterGridWriter`] validates coordinates, indices and series
//! lengths and passes values on to a [`GridSink`]: [`NetCdfSink`] writes a
//! NetCDF file through the native netcdf library, [`MemorySink`] keeps the
//! arrays in memory.
//!
//! # Implementation Notes
//!
//! The netcdf library wraps libnetcdf/HDF5, which print diagnostics to
//! stderr unless silenced; see [`silence_hdf5_errors`].

pub mod dataset;
pub mod error;
pub mod native;
pub mod sink;
pub mod writer;

pub use dataset::{DatasetSpec, Layout, VarShape, VarType, VariableSpec, IMISS_VALUE, MISSING_VALUE};
pub use error::{WriterError, WriterResult};
pub use native::{prepare_output_path, silence_hdf5_errors, NetCdfSink};
pub use sink::{GridSink, MemorySink};
pub use writer::RasterGridWriter;
