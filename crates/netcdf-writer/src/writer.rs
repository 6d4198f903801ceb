//! Coordinate-indexed raster writer.

use tracing::debug;

use crate::dataset::{DatasetSpec, VarShape, VariableSpec};
use crate::error::{WriterError, WriterResult};
use crate::sink::GridSink;

/// Writes per-cell values into a raster dataset held by a [`GridSink`].
///
/// The sink is defined from the [`DatasetSpec`] on creation. Every write is
/// checked against the grid dimensions and the declared axis length of its
/// variable before it reaches the sink.
pub struct RasterGridWriter<S: GridSink> {
    spec: DatasetSpec,
    sink: S,
    cells_written: usize,
}

impl<S: GridSink> RasterGridWriter<S> {
    pub fn create(spec: DatasetSpec, mut sink: S) -> WriterResult<Self> {
        sink.define(&spec)?;
        debug!(
            layout = ?spec.layout,
            n_lat = spec.grid.n_lat,
            n_lon = spec.grid.n_lon,
            time_len = spec.time_len,
            variables = spec.variables.len(),
            "Defined raster dataset"
        );

        Ok(Self {
            spec,
            sink,
            cells_written: 0,
        })
    }

    pub fn spec(&self) -> &DatasetSpec {
        &self.spec
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Number of cells passed to [`mark_cell_written`](Self::mark_cell_written).
    pub fn cells_written(&self) -> usize {
        self.cells_written
    }

    pub fn mark_cell_written(&mut self) {
        self.cells_written += 1;
    }

    /// Resolve a coordinate to grid indices.
    pub fn resolve_index(&self, lat: f64, lon: f64) -> WriterResult<(usize, usize)> {
        Ok(self.spec.grid.resolve_index(lat, lon)?)
    }

    fn check_indices(&self, lat_index: usize, lon_index: usize) -> WriterResult<()> {
        let grid = &self.spec.grid;
        if lat_index >= grid.n_lat || lon_index >= grid.n_lon {
            return Err(WriterError::IndexOutOfRange {
                lat_index,
                lon_index,
                n_lat: grid.n_lat,
                n_lon: grid.n_lon,
            });
        }
        Ok(())
    }

    fn variable(&self, name: &str, allowed: &[VarShape]) -> WriterResult<VariableSpec> {
        let var = self
            .spec
            .variable(name)
            .ok_or_else(|| WriterError::UnknownVariable(name.to_string()))?;

        if !allowed.contains(&var.shape) {
            return Err(WriterError::ShapeMismatch {
                variable: name.to_string(),
                expected: allowed.first().map(VarShape::label).unwrap_or_default(),
                actual: var.shape.label(),
            });
        }
        Ok(var.clone())
    }

    /// Store a single value of a surface variable.
    pub fn write_surface(
        &mut self,
        lat_index: usize,
        lon_index: usize,
        name: &str,
        value: f64,
    ) -> WriterResult<()> {
        self.check_indices(lat_index, lon_index)?;
        let var = self.variable(name, &[VarShape::Surface])?;
        self.sink.put_surface(&var, lat_index, lon_index, value)
    }

    /// Check that a series of `len` values fits variable `name`, so every
    /// value of a cell can be validated before the first write.
    pub fn check_series(&self, name: &str, len: usize) -> WriterResult<()> {
        let var = self.variable(name, &[VarShape::Series, VarShape::Annual])?;
        let declared = self.spec.depth(var.shape);
        if len > declared {
            return Err(WriterError::SeriesLengthMismatch {
                variable: name.to_string(),
                len,
                declared,
            });
        }
        Ok(())
    }

    /// Store a time or annual series starting at the first step of its axis.
    ///
    /// Fails with `SeriesLengthMismatch` when the series is longer than the
    /// declared axis; shorter series leave the remaining steps at fill.
    pub fn write_series(
        &mut self,
        lat_index: usize,
        lon_index: usize,
        name: &str,
        series: &[f64],
    ) -> WriterResult<()> {
        self.check_indices(lat_index, lon_index)?;
        self.check_series(name, series.len())?;
        let var = self.variable(name, &[VarShape::Series, VarShape::Annual])?;
        self.sink.put_series(&var, lat_index, lon_index, series)
    }

    /// Flush and hand back the sink.
    pub fn finish(mut self) -> WriterResult<S> {
        self.sink.flush()?;
        debug!(cells = self.cells_written, "Finished raster dataset");
        Ok(self.sink)
    }
}
