//! Backing stores for raster data.

use std::collections::HashMap;

use crate::dataset::{DatasetSpec, VarShape, VariableSpec, MISSING_VALUE};
use crate::error::{WriterError, WriterResult};

/// Destination of a raster dataset.
///
/// `define` is called exactly once, before any value is stored. Indices and
/// lengths passed to `put_*` have already been validated by the writer.
pub trait GridSink {
    fn define(&mut self, spec: &DatasetSpec) -> WriterResult<()>;

    fn put_surface(
        &mut self,
        variable: &VariableSpec,
        lat_index: usize,
        lon_index: usize,
        value: f64,
    ) -> WriterResult<()>;

    fn put_series(
        &mut self,
        variable: &VariableSpec,
        lat_index: usize,
        lon_index: usize,
        values: &[f64],
    ) -> WriterResult<()>;

    fn flush(&mut self) -> WriterResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct MemoryVariable {
    depth: usize,
    data: Vec<f64>,
}

/// In-memory sink holding every variable as a dense `(lat, lon, depth)` array.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    n_lat: usize,
    n_lon: usize,
    variables: HashMap<String, MemoryVariable>,
    attributes: Vec<(String, String)>,
    latitudes: Vec<f64>,
    longitudes: Vec<f64>,
    defined: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn offset(&self, depth: usize, lat_index: usize, lon_index: usize) -> usize {
        (lat_index * self.n_lon + lon_index) * depth
    }

    fn variable_mut(&mut self, name: &str) -> WriterResult<&mut MemoryVariable> {
        self.variables
            .get_mut(name)
            .ok_or_else(|| WriterError::UnknownVariable(name.to_string()))
    }

    /// Stored series, fill values included, or `None` if the variable is unknown.
    pub fn series(&self, name: &str, lat_index: usize, lon_index: usize) -> Option<Vec<f64>> {
        let var = self.variables.get(name)?;
        let start = self.offset(var.depth, lat_index, lon_index);
        var.data.get(start..start + var.depth).map(<[f64]>::to_vec)
    }

    /// Stored surface value; `None` for unknown variables or fill values.
    pub fn surface(&self, name: &str, lat_index: usize, lon_index: usize) -> Option<f64> {
        let var = self.variables.get(name)?;
        let value = *var.data.get(self.offset(var.depth, lat_index, lon_index))?;
        (value != f64::from(MISSING_VALUE)).then_some(value)
    }

    /// Number of cells of `name` holding at least one non-fill value.
    pub fn populated_cells(&self, name: &str) -> usize {
        let fill = f64::from(MISSING_VALUE);
        self.variables
            .get(name)
            .map(|var| {
                var.data
                    .chunks(var.depth.max(1))
                    .filter(|cell| cell.iter().any(|v| *v != fill))
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn latitudes(&self) -> &[f64] {
        &self.latitudes
    }

    pub fn longitudes(&self) -> &[f64] {
        &self.longitudes
    }
}

impl GridSink for MemorySink {
    fn define(&mut self, spec: &DatasetSpec) -> WriterResult<()> {
        self.n_lat = spec.grid.n_lat;
        self.n_lon = spec.grid.n_lon;
        self.latitudes = spec.grid.latitudes();
        self.longitudes = spec.grid.longitudes();
        self.attributes = spec.attributes.clone();

        let cells = spec.grid.len();
        for var in &spec.variables {
            let depth = spec.depth(var.shape);
            self.variables.insert(
                var.name.clone(),
                MemoryVariable {
                    depth,
                    data: vec![f64::from(MISSING_VALUE); cells * depth],
                },
            );
        }

        self.defined = true;
        Ok(())
    }

    fn put_surface(
        &mut self,
        variable: &VariableSpec,
        lat_index: usize,
        lon_index: usize,
        value: f64,
    ) -> WriterResult<()> {
        if !self.defined {
            return Err(WriterError::NotDefined);
        }
        let offset = self.offset(1, lat_index, lon_index);
        let var = self.variable_mut(&variable.name)?;
        var.data[offset] = value;
        Ok(())
    }

    fn put_series(
        &mut self,
        variable: &VariableSpec,
        lat_index: usize,
        lon_index: usize,
        values: &[f64],
    ) -> WriterResult<()> {
        if !self.defined {
            return Err(WriterError::NotDefined);
        }
        debug_assert!(variable.shape != VarShape::Surface);

        let depth = self
            .variables
            .get(&variable.name)
            .map(|v| v.depth)
            .ok_or_else(|| WriterError::UnknownVariable(variable.name.clone()))?;
        let start = self.offset(depth, lat_index, lon_index);
        let var = self.variable_mut(&variable.name)?;
        var.data[start..start + values.len()].copy_from_slice(values);
        Ok(())
    }
}
