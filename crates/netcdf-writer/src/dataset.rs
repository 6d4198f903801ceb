//! Declarative description of a raster dataset: layout, axes, variables
//! and global attributes.
//!
//! Two layouts are supported:
//!
//! - [`Layout::Raw`]: dimensions `lat, lon, time[, year]`, data variables
//!   shaped `(lat, lon, time)` and a plain month-index time axis.
//! - [`Layout::Coards`]: dimensions `latitude, longitude, time, bnds`, data
//!   variables shaped `(time, latitude, longitude)` and a mid-month time axis
//!   in `days since 1900-01-01` with `time_bnds`.

use ecosse_common::{LatLonGrid, MonthlyTimeAxis};

/// Fill value of every floating point data variable.
pub const MISSING_VALUE: f32 = -999.0;

/// Fill value of integer data variables.
pub const IMISS_VALUE: i32 = -999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Raw,
    Coards,
}

impl Layout {
    pub fn lat_dim(&self) -> &'static str {
        match self {
            Layout::Raw => "lat",
            Layout::Coards => "latitude",
        }
    }

    pub fn lon_dim(&self) -> &'static str {
        match self {
            Layout::Raw => "lon",
            Layout::Coards => "longitude",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    F32,
    I32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarShape {
    /// One value per grid cell
    Surface,
    /// One value per grid cell and timestep
    Series,
    /// One value per grid cell and year (raw layout only)
    Annual,
}

impl VarShape {
    pub fn label(&self) -> &'static str {
        match self {
            VarShape::Surface => "a surface",
            VarShape::Series => "a time series",
            VarShape::Annual => "an annual series",
        }
    }
}

/// One data variable of the dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    pub name: String,
    pub shape: VarShape,
    pub var_type: VarType,
    pub units: String,
    pub long_name: Option<String>,
}

impl VariableSpec {
    pub fn surface(name: impl Into<String>, units: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shape: VarShape::Surface,
            var_type: VarType::F32,
            units: units.into(),
            long_name: None,
        }
    }

    pub fn series(name: impl Into<String>, units: impl Into<String>) -> Self {
        Self {
            shape: VarShape::Series,
            ..Self::surface(name, units)
        }
    }

    pub fn annual(name: impl Into<String>, units: impl Into<String>) -> Self {
        Self {
            shape: VarShape::Annual,
            ..Self::surface(name, units)
        }
    }

    pub fn integer(mut self) -> Self {
        self.var_type = VarType::I32;
        self
    }

    pub fn with_long_name(mut self, long_name: impl Into<String>) -> Self {
        self.long_name = Some(long_name.into());
        self
    }
}

/// Full definition of a raster dataset prior to creation.
#[derive(Debug, Clone)]
pub struct DatasetSpec {
    pub layout: Layout,
    pub grid: LatLonGrid,
    pub time_axis: MonthlyTimeAxis,
    /// Length of the `time` dimension
    pub time_len: usize,
    pub variables: Vec<VariableSpec>,
    pub attributes: Vec<(String, String)>,
}

impl DatasetSpec {
    /// Raw layout with a `time` dimension of `time_len` month indices.
    pub fn raw(grid: LatLonGrid, time_axis: MonthlyTimeAxis, time_len: usize) -> Self {
        Self {
            layout: Layout::Raw,
            grid,
            time_axis,
            time_len,
            variables: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// COARDS layout with one time step per month of `time_axis`.
    pub fn coards(grid: LatLonGrid, time_axis: MonthlyTimeAxis) -> Self {
        Self {
            layout: Layout::Coards,
            grid,
            time_len: time_axis.num_months,
            time_axis,
            variables: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn with_variable(mut self, variable: VariableSpec) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn variable(&self, name: &str) -> Option<&VariableSpec> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Number of years on the annual axis.
    pub fn num_years(&self) -> usize {
        self.time_axis.num_years()
    }

    pub fn has_annual_variables(&self) -> bool {
        self.variables.iter().any(|v| v.shape == VarShape::Annual)
    }

    /// Declared third-axis length of a variable shape.
    pub fn depth(&self, shape: VarShape) -> usize {
        match shape {
            VarShape::Surface => 1,
            VarShape::Series => self.time_len,
            VarShape::Annual => self.num_years(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecosse_common::BoundingBox;

    fn grid() -> LatLonGrid {
        LatLonGrid::from_bbox(&BoundingBox::new(0.0, 50.0, 1.0, 51.0), 0.5).unwrap()
    }

    #[test]
    fn test_raw_depths() {
        let spec = DatasetSpec::raw(grid(), MonthlyTimeAxis::new(2020, 24), 26)
            .with_variable(VariableSpec::series("soc", "kg/hectare"))
            .with_variable(VariableSpec::annual("soc_yrs", "kg/hectare"));

        assert_eq!(spec.depth(VarShape::Series), 26);
        assert_eq!(spec.depth(VarShape::Annual), 2);
        assert_eq!(spec.depth(VarShape::Surface), 1);
        assert!(spec.has_annual_variables());
        assert_eq!(spec.layout.lat_dim(), "lat");
    }

    #[test]
    fn test_coards_time_len_follows_axis() {
        let spec = DatasetSpec::coards(grid(), MonthlyTimeAxis::new(2020, 36));
        assert_eq!(spec.time_len, 36);
        assert_eq!(spec.layout.lon_dim(), "longitude");
        assert!(!spec.has_annual_variables());
    }

    #[test]
    fn test_variable_builders() {
        let var = VariableSpec::surface("mu_global", "HWSD global mapping unit").integer();
        assert_eq!(var.var_type, VarType::I32);
        assert_eq!(var.shape, VarShape::Surface);

        let var = VariableSpec::series("fco2e_soil_ara", "kg C m-2 yr-1")
            .with_long_name("flux co2e Arable");
        assert_eq!(var.long_name.as_deref(), Some("flux co2e Arable"));
    }
}
