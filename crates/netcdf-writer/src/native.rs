//! NetCDF-backed sink using the native netcdf library.
//!
//! Creating a sink removes an existing file of the same name when overwrite
//! is requested, otherwise it refuses to proceed. The file stays open for
//! writing until the sink is dropped, which closes it.

use std::path::{Path, PathBuf};
use std::sync::Once;

use tracing::info;

use crate::dataset::{
    DatasetSpec, Layout, VarShape, VarType, VariableSpec, IMISS_VALUE, MISSING_VALUE,
};
use crate::error::{WriterError, WriterResult};
use crate::sink::GridSink;

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose diagnostics to stderr even when errors
/// are handled by the Rust code. This disables that output by calling
/// H5Eset_auto2 with null handlers. It only needs to be called once per
/// process, but is safe to call multiple times.
///
/// Call this early in `main()` before any HDF5/NetCDF operations occur.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and we're passing null pointers
        // to disable error output, which is a documented valid use.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Remove `path` if it exists and `overwrite` is set.
pub fn prepare_output_path(path: &Path, overwrite: bool) -> WriterResult<()> {
    if path.exists() {
        if !overwrite {
            return Err(WriterError::OutputExists(path.to_path_buf()));
        }
        std::fs::remove_file(path)?;
        info!(path = %path.display(), "Deleted existing output file");
    }
    Ok(())
}

pub struct NetCdfSink {
    file: netcdf::FileMut,
    path: PathBuf,
    layout: Option<Layout>,
}

impl NetCdfSink {
    pub fn create(path: impl AsRef<Path>, overwrite: bool) -> WriterResult<Self> {
        silence_hdf5_errors();

        let path = path.as_ref();
        prepare_output_path(path, overwrite)?;
        let file = netcdf::create(path)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            layout: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn layout(&self) -> WriterResult<Layout> {
        self.layout.ok_or(WriterError::NotDefined)
    }

    fn variable_mut(&mut self, name: &str) -> WriterResult<netcdf::VariableMut<'_>> {
        self.file
            .variable_mut(name)
            .ok_or_else(|| WriterError::UnknownVariable(name.to_string()))
    }

    fn define_axes(&mut self, spec: &DatasetSpec) -> WriterResult<()> {
        let layout = spec.layout;
        let grid = &spec.grid;
        let (lat_dim, lon_dim) = (layout.lat_dim(), layout.lon_dim());

        self.file.add_dimension(lat_dim, grid.n_lat)?;
        self.file.add_dimension(lon_dim, grid.n_lon)?;
        self.file.add_dimension("time", spec.time_len)?;

        let lats: Vec<f32> = grid.latitudes().iter().map(|&v| v as f32).collect();
        let lons: Vec<f32> = grid.longitudes().iter().map(|&v| v as f32).collect();

        {
            let mut var = self.file.add_variable::<f32>("latitude", &[lat_dim])?;
            var.put_attribute("long_name", "latitude")?;
            match layout {
                Layout::Raw => {
                    let units = format!("degrees of latitude North to South in {} degree steps", grid.resolution);
                    var.put_attribute("units", units.as_str())?;
                }
                Layout::Coards => {
                    var.put_attribute("units", "degrees_north")?;
                    var.put_attribute("axis", "Y")?;
                }
            }
            var.put_values(&lats, ..)?;
        }

        {
            let mut var = self.file.add_variable::<f32>("longitude", &[lon_dim])?;
            var.put_attribute("long_name", "longitude")?;
            match layout {
                Layout::Raw => {
                    let units = format!("degrees of longitude West to East in {} degree steps", grid.resolution);
                    var.put_attribute("units", units.as_str())?;
                }
                Layout::Coards => {
                    var.put_attribute("units", "degrees_east")?;
                    var.put_attribute("axis", "X")?;
                }
            }
            var.put_values(&lons, ..)?;
        }

        match layout {
            Layout::Raw => {
                let months: Vec<i32> = (0..spec.time_len as i32).collect();
                let mut var = self.file.add_variable::<i32>("time", &["time"])?;
                let units = format!(
                    "months from January {} - {} years",
                    spec.time_axis.start_year,
                    spec.num_years()
                );
                var.put_attribute("units", units.as_str())?;
                var.put_values(&months, ..)?;

                if spec.has_annual_variables() {
                    self.file.add_dimension("year", spec.num_years())?;
                    let years: Vec<i32> = (0..spec.num_years() as i32)
                        .map(|i| spec.time_axis.start_year + i)
                        .collect();
                    let mut var = self.file.add_variable::<i32>("year", &["year"])?;
                    var.put_attribute("units", "calendar year")?;
                    var.put_values(&years, ..)?;
                }
            }
            Layout::Coards => {
                self.file.add_dimension("bnds", 2)?;
                let coords = spec.time_axis.monthly_coordinates();

                let mids: Vec<f32> = coords.mid_points.iter().map(|&v| v as f32).collect();
                let mut var = self.file.add_variable::<f32>("time", &["time"])?;
                var.put_attribute("units", ecosse_common::MonthlyTimeAxis::time_units())?;
                var.put_attribute("calendar", "standard")?;
                var.put_attribute("axis", "T")?;
                var.put_attribute("bounds", "time_bnds")?;
                var.put_values(&mids, ..)?;

                let bounds: Vec<f32> = coords
                    .starts
                    .iter()
                    .zip(&coords.ends)
                    .flat_map(|(&s, &e)| [s as f32, e as f32])
                    .collect();
                let mut var = self.file.add_variable::<f32>("time_bnds", &["time", "bnds"])?;
                var.put_attribute("_FillValue", MISSING_VALUE)?;
                var.put_values(&bounds, ..)?;
            }
        }

        Ok(())
    }

    fn define_variable(&mut self, layout: Layout, var: &VariableSpec) -> WriterResult<()> {
        let (lat_dim, lon_dim) = (layout.lat_dim(), layout.lon_dim());
        let dims: Vec<&str> = match (var.shape, layout) {
            (VarShape::Surface, _) => vec![lat_dim, lon_dim],
            (VarShape::Series, Layout::Raw) => vec![lat_dim, lon_dim, "time"],
            (VarShape::Series, Layout::Coards) => vec!["time", lat_dim, lon_dim],
            (VarShape::Annual, _) => vec![lat_dim, lon_dim, "year"],
        };

        match var.var_type {
            VarType::F32 => {
                let mut nc_var = self.file.add_variable::<f32>(&var.name, &dims)?;
                nc_var.put_attribute("_FillValue", MISSING_VALUE)?;
                nc_var.put_attribute("missing_value", MISSING_VALUE)?;
                nc_var.put_attribute("units", var.units.as_str())?;
                if let Some(long_name) = &var.long_name {
                    nc_var.put_attribute("long_name", long_name.as_str())?;
                }
            }
            VarType::I32 => {
                let mut nc_var = self.file.add_variable::<i32>(&var.name, &dims)?;
                nc_var.put_attribute("_FillValue", IMISS_VALUE)?;
                nc_var.put_attribute("missing_value", IMISS_VALUE)?;
                nc_var.put_attribute("units", var.units.as_str())?;
                if let Some(long_name) = &var.long_name {
                    nc_var.put_attribute("long_name", long_name.as_str())?;
                }
            }
        }
        Ok(())
    }
}

impl GridSink for NetCdfSink {
    fn define(&mut self, spec: &DatasetSpec) -> WriterResult<()> {
        for (name, value) in &spec.attributes {
            self.file.add_attribute(name, value.as_str())?;
        }

        self.define_axes(spec)?;
        for var in &spec.variables {
            self.define_variable(spec.layout, var)?;
        }

        self.layout = Some(spec.layout);
        info!(path = %self.path.display(), "Created NetCDF file");
        Ok(())
    }

    fn put_surface(
        &mut self,
        variable: &VariableSpec,
        lat_index: usize,
        lon_index: usize,
        value: f64,
    ) -> WriterResult<()> {
        self.layout()?;
        let mut var = self.variable_mut(&variable.name)?;
        match variable.var_type {
            VarType::F32 => var.put_value(value as f32, [lat_index, lon_index])?,
            VarType::I32 => var.put_value(value as i32, [lat_index, lon_index])?,
        }
        Ok(())
    }

    fn put_series(
        &mut self,
        variable: &VariableSpec,
        lat_index: usize,
        lon_index: usize,
        values: &[f64],
    ) -> WriterResult<()> {
        let layout = self.layout()?;
        let n = values.len();
        let values: Vec<f32> = values.iter().map(|&v| v as f32).collect();

        let mut var = self.variable_mut(&variable.name)?;
        match (variable.shape, layout) {
            (VarShape::Series, Layout::Coards) => {
                var.put_values(&values, (0..n, lat_index, lon_index))?
            }
            _ => var.put_values(&values, (lat_index, lon_index, 0..n))?,
        }
        Ok(())
    }
}
