//! Common types shared across the Spatial ECOSSE post-processing crates.

pub mod bbox;
pub mod cell;
pub mod error;
pub mod grid;
pub mod metric;
pub mod time;

pub use bbox::BoundingBox;
pub use cell::{CellId, GridCell, LandUse, SimulationDir, MAX_NUM_DOM_SOILS};
pub use error::{CommonError, CommonResult};
pub use grid::LatLonGrid;
pub use metric::{Metric, MetricKind, MetricSet};
pub use time::{MonthlyTimeAxis, Timestep, MAX_FIELDS_MONTHLY};
