//! Regular latitude/longitude raster grid built from a snapped bounding box.

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::error::{CommonError, CommonResult};

/// A regular lat/lon grid whose axes run from the snapped lower-left corner
/// to the snapped upper-right corner, both ends inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatLonGrid {
    /// Snapped extent of the grid
    pub extent: BoundingBox,
    /// Cell size in degrees
    pub resolution: f64,
    /// Number of latitude points
    pub n_lat: usize,
    /// Number of longitude points
    pub n_lon: usize,
}

impl LatLonGrid {
    /// Snap `bbox` outward to `resolution` and size the axes to cover it.
    pub fn from_bbox(bbox: &BoundingBox, resolution: f64) -> CommonResult<Self> {
        bbox.validate()?;
        let extent = bbox.snap_outward(resolution)?;

        let n_lat = (extent.height() / resolution).round() as usize + 1;
        let n_lon = (extent.width() / resolution).round() as usize + 1;

        Ok(Self {
            extent,
            resolution,
            n_lat,
            n_lon,
        })
    }

    pub fn max_lat_index(&self) -> usize {
        self.n_lat - 1
    }

    pub fn max_lon_index(&self) -> usize {
        self.n_lon - 1
    }

    /// Total number of grid points.
    pub fn len(&self) -> usize {
        self.n_lat * self.n_lon
    }

    pub fn is_empty(&self) -> bool {
        self.n_lat == 0 || self.n_lon == 0
    }

    /// Resolve a coordinate to `(lat_index, lon_index)`.
    ///
    /// Indices are `round((v - origin) / resolution)` and must fall within
    /// `[0, max_index]` on both axes.
    pub fn resolve_index(&self, lat: f64, lon: f64) -> CommonResult<(usize, usize)> {
        let lat_index = ((lat - self.extent.min_lat) / self.resolution).round() as i64;
        let lon_index = ((lon - self.extent.min_lon) / self.resolution).round() as i64;

        let in_range = |idx: i64, max: usize| idx >= 0 && idx <= max as i64;
        if !lat.is_finite()
            || !lon.is_finite()
            || !in_range(lat_index, self.max_lat_index())
            || !in_range(lon_index, self.max_lon_index())
        {
            return Err(CommonError::OutOfBounds {
                lat,
                lon,
                lat_index,
                lon_index,
                max_lat_index: self.max_lat_index(),
                max_lon_index: self.max_lon_index(),
            });
        }

        Ok((lat_index as usize, lon_index as usize))
    }

    /// Row-major offset of a cell in a `(lat, lon)` surface.
    pub fn flat_index(&self, lat_index: usize, lon_index: usize) -> usize {
        lat_index * self.n_lon + lon_index
    }

    /// Latitude axis values, south to north.
    pub fn latitudes(&self) -> Vec<f64> {
        (0..self.n_lat)
            .map(|i| self.extent.min_lat + i as f64 * self.resolution)
            .collect()
    }

    /// Longitude axis values, west to east.
    pub fn longitudes(&self) -> Vec<f64> {
        (0..self.n_lon)
            .map(|i| self.extent.min_lon + i as f64 * self.resolution)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn europe_grid() -> LatLonGrid {
        LatLonGrid::from_bbox(&BoundingBox::new(-10.0, 50.0, 2.0, 60.0), 0.5).unwrap()
    }

    #[test]
    fn test_axis_sizes() {
        let grid = europe_grid();
        // 49.75 ..= 60.75 and -10.25 ..= 2.75 in half-degree steps
        assert_eq!(grid.n_lat, 23);
        assert_eq!(grid.n_lon, 27);
        assert_eq!(grid.len(), 23 * 27);

        let lats = grid.latitudes();
        assert_eq!(lats[0], 49.75);
        assert_eq!(*lats.last().unwrap(), 60.75);

        let lons = grid.longitudes();
        assert_eq!(lons[0], -10.25);
        assert_eq!(*lons.last().unwrap(), 2.75);
    }

    #[test]
    fn test_resolve_interior_point() {
        let grid = europe_grid();
        let (lat_idx, lon_idx) = grid.resolve_index(52.25, -1.75).unwrap();
        assert_eq!(lat_idx, 5);
        assert_eq!(lon_idx, 17);
    }

    #[test]
    fn test_resolve_original_edges_never_extreme() {
        let grid = europe_grid();
        let bbox = BoundingBox::new(-10.0, 50.0, 2.0, 60.0);

        for (lat, lon) in [
            (bbox.min_lat, bbox.min_lon),
            (bbox.min_lat, bbox.max_lon),
            (bbox.max_lat, bbox.min_lon),
            (bbox.max_lat, bbox.max_lon),
        ] {
            let (lat_idx, lon_idx) = grid.resolve_index(lat, lon).unwrap();
            assert!(lat_idx > 0 && lat_idx < grid.max_lat_index(), "lat {}", lat);
            assert!(lon_idx > 0 && lon_idx < grid.max_lon_index(), "lon {}", lon);
        }
    }

    #[test]
    fn test_resolve_inside_snapped_box_in_range() {
        let grid = europe_grid();
        let mut lat = grid.extent.min_lat;
        while lat <= grid.extent.max_lat {
            let mut lon = grid.extent.min_lon;
            while lon <= grid.extent.max_lon {
                let (i, j) = grid.resolve_index(lat, lon).unwrap();
                assert!(i <= grid.max_lat_index());
                assert!(j <= grid.max_lon_index());
                lon += 0.125;
            }
            lat += 0.125;
        }
    }

    #[test]
    fn test_resolve_out_of_bounds() {
        let grid = europe_grid();
        assert!(matches!(
            grid.resolve_index(30.0, 0.0),
            Err(CommonError::OutOfBounds { .. })
        ));
        assert!(matches!(
            grid.resolve_index(55.0, 20.0),
            Err(CommonError::OutOfBounds { .. })
        ));
        assert!(grid.resolve_index(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_flat_index() {
        let grid = europe_grid();
        assert_eq!(grid.flat_index(0, 0), 0);
        assert_eq!(grid.flat_index(1, 0), grid.n_lon);
        assert_eq!(grid.flat_index(2, 3), 2 * grid.n_lon + 3);
    }
}
