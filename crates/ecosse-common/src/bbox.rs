//! Geographic bounding boxes and outward snapping to a grid resolution.

use serde::{Deserialize, Serialize};

use crate::error::{CommonError, CommonResult};

/// A geographic bounding box in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Build from the `[ll_lon, ll_lat, ur_lon, ur_lat]` layout of a study definition.
    pub fn from_corners(corners: &[f64]) -> CommonResult<Self> {
        let [min_lon, min_lat, max_lon, max_lat] = corners else {
            return Err(CommonError::InvalidBbox(format!(
                "expected 4 corner values, found {}",
                corners.len()
            )));
        };

        let bbox = Self::new(*min_lon, *min_lat, *max_lon, *max_lat);
        bbox.validate()?;
        Ok(bbox)
    }

    /// Check that the corners are finite and correctly ordered.
    pub fn validate(&self) -> CommonResult<()> {
        let corners = [self.min_lon, self.min_lat, self.max_lon, self.max_lat];
        if corners.iter().any(|c| !c.is_finite()) {
            return Err(CommonError::InvalidBbox(format!("{:?}", corners)));
        }
        if self.min_lon > self.max_lon || self.min_lat > self.max_lat {
            return Err(CommonError::InvalidBbox(format!(
                "lower-left ({}, {}) lies beyond upper-right ({}, {})",
                self.min_lon, self.min_lat, self.max_lon, self.max_lat
            )));
        }
        Ok(())
    }

    /// Width in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Height in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Check if a point lies within the box (edges inclusive).
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }

    /// Expand the box outward onto the half-cell offset lattice of `resolution`.
    ///
    /// The lower-left corner moves to `res * floor(ll / res) - res / 2` and the
    /// upper-right corner to `res * ceil(ur / res) + res + res / 2`, so every
    /// coordinate of the original box lies strictly inside the snapped box.
    pub fn snap_outward(&self, resolution: f64) -> CommonResult<Self> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(CommonError::InvalidResolution(resolution));
        }

        let half = resolution / 2.0;
        let lower = |v: f64| resolution * (v / resolution).floor() - half;
        let upper = |v: f64| resolution * (v / resolution).ceil() + resolution + half;

        Ok(Self {
            min_lon: lower(self.min_lon),
            min_lat: lower(self.min_lat),
            max_lon: upper(self.max_lon),
            max_lat: upper(self.max_lat),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_corners() {
        let bbox = BoundingBox::from_corners(&[-10.0, 50.0, 2.0, 60.0]).unwrap();
        assert_eq!(bbox, BoundingBox::new(-10.0, 50.0, 2.0, 60.0));
        assert_eq!(bbox.width(), 12.0);
        assert_eq!(bbox.height(), 10.0);
    }

    #[test]
    fn test_from_corners_wrong_length() {
        assert!(BoundingBox::from_corners(&[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_from_corners_inverted() {
        assert!(BoundingBox::from_corners(&[5.0, 50.0, 2.0, 60.0]).is_err());
    }

    #[test]
    fn test_snap_outward_aligned_corners() {
        let bbox = BoundingBox::new(-10.0, 50.0, 2.0, 60.0);
        let snapped = bbox.snap_outward(0.5).unwrap();

        assert_eq!(snapped.min_lon, -10.25);
        assert_eq!(snapped.min_lat, 49.75);
        assert_eq!(snapped.max_lon, 2.75);
        assert_eq!(snapped.max_lat, 60.75);
    }

    #[test]
    fn test_snap_outward_unaligned_corners() {
        let bbox = BoundingBox::new(-9.8, 50.3, 1.6, 59.2);
        let snapped = bbox.snap_outward(0.5).unwrap();

        assert_eq!(snapped.min_lon, -10.25);
        assert_eq!(snapped.min_lat, 49.75);
        assert_eq!(snapped.max_lon, 2.75);
        assert_eq!(snapped.max_lat, 60.25);
    }

    #[test]
    fn test_snap_outward_contains_original() {
        let bbox = BoundingBox::new(-3.7, 51.1, -1.2, 53.9);
        for res in [0.5, 0.25, 1.0 / 120.0] {
            let snapped = bbox.snap_outward(res).unwrap();
            assert!(snapped.min_lon < bbox.min_lon);
            assert!(snapped.min_lat < bbox.min_lat);
            assert!(snapped.max_lon > bbox.max_lon);
            assert!(snapped.max_lat > bbox.max_lat);
        }
    }

    #[test]
    fn test_snap_outward_rejects_bad_resolution() {
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert!(bbox.snap_outward(0.0).is_err());
        assert!(bbox.snap_outward(-0.5).is_err());
        assert!(bbox.snap_outward(f64::NAN).is_err());
    }

    #[test]
    fn test_contains() {
        let bbox = BoundingBox::new(-10.0, 50.0, 2.0, 60.0);
        assert!(bbox.contains(-10.0, 50.0));
        assert!(bbox.contains(0.0, 55.0));
        assert!(!bbox.contains(3.0, 55.0));
    }
}
