//! Grid cells, land uses and the simulation directory naming convention.
//!
//! Each simulated soil of a grid cell lives in its own directory named
//! `lat<digits>_lon<digits>_mu<digits>_s<slot>`, e.g.
//! `lat0002374_lon0024154_mu10090_s01`. All slots of one cell share the
//! `lat…_lon…_mu…` prefix, which is also the key of the cell's manifest.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CommonError, CommonResult};

/// HWSD records up to nine dominant soils per mapping unit.
pub const MAX_NUM_DOM_SOILS: usize = 9;

/// Land use of a study, keyed by the abbreviations used in study definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LandUse {
    Arable,
    Grassland,
    Forestry,
    SemiNatural,
    Miscanthus,
    Src,
}

impl LandUse {
    pub const ALL: [LandUse; 6] = [
        LandUse::Arable,
        LandUse::Grassland,
        LandUse::Forestry,
        LandUse::SemiNatural,
        LandUse::Miscanthus,
        LandUse::Src,
    ];

    /// Three-letter abbreviation used in file and variable names.
    pub fn abbreviation(&self) -> &'static str {
        match self {
            LandUse::Arable => "ara",
            LandUse::Grassland => "gra",
            LandUse::Forestry => "for",
            LandUse::SemiNatural => "nat",
            LandUse::Miscanthus => "mis",
            LandUse::Src => "src",
        }
    }

    /// Human readable crop name.
    pub fn display_name(&self) -> &'static str {
        match self {
            LandUse::Arable => "Arable",
            LandUse::Grassland => "Grassland",
            LandUse::Forestry => "Forestry",
            LandUse::SemiNatural => "Semi-natural",
            LandUse::Miscanthus => "Miscanthus",
            LandUse::Src => "SRC",
        }
    }

    /// Resolve a study-definition land use, mapping the `unk2unk` placeholder
    /// to arable, or to grassland when the crop name says so.
    pub fn from_study_value(value: &str, crop_name: Option<&str>) -> CommonResult<Self> {
        if value == "unk2unk" {
            return Ok(match crop_name {
                Some("Grassland") => LandUse::Grassland,
                _ => LandUse::Arable,
            });
        }
        value.parse()
    }
}

impl FromStr for LandUse {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        LandUse::ALL
            .into_iter()
            .find(|lu| {
                lu.abbreviation() == lower || lu.display_name().to_lowercase() == lower
            })
            .ok_or_else(|| CommonError::UnknownLandUse(s.to_string()))
    }
}

impl fmt::Display for LandUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

/// Identifier shared by every soil slot of one grid cell: `lat…_lon…_mu…`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(String);

impl CellId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the manifest describing this cell.
    pub fn manifest_file_name(&self) -> String {
        format!("manifest_{}.txt", self.0)
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A decoded simulation directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationDir {
    pub cell_id: CellId,
    pub lat_id: u64,
    pub lon_id: u64,
    pub mu_global: u32,
    /// Dominant soil slot, counted from 1
    pub slot: usize,
}

impl SimulationDir {
    /// Decode a directory name such as `lat0002374_lon0024154_mu10090_s01`.
    pub fn parse(name: &str) -> CommonResult<Self> {
        let invalid = || CommonError::InvalidSimulationDir(name.to_string());

        let parts: Vec<&str> = name.split('_').collect();
        let [lat, lon, mu, soil] = parts.as_slice() else {
            return Err(invalid());
        };

        let lat_id = numeric_suffix(lat, "lat").ok_or_else(invalid)?;
        let lon_id = numeric_suffix(lon, "lon").ok_or_else(invalid)?;
        let mu_global = numeric_suffix(mu, "mu")
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(invalid)?;
        let slot = numeric_suffix(soil, "s")
            .and_then(|v| usize::try_from(v).ok())
            .filter(|s| *s >= 1)
            .ok_or_else(invalid)?;

        Ok(Self {
            cell_id: CellId(format!("{}_{}_{}", lat, lon, mu)),
            lat_id,
            lon_id,
            mu_global,
            slot,
        })
    }

    /// Check whether a directory name follows the simulation naming convention.
    pub fn is_simulation_dir(name: &str) -> bool {
        Self::parse(name).is_ok()
    }
}

fn numeric_suffix(part: &str, prefix: &str) -> Option<u64> {
    let digits = part.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// One simulated grid cell, as described by its directory name and manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub cell_id: CellId,
    pub province: String,
    pub latitude: f64,
    pub longitude: f64,
    pub mu_global: Option<u32>,
    pub area_km2: f64,
    pub land_use: LandUse,
    pub climate_scenario: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simulation_dir() {
        let dir = SimulationDir::parse("lat0002374_lon0024154_mu10090_s01").unwrap();
        assert_eq!(dir.cell_id.as_str(), "lat0002374_lon0024154_mu10090");
        assert_eq!(dir.lat_id, 2374);
        assert_eq!(dir.lon_id, 24154);
        assert_eq!(dir.mu_global, 10090);
        assert_eq!(dir.slot, 1);
        assert_eq!(
            dir.cell_id.manifest_file_name(),
            "manifest_lat0002374_lon0024154_mu10090.txt"
        );
    }

    #[test]
    fn test_parse_higher_slot() {
        let dir = SimulationDir::parse("lat0002374_lon0024154_mu10090_s09").unwrap();
        assert_eq!(dir.slot, 9);
    }

    #[test]
    fn test_rejects_incidental_directories() {
        for name in [
            "0_1",
            "lat0002374_lon0024154_mu10090",
            "lat0002374_lon0024154_mu10090_s00",
            "lat0002374_lon0024154_mu10090_sXX",
            "lat_lon_mu_s01",
            "weather_lat0002374_lon0024154_mu10090_s01",
            "lat0002374_lon0024154_muABC_s01",
        ] {
            assert!(!SimulationDir::is_simulation_dir(name), "{}", name);
        }
    }

    #[test]
    fn test_land_use_abbreviations() {
        assert_eq!("ara".parse::<LandUse>().unwrap(), LandUse::Arable);
        assert_eq!("Grassland".parse::<LandUse>().unwrap(), LandUse::Grassland);
        assert_eq!("nat".parse::<LandUse>().unwrap(), LandUse::SemiNatural);
        assert_eq!(LandUse::Src.display_name(), "SRC");
        assert!("xyz".parse::<LandUse>().is_err());
    }

    #[test]
    fn test_land_use_placeholder() {
        assert_eq!(
            LandUse::from_study_value("unk2unk", None).unwrap(),
            LandUse::Arable
        );
        assert_eq!(
            LandUse::from_study_value("unk2unk", Some("Grassland")).unwrap(),
            LandUse::Grassland
        );
        assert_eq!(
            LandUse::from_study_value("for", Some("Grassland")).unwrap(),
            LandUse::Forestry
        );
    }
}
