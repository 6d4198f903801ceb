//! Soil share manifests.
//!
//! Each grid cell has a `manifest_<cell id>.txt` file in the simulations
//! directory holding its location and the percentage of the cell covered by
//! each dominant soil. Two JSON layouts are read:
//!
//! ```json
//! {"location": {"province": "Wales", "latitude": 52.1, "longitude": -3.4,
//!               "area": 41.3, "scenario": "RCP85"},
//!  "1": 60.0, "2": 40.0}
//! ```
//!
//! and the older form keyed by mapping unit, `{"location": {…}, "10090":
//! {"1": 60.0, "2": 40.0}}`. An optional `granular_longs` entry lists extra
//! granular longitudes covered by the cell. Other keys are ignored.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use ecosse_common::{CellId, MAX_NUM_DOM_SOILS};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{AggregationError, Result};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ManifestLocation {
    #[serde(default)]
    pub province: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Cell area in km2
    pub area: f64,
    #[serde(default)]
    pub scenario: Option<String>,
}

/// Location and soil shares of one grid cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub location: ManifestLocation,
    /// Slot -> percentage of the cell
    shares: BTreeMap<usize, f64>,
    /// Granular longitudes sharing the cell's soils, in key order
    granular_longs: Vec<i64>,
}

impl Manifest {
    pub fn new(location: ManifestLocation, shares: BTreeMap<usize, f64>) -> Self {
        Self {
            location,
            shares,
            granular_longs: Vec::new(),
        }
    }

    pub fn with_granular_longs(mut self, granular_longs: Vec<i64>) -> Self {
        self.granular_longs = granular_longs;
        self
    }

    /// Parse manifest JSON; `mu_global` selects the nested share table of
    /// the older layout.
    pub fn from_json_str(contents: &str, mu_global: Option<u32>) -> std::result::Result<Self, String> {
        let value: Value = serde_json::from_str(contents).map_err(|e| e.to_string())?;
        let object = value
            .as_object()
            .ok_or_else(|| "manifest is not a JSON object".to_string())?;

        let location = object
            .get("location")
            .cloned()
            .ok_or_else(|| "missing 'location'".to_string())
            .and_then(|v| {
                serde_json::from_value::<ManifestLocation>(v).map_err(|e| format!("location: {}", e))
            })?;

        // A nested table keyed by a small mapping unit looks like a slot key
        let nested = mu_global
            .map(|mu| mu.to_string())
            .and_then(|key| object.get(&key))
            .and_then(Value::as_object);
        let shares = match nested {
            Some(table) => slot_shares(table)?,
            None => slot_shares(object)?,
        };
        if shares.is_empty() {
            return Err("no dominant soil shares".to_string());
        }

        Ok(Self {
            location,
            shares,
            granular_longs: object.get("granular_longs").map(granular_longs).unwrap_or_default(),
        })
    }

    /// Share of a slot as a fraction in `[0, 1]`.
    pub fn get_share(&self, slot: usize) -> Option<f64> {
        self.shares.get(&slot).map(|pct| pct / 100.0)
    }

    pub fn slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.shares.keys().copied()
    }

    pub fn share_count(&self) -> usize {
        self.shares.len()
    }

    pub fn granular_longs(&self) -> &[i64] {
        &self.granular_longs
    }
}

/// Entries whose key is a slot number, validated as percentages. Nested
/// tables of other mapping units are skipped.
fn slot_shares(object: &Map<String, Value>) -> std::result::Result<BTreeMap<usize, f64>, String> {
    let mut shares = BTreeMap::new();
    for (key, value) in object {
        let Ok(slot) = key.parse::<usize>() else {
            continue;
        };
        if !(1..=MAX_NUM_DOM_SOILS).contains(&slot) || value.is_object() {
            continue;
        }
        let pct = value
            .as_f64()
            .ok_or_else(|| format!("share of slot {} is not a number", slot))?;
        if !(0.0..=100.0).contains(&pct) {
            return Err(format!("share of slot {} out of range: {}", slot, pct));
        }
        shares.insert(slot, pct);
    }
    Ok(shares)
}

/// `granular_longs` is written as `{"1": 20430, ...}` or as a list.
fn granular_longs(value: &Value) -> Vec<i64> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(usize, i64)> = map
                .iter()
                .filter_map(|(k, v)| Some((k.parse().ok()?, v.as_i64()?)))
                .collect();
            entries.sort_unstable();
            entries.into_iter().map(|(_, lon)| lon).collect()
        }
        Value::Array(items) => items.iter().filter_map(Value::as_i64).collect(),
        _ => Vec::new(),
    }
}

/// Manifest files of one simulations directory.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    sims_dir: PathBuf,
}

impl ManifestStore {
    pub fn new(sims_dir: impl Into<PathBuf>) -> Self {
        Self {
            sims_dir: sims_dir.into(),
        }
    }

    pub fn path_for(&self, cell_id: &CellId) -> PathBuf {
        self.sims_dir.join(cell_id.manifest_file_name())
    }

    pub fn load(&self, cell_id: &CellId, mu_global: Option<u32>) -> Result<Manifest> {
        let path = self.path_for(cell_id);
        if !path.is_file() {
            return Err(AggregationError::ManifestNotFound(path));
        }

        let manifest = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|contents| Manifest::from_json_str(&contents, mu_global))
            .map_err(|reason| AggregationError::ManifestCorrupt {
                path: path.clone(),
                reason,
            })?;

        debug!(path = %path.display(), shares = manifest.share_count(), "Loaded manifest");
        Ok(manifest)
    }

    /// Number of manifest files, one per grid cell.
    pub fn count_manifests(&self) -> Result<usize> {
        let mut count = 0;
        for entry in fs::read_dir(&self.sims_dir)? {
            let entry = entry?;
            if is_manifest_file(&entry.path()) {
                count += 1;
            }
        }
        Ok(count)
    }
}

fn is_manifest_file(path: &Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("manifest_") && n.ends_with(".txt"))
            .unwrap_or(false)
}
