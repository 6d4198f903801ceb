//! Fixture builders for Spatial ECOSSE post-processing tests.
//!
//! These write the on-disk inputs of the pipeline stages into temporary
//! directories: simulation directories holding `SUMMARY.OUT` files, soil
//! share manifests, study definitions and per-metric result files.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use tempfile::TempDir;

/// Common bounding boxes for testing, as `(min_lon, min_lat, max_lon, max_lat)`.
pub mod bbox {
    /// Great Britain and Ireland
    pub const UK: (f64, f64, f64, f64) = (-10.0, 50.0, 2.0, 60.0);

    /// A small box over Wales
    pub const WALES: (f64, f64, f64, f64) = (-5.0, 51.0, -2.5, 53.5);
}

/// Column headings of a current ECOSSE `SUMMARY.OUT`.
pub const SUMMARY_COLUMNS: [&str; 8] = [
    "Year", "Month", "Total_SOC", "CO2_C", "CH4_C", "NO3_N", "N2O_N", "NPP_ADJ",
];

/// Contents of a `SUMMARY.OUT` with `rows` timesteps.
///
/// `value(column, row)` supplies every metric cell; the `Year` and `Month`
/// columns are filled in from January 2001.
pub fn summary_out(rows: usize, value: impl Fn(&str, usize) -> f64) -> String {
    let mut contents = String::from("Units: kg/ha per month\n");
    contents.push_str(&SUMMARY_COLUMNS.join("  "));
    contents.push('\n');

    for row in 0..rows {
        let year = 2001 + row / 12;
        let month = row % 12 + 1;
        let mut fields = vec![year.to_string(), month.to_string()];
        fields.extend(SUMMARY_COLUMNS[2..].iter().map(|c| value(c, row).to_string()));
        contents.push_str(&fields.join("  "));
        contents.push('\n');
    }
    contents
}

/// Location block of a test manifest.
#[derive(Debug, Clone)]
pub struct TestLocation {
    pub province: String,
    pub latitude: f64,
    pub longitude: f64,
    pub area: f64,
}

impl TestLocation {
    pub fn new(province: &str, latitude: f64, longitude: f64, area: f64) -> Self {
        Self {
            province: province.to_string(),
            latitude,
            longitude,
            area,
        }
    }
}

/// Manifest JSON with `shares` given as `(slot, percent)` pairs.
pub fn manifest_json(location: &TestLocation, shares: &[(usize, f64)]) -> String {
    let mut manifest = json!({
        "location": {
            "province": location.province,
            "latitude": location.latitude,
            "longitude": location.longitude,
            "area": location.area,
        }
    });
    for (slot, pct) in shares {
        manifest[slot.to_string()] = json!(pct);
    }
    manifest.to_string()
}

/// Study definition JSON for a study over `bbox`.
pub fn study_definition_json(
    study: &str,
    bbox: (f64, f64, f64, f64),
    resolution: f64,
    land_use: &str,
    years: (i32, i32),
) -> String {
    json!({
        "studyDefn": {
            "bbox": [bbox.0, bbox.1, bbox.2, bbox.3],
            "climScnr": "UKCP18_RCP85",
            "cropName": "Arable",
            "resolution": resolution,
            "futStrtYr": years.0,
            "futEndYr": years.1,
            "land_use": land_use,
            "study": study,
        }
    })
    .to_string()
}

/// A temporary simulations directory.
pub struct SimsDirFixture {
    root: TempDir,
}

impl SimsDirFixture {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().expect("create temp sims dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Write the `SUMMARY.OUT` of one soil slot of `cell`, e.g.
    /// `lat0002374_lon0024154_mu10090`.
    pub fn add_soil(&self, cell: &str, slot: usize, summary: &str) -> PathBuf {
        let dir = self.root.path().join(format!("{}_s{:02}", cell, slot));
        fs::create_dir_all(&dir).expect("create simulation dir");
        fs::write(dir.join("SUMMARY.OUT"), summary).expect("write SUMMARY.OUT");
        dir
    }

    /// Write the manifest of `cell`.
    pub fn add_manifest(&self, cell: &str, location: &TestLocation, shares: &[(usize, f64)]) -> PathBuf {
        self.add_manifest_contents(cell, manifest_json(location, shares))
    }

    /// Write the manifest of `cell` verbatim.
    pub fn add_manifest_contents(&self, cell: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.root.path().join(format!("manifest_{}.txt", cell));
        fs::write(&path, contents).expect("write manifest");
        path
    }
}

impl Default for SimsDirFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// One data line of a per-metric result file.
#[derive(Debug, Clone)]
pub struct ResultRow {
    pub province: String,
    pub latitude: f64,
    pub longitude: f64,
    pub mu_global: u32,
    pub area: f64,
    pub values: Vec<f64>,
}

impl ResultRow {
    pub fn new(latitude: f64, longitude: f64, values: Vec<f64>) -> Self {
        Self {
            province: "Wales".to_string(),
            latitude,
            longitude,
            mu_global: 10090,
            area: 25.0,
            values,
        }
    }

    fn to_line(&self) -> String {
        let mut fields = vec![
            self.province.clone(),
            self.latitude.to_string(),
            self.longitude.to_string(),
            self.mu_global.to_string(),
            "UKCP18_RCP85".to_string(),
            "1".to_string(),
            "ara".to_string(),
            self.area.to_string(),
        ];
        fields.extend(self.values.iter().map(|v| v.to_string()));
        fields.join("\t")
    }
}

/// Write a tab-delimited result file: a header line, then `rows`.
pub fn write_result_file(path: &Path, rows: &[ResultRow]) {
    let nvalues = rows.first().map(|r| r.values.len()).unwrap_or(0);
    let mut header: Vec<String> = [
        "province", "latitude", "longitude", "mu_global", "scenario", "num_dom_soils", "land_use",
        "area",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    header.extend((0..nvalues).map(|i| format!("v{}", i)));

    let mut contents = header.join("\t");
    contents.push('\n');
    for row in rows {
        contents.push_str(&row.to_line());
        contents.push('\n');
    }
    fs::write(path, contents).expect("write result file");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_out_layout() {
        let contents = summary_out(13, |column, row| if column == "Total_SOC" { row as f64 } else { 0.5 });
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 15);
        assert!(lines[1].starts_with("Year  Month  Total_SOC"));
        assert!(lines[2].starts_with("2001  1  0  0.5"));
        assert!(lines[14].starts_with("2002  1  12"));
    }

    #[test]
    fn test_manifest_json() {
        let json = manifest_json(&TestLocation::new("Wales", 52.0, -3.5, 20.0), &[(1, 60.0), (2, 40.0)]);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["1"], 60.0);
        assert_eq!(value["location"]["province"], "Wales");
    }

    #[test]
    fn test_sims_dir_fixture() {
        let sims = SimsDirFixture::new();
        let dir = sims.add_soil("lat0000001_lon0000002_mu00003", 1, "x");
        assert!(dir.ends_with("lat0000001_lon0000002_mu00003_s01"));
        assert!(dir.join("SUMMARY.OUT").is_file());

        let manifest = sims.add_manifest(
            "lat0000001_lon0000002_mu00003",
            &TestLocation::new("Wales", 52.0, -3.5, 20.0),
            &[(1, 100.0)],
        );
        assert!(manifest.is_file());
    }
}
