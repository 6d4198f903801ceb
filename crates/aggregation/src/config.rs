//! Study definition and run configuration.
//!
//! A study definition is the JSON file written alongside the simulations:
//!
//! ```json
//! {
//!   "studyDefn": {
//!     "bbox": [-10.0, 50.0, 2.0, 60.0],
//!     "climScnr": "UKCP18_RCP85",
//!     "cropName": "Arable",
//!     "resolution": 0.5,
//!     "futStrtYr": 2021,
//!     "futEndYr": 2080,
//!     "land_use": "ara",
//!     "study": "uk_arable"
//!   }
//! }
//! ```
//!
//! It is validated once into a [`StudyDefinition`] and combined with the run
//! options into an immutable [`RunConfig`] shared by every pipeline stage.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ecosse_common::{BoundingBox, LandUse, MetricSet};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{AggregationError, Result};

/// Failures tolerated before a run is aborted.
pub const DEFAULT_MAX_FAILURES: usize = 1000;

/// Minimum interval between progress log lines.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

const STUDY_GROUP: &str = "studyDefn";

/// Validated contents of a study definition file.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyDefinition {
    pub study: String,
    pub bbox: BoundingBox,
    pub resolution: f64,
    pub climate_scenario: String,
    pub crop_name: String,
    pub land_use: LandUse,
    pub fut_start_year: i32,
    pub fut_end_year: i32,
}

impl StudyDefinition {
    /// Read and validate a study definition file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            AggregationError::ConfigInvalid(format!(
                "could not read study definition {}: {}",
                path.display(),
                e
            ))
        })?;

        let study = Self::from_json_str(&contents)?;
        info!(
            path = %path.display(),
            study = %study.study,
            land_use = %study.land_use,
            "Loaded study definition"
        );
        Ok(study)
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(contents)
            .map_err(|e| AggregationError::ConfigInvalid(format!("study definition: {}", e)))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let group = value
            .get(STUDY_GROUP)
            .and_then(Value::as_object)
            .ok_or_else(|| invalid(format!("missing group '{}'", STUDY_GROUP)))?;

        let corners: Vec<f64> = group
            .get("bbox")
            .and_then(Value::as_array)
            .ok_or_else(|| invalid("missing or invalid 'bbox'"))?
            .iter()
            .map(number_value)
            .collect::<Option<_>>()
            .ok_or_else(|| invalid("'bbox' must hold four numbers"))?;
        let bbox = BoundingBox::from_corners(&corners).map_err(|e| invalid(e.to_string()))?;

        let resolution = group
            .get("resolution")
            .and_then(number_value)
            .ok_or_else(|| invalid("missing or invalid 'resolution'"))?;
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(invalid(format!("resolution must be positive, got {}", resolution)));
        }

        let fut_start_year = year_field(group, "futStrtYr")?;
        let fut_end_year = year_field(group, "futEndYr")?;
        if fut_end_year < fut_start_year {
            return Err(invalid(format!(
                "futEndYr {} precedes futStrtYr {}",
                fut_end_year, fut_start_year
            )));
        }

        let land_use_value = string_field(group, "land_use")?;
        let crop_name = match group.get("cropName").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                debug!(land_use = %land_use_value, "cropName absent, using land use");
                land_use_value.clone()
            }
        };
        let land_use = LandUse::from_study_value(&land_use_value, Some(&crop_name))?;

        Ok(Self {
            study: string_field(group, "study")?,
            bbox,
            resolution,
            climate_scenario: string_field(group, "climScnr")?,
            crop_name,
            land_use,
            fut_start_year,
            fut_end_year,
        })
    }
}

fn invalid(message: impl Into<String>) -> AggregationError {
    AggregationError::ConfigInvalid(message.into())
}

/// Numbers may be written as JSON numbers or numeric strings.
fn number_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn year_field(group: &Map<String, Value>, key: &str) -> Result<i32> {
    let value = group
        .get(key)
        .ok_or_else(|| invalid(format!("missing '{}'", key)))?;

    let year = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    year.and_then(|y| i32::try_from(y).ok())
        .ok_or_else(|| invalid(format!("'{}' must be an integer year", key)))
}

fn string_field(group: &Map<String, Value>, key: &str) -> Result<String> {
    match group.get(key).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(invalid(format!("missing or empty '{}'", key))),
    }
}

// ============================================================================
// Run configuration
// ============================================================================

/// Everything a pipeline run needs, fixed before the run starts.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub study: StudyDefinition,
    pub sims_dir: PathBuf,
    pub results_dir: PathBuf,
    /// Scenario written to output, the study's own unless overridden
    pub climate_scenario: String,
    pub land_use: LandUse,
    pub metrics: MetricSet,
    pub max_failures: usize,
    pub overwrite: bool,
    pub progress_interval: Duration,
    /// Write one row per granular longitude of a cell, splitting its area
    pub expand_granular: bool,
}

impl RunConfig {
    pub fn new(
        study: StudyDefinition,
        sims_dir: impl Into<PathBuf>,
        results_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            climate_scenario: study.climate_scenario.clone(),
            land_use: study.land_use,
            study,
            sims_dir: sims_dir.into(),
            results_dir: results_dir.into(),
            metrics: MetricSet::default(),
            max_failures: DEFAULT_MAX_FAILURES,
            overwrite: false,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            expand_granular: false,
        }
    }

    pub fn with_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.climate_scenario = scenario.into();
        self
    }

    pub fn with_land_use(mut self, land_use: LandUse) -> Self {
        self.land_use = land_use;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricSet) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_max_failures(mut self, max_failures: usize) -> Self {
        self.max_failures = max_failures;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_expand_granular(mut self, expand_granular: bool) -> Self {
        self.expand_granular = expand_granular;
        self
    }

    /// Study name used to build output file names.
    pub fn study_name(&self) -> &str {
        &self.study.study
    }

    /// Crop name used in long names, e.g. `flux soc Arable`.
    pub fn crop_label(&self) -> &str {
        self.land_use.display_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn study_json(resolution: &str, crop: Option<&str>, land_use: &str) -> String {
        let crop = crop
            .map(|c| format!(r#""cropName": "{}","#, c))
            .unwrap_or_default();
        format!(
            r#"{{"studyDefn": {{
                "bbox": [-10.0, 50.0, 2.0, 60.0],
                "climScnr": "UKCP18_RCP85",
                {}
                "resolution": {},
                "futStrtYr": 2021,
                "futEndYr": "2080",
                "land_use": "{}",
                "study": "uk_test"
            }}}}"#,
            crop, resolution, land_use
        )
    }

    #[test]
    fn test_parse_study_definition() {
        let study = StudyDefinition::from_json_str(&study_json("0.5", Some("Arable"), "ara")).unwrap();
        assert_eq!(study.study, "uk_test");
        assert_eq!(study.resolution, 0.5);
        assert_eq!(study.fut_end_year, 2080);
        assert_eq!(study.land_use, LandUse::Arable);
        assert_eq!(study.bbox, BoundingBox::new(-10.0, 50.0, 2.0, 60.0));
    }

    #[test]
    fn test_resolution_as_string() {
        let study = StudyDefinition::from_json_str(&study_json(r#""0.25""#, None, "ara")).unwrap();
        assert_eq!(study.resolution, 0.25);
    }

    #[test]
    fn test_empty_or_null_resolution_is_invalid() {
        for res in [r#""""#, "null", "0", "-0.5"] {
            let err = StudyDefinition::from_json_str(&study_json(res, None, "ara")).unwrap_err();
            assert!(matches!(err, AggregationError::ConfigInvalid(_)), "{}", res);
        }
    }

    #[test]
    fn test_crop_name_defaults_to_land_use() {
        let study = StudyDefinition::from_json_str(&study_json("0.5", None, "gra")).unwrap();
        assert_eq!(study.crop_name, "gra");
        assert_eq!(study.land_use, LandUse::Grassland);
    }

    #[test]
    fn test_unknown_land_use_mapping() {
        let study =
            StudyDefinition::from_json_str(&study_json("0.5", Some("Grassland"), "unk2unk")).unwrap();
        assert_eq!(study.land_use, LandUse::Grassland);

        let study =
            StudyDefinition::from_json_str(&study_json("0.5", Some("Wheat"), "unk2unk")).unwrap();
        assert_eq!(study.land_use, LandUse::Arable);
    }

    #[test]
    fn test_missing_group_and_keys() {
        assert!(StudyDefinition::from_json_str(r#"{"other": {}}"#).is_err());

        let json = study_json("0.5", None, "ara").replace(r#""study": "uk_test""#, r#""study": """#);
        assert!(matches!(
            StudyDefinition::from_json_str(&json),
            Err(AggregationError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn test_run_config_overrides() {
        let study = StudyDefinition::from_json_str(&study_json("0.5", None, "ara")).unwrap();
        let config = RunConfig::new(study, "/sims", "/results")
            .with_scenario("RCP26")
            .with_land_use(LandUse::Forestry)
            .with_max_failures(5);

        assert_eq!(config.climate_scenario, "RCP26");
        assert_eq!(config.study.climate_scenario, "UKCP18_RCP85");
        assert_eq!(config.crop_label(), "Forestry");
        assert_eq!(config.max_failures, 5);
        assert_eq!(config.progress_interval, DEFAULT_PROGRESS_INTERVAL);
        assert!(!config.overwrite);
        assert!(!config.expand_granular);
    }

    #[test]
    fn test_invalid_bbox_is_config_error() {
        let bbox = "[-10.0, 50.0, 2.0, 60.0]";
        let json = study_json("0.5", None, "ara").replace(bbox, "[2.0, 50.0, -10.0, 60.0]");
        assert!(matches!(
            StudyDefinition::from_json_str(&json),
            Err(AggregationError::ConfigInvalid(_))
        ));

        let json = study_json("0.5", None, "ara").replace(bbox, "[-10.0, 50.0, 2.0]");
        assert!(matches!(
            StudyDefinition::from_json_str(&json),
            Err(AggregationError::ConfigInvalid(_))
        ));
    }
}
