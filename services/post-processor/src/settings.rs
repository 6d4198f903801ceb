//! Settings loader for the post-processor
//!
//! Loads and validates an optional YAML settings file holding defaults for
//! the directories, failure limit, progress interval, extra metrics and
//! logging. Command-line flags take precedence over every value.
//!
//! Supports environment variable substitution using ${VAR} syntax.

use anyhow::{Context, Result};
use ecosse_common::{Metric, MetricSet};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use aggregation::{DEFAULT_MAX_FAILURES, DEFAULT_PROGRESS_INTERVAL};

pub const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
pub const VALID_LOG_FORMATS: [&str; 2] = ["json", "pretty"];

// ============================================================================
// Settings (post-processor.yaml)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sims_dir: Option<String>,
    pub results_dir: Option<String>,
    pub overwrite: bool,
    pub max_failures: usize,
    pub progress_interval_secs: u64,
    pub extra_metrics: ExtraMetricsConfig,
    pub logging: LoggingConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sims_dir: None,
            results_dir: None,
            overwrite: false,
            max_failures: DEFAULT_MAX_FAILURES,
            progress_interval_secs: DEFAULT_PROGRESS_INTERVAL.as_secs(),
            extra_metrics: ExtraMetricsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }

    /// Core metrics plus the extras switched on in the settings.
    pub fn metrics(&self) -> Result<MetricSet> {
        let mut extras = Vec::new();
        if self.extra_metrics.no3 {
            extras.push(Metric::No3);
        }
        if self.extra_metrics.npp {
            extras.push(Metric::Npp);
        }
        Ok(MetricSet::with_extras(&extras)?)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtraMetricsConfig {
    pub no3: bool,
    pub npp: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

// ============================================================================
// Loading Functions
// ============================================================================

/// Load and parse a settings file with environment variable substitution
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read settings from {:?}", path.as_ref()))?;

    let expanded = expand_env_vars(&content)?;

    let settings: Settings = serde_yaml::from_str(&expanded)
        .with_context(|| format!("Failed to parse settings YAML from {:?}", path.as_ref()))?;

    validate_settings(&settings)?;

    Ok(settings)
}

/// Expand a leading `~` in a configured path.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in YAML content
/// Supports ${VAR} and ${VAR:-default} syntax
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::new();
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'

            let mut var_expr = String::new();
            let mut brace_count = 1;

            while brace_count > 0 {
                match chars.next() {
                    Some('{') => {
                        brace_count += 1;
                        var_expr.push('{');
                    }
                    Some('}') => {
                        brace_count -= 1;
                        if brace_count > 0 {
                            var_expr.push('}');
                        }
                    }
                    Some(c) => var_expr.push(c),
                    None => anyhow::bail!("Unclosed variable substitution: ${{{}", var_expr),
                }
            }

            let value = resolve_var_expr(&var_expr)?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

/// Resolve variable expression (supports VAR and VAR:-default syntax)
fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).with_context(|| format!("Environment variable {} not set", expr))
    }
}

// ============================================================================
// Validation
// ============================================================================

fn validate_settings(settings: &Settings) -> Result<()> {
    validate_logging(&settings.logging.level, &settings.logging.format)?;

    anyhow::ensure!(
        settings.progress_interval_secs > 0,
        "progress_interval_secs must be greater than 0"
    );

    for (name, dir) in [("sims_dir", &settings.sims_dir), ("results_dir", &settings.results_dir)] {
        if let Some(dir) = dir {
            anyhow::ensure!(!dir.trim().is_empty(), "{} cannot be empty", name);
        }
    }

    Ok(())
}

pub fn validate_logging(level: &str, format: &str) -> Result<()> {
    anyhow::ensure!(
        VALID_LOG_LEVELS.contains(&level),
        "Invalid log level: {}. Must be one of: {:?}",
        level,
        VALID_LOG_LEVELS
    );

    anyhow::ensure!(
        VALID_LOG_FORMATS.contains(&format),
        "Invalid log format: {}. Must be one of: {:?}",
        format,
        VALID_LOG_FORMATS
    );

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
