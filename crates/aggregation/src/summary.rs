//! Reader for the per-soil `SUMMARY.OUT` files written by ECOSSE.
//!
//! The file layout is a units line, a header line of column names and one
//! whitespace separated row per simulated timestep. Only the columns of the
//! run's metrics are kept.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use ecosse_common::{Metric, MetricSet};
use tracing::debug;

use crate::error::{AggregationError, Result};

/// File name of the ECOSSE summary output inside a simulation directory.
pub const SUMMARY_FILE_NAME: &str = "SUMMARY.OUT";

/// Per-metric series of one dominant soil.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DominantSoilResult {
    series: BTreeMap<Metric, Vec<f64>>,
}

impl DominantSoilResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a metric series. All series of one result share a length.
    pub fn with_series(mut self, metric: Metric, values: Vec<f64>) -> Self {
        self.series.insert(metric, values);
        self
    }

    pub fn series(&self, metric: Metric) -> Option<&[f64]> {
        self.series.get(&metric).map(Vec::as_slice)
    }

    pub fn metrics(&self) -> impl Iterator<Item = Metric> + '_ {
        self.series.keys().copied()
    }

    /// Number of timesteps, taken from the first series.
    pub fn len(&self) -> usize {
        self.series.values().next().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read the requested metrics from the `SUMMARY.OUT` of a simulation directory.
pub fn read_simulation_dir(sim_dir: &Path, metrics: &MetricSet) -> Result<DominantSoilResult> {
    read_summary(&sim_dir.join(SUMMARY_FILE_NAME), metrics)
}

/// Read the requested metrics from a `SUMMARY.OUT` file.
///
/// Fails with `UnusableResult` when the file is missing or empty, a metric
/// column is absent, or any value cannot be parsed.
pub fn read_summary(path: &Path, metrics: &MetricSet) -> Result<DominantSoilResult> {
    let unusable = |reason: String| AggregationError::UnusableResult {
        path: path.to_path_buf(),
        reason,
    };

    let contents = fs::read_to_string(path).map_err(|e| unusable(e.to_string()))?;
    let mut lines = contents.lines();

    // Units description line
    lines.next().ok_or_else(|| unusable("file is empty".to_string()))?;
    let columns: Vec<String> = lines
        .next()
        .ok_or_else(|| unusable("no header line".to_string()))?
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();

    let mut positions = Vec::with_capacity(metrics.len());
    for metric in metrics.iter() {
        let index = columns
            .iter()
            .position(|c| c == metric.summary_column())
            .ok_or_else(|| {
                unusable(format!("header not recognised, no {} column", metric.summary_column()))
            })?;
        positions.push((metric, index));
    }

    let mut series: BTreeMap<Metric, Vec<f64>> =
        metrics.iter().map(|m| (m, Vec::new())).collect();

    for (irow, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let tokens = repair_fused_negatives(line.split_whitespace().collect(), columns.len());

        let mut values = Vec::with_capacity(tokens.len());
        for (icol, token) in tokens.iter().enumerate() {
            let value: f64 = token.parse().map_err(|_| {
                let column = columns.get(icol).map(String::as_str).unwrap_or("?");
                unusable(format!(
                    "row {}: cannot parse '{}' in column {}",
                    irow + 3,
                    token,
                    column
                ))
            })?;
            values.push(value);
        }

        for (metric, index) in &positions {
            let value = values.get(*index).ok_or_else(|| {
                unusable(format!("row {} has only {} values", irow + 3, values.len()))
            })?;
            if let Some(s) = series.get_mut(metric) {
                s.push(*value);
            }
        }
    }

    let result = DominantSoilResult { series };
    if result.is_empty() {
        return Err(unusable("no data rows".to_string()));
    }

    debug!(path = %path.display(), rows = result.len(), "Read SUMMARY.OUT");
    Ok(result)
}

/// Split tokens where ECOSSE has run a negative number into its neighbour,
/// e.g. `12.5-0.3` becomes `12.5` and `-0.3`.
///
/// Rows already holding `expected_len` tokens are returned unchanged.
pub fn repair_fused_negatives(tokens: Vec<&str>, expected_len: usize) -> Vec<String> {
    if tokens.len() == expected_len {
        return tokens.into_iter().map(str::to_string).collect();
    }

    let mut repaired = Vec::with_capacity(expected_len);
    for token in tokens {
        if token.parse::<f64>().is_ok() {
            repaired.push(token.to_string());
            continue;
        }
        match split_fused(token) {
            Some((left, right)) => {
                repaired.push(left.to_string());
                repaired.push(right.to_string());
            }
            None => repaired.push(token.to_string()),
        }
    }
    repaired
}

fn split_fused(token: &str) -> Option<(&str, &str)> {
    let bytes = token.as_bytes();
    let split = token
        .char_indices()
        .skip(1)
        .filter(|(i, c)| *c == '-' && !matches!(bytes[i - 1], b'e' | b'E'))
        .map(|(i, _)| i)
        .last()?;

    let (left, right) = token.split_at(split);
    (left.parse::<f64>().is_ok() && right.parse::<f64>().is_ok()).then_some((left, right))
}
