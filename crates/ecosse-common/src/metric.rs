//! Simulation output metrics and the set of metrics enabled for a run.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CommonError, CommonResult};

/// Whether a metric is a pool size or a rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricKind {
    /// A pool sampled at each timestep (soil organic carbon)
    Stock,
    /// A rate accumulated over each timestep
    Flux,
}

/// A metric reported in SUMMARY.OUT and carried through to the rasters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Soc,
    Co2,
    Ch4,
    No3,
    Npp,
    N2o,
}

impl Metric {
    /// All metrics, in result-file order.
    pub const ALL: [Metric; 6] = [
        Metric::Soc,
        Metric::Co2,
        Metric::Ch4,
        Metric::No3,
        Metric::Npp,
        Metric::N2o,
    ];

    /// Metrics only produced when explicitly requested.
    pub const EXTRA: [Metric; 2] = [Metric::No3, Metric::Npp];

    /// Inputs of the CO2-equivalent derivation.
    pub const CO2E_INPUTS: [Metric; 4] = [Metric::Ch4, Metric::N2o, Metric::Co2, Metric::Soc];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Soc => "soc",
            Metric::Co2 => "co2",
            Metric::Ch4 => "ch4",
            Metric::No3 => "no3",
            Metric::Npp => "npp",
            Metric::N2o => "n2o",
        }
    }

    /// Column heading in SUMMARY.OUT, compared case-insensitively so both
    /// current and legacy ECOSSE headers match.
    pub fn summary_column(&self) -> &'static str {
        match self {
            Metric::Soc => "total_soc",
            Metric::Co2 => "co2_c",
            Metric::Ch4 => "ch4_c",
            Metric::No3 => "no3_n",
            Metric::Npp => "npp_adj",
            Metric::N2o => "n2o_n",
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Soc => MetricKind::Stock,
            _ => MetricKind::Flux,
        }
    }

    pub fn is_extra(&self) -> bool {
        Self::EXTRA.contains(self)
    }

    /// Decimal places written to aggregated result files.
    pub fn precision(&self) -> usize {
        match self {
            Metric::Soc | Metric::Npp => 1,
            Metric::Co2 => 3,
            Metric::Ch4 => 5,
            Metric::No3 | Metric::N2o => 6,
        }
    }

    /// Format a value with this metric's precision.
    pub fn format_value(&self, value: f64) -> String {
        format!("{:.*}", self.precision(), value)
    }

    /// Units of rescaled (per square metre) values.
    pub fn rescaled_units(&self) -> &'static str {
        match self.kind() {
            MetricKind::Stock => "kg C m-2",
            MetricKind::Flux => "kg C m-2 yr-1",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Metric::Soc => "soil organic carbon",
            Metric::Co2 => "carbon dioxide",
            Metric::Ch4 => "methane",
            Metric::No3 => "nitrate leaching",
            Metric::Npp => "net primary production",
            Metric::N2o => "nitrous oxide",
        }
    }
}

impl FromStr for Metric {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Metric::ALL
            .into_iter()
            .find(|m| m.name() == lower)
            .ok_or_else(|| CommonError::UnknownMetric(s.to_string()))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The ordered set of metrics processed by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSet {
    metrics: Vec<Metric>,
}

impl MetricSet {
    /// The core metrics plus whichever extra metrics are requested.
    pub fn with_extras(extras: &[Metric]) -> CommonResult<Self> {
        if let Some(m) = extras.iter().find(|m| !m.is_extra()) {
            return Err(CommonError::UnknownMetric(format!(
                "{} is not an optional metric",
                m
            )));
        }

        let metrics = Metric::ALL
            .into_iter()
            .filter(|m| !m.is_extra() || extras.contains(m))
            .collect();
        Ok(Self { metrics })
    }

    /// Parse a comma separated list of extra metrics, e.g. `no3,npp`.
    pub fn parse_extras(list: &str) -> CommonResult<Self> {
        let extras = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect::<CommonResult<Vec<Metric>>>()?;
        Self::with_extras(&extras)
    }

    pub fn core() -> Self {
        Self {
            metrics: Metric::ALL.into_iter().filter(|m| !m.is_extra()).collect(),
        }
    }

    pub fn contains(&self, metric: Metric) -> bool {
        self.metrics.contains(&metric)
    }

    pub fn iter(&self) -> impl Iterator<Item = Metric> + '_ {
        self.metrics.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

impl Default for MetricSet {
    fn default() -> Self {
        Self::core()
    }
}
