//! Per-metric result files.
//!
//! Every aggregated metric is written to its own `<study>_<metric>.txt`
//! file: a header line, then one line per grid cell holding an 8-field
//! prefix followed by the cell's values. The files of one study list the
//! cells in the same order, so they are read in lock step.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use ecosse_common::{Metric, MetricSet, Timestep};
use tracing::{debug, info};

use crate::error::{AggregationError, Result};

/// Number of leading identification fields of every data line.
pub const PREFIX_LEN: usize = 8;

/// Column names of the identification fields.
pub const COMMON_HEADERS: [&str; PREFIX_LEN] = [
    "province",
    "latitude",
    "longitude",
    "mu_global",
    "scenario",
    "num_dom_soils",
    "land_use",
    "area",
];

/// Identification fields of a data line.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPrefix {
    pub fields: [String; PREFIX_LEN],
    pub latitude: f64,
    pub longitude: f64,
    pub mu_global: Option<u32>,
    pub area_km2: f64,
}

impl RecordPrefix {
    pub fn province(&self) -> &str {
        &self.fields[0]
    }

    pub fn scenario(&self) -> &str {
        &self.fields[4]
    }

    pub fn land_use(&self) -> &str {
        &self.fields[6]
    }

    /// Whether two prefixes describe the same cell.
    pub fn same_cell(&self, other: &RecordPrefix) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }
}

/// One parsed data line.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub prefix: RecordPrefix,
    pub values: Vec<f64>,
}

/// Split a data line into fields. Tab separated lines keep fields holding
/// spaces, such as province names; anything else splits on whitespace.
pub(crate) fn split_fields(line: &str) -> Vec<&str> {
    if line.contains('\t') {
        line.split('\t').map(str::trim).collect()
    } else {
        line.split_whitespace().collect()
    }
}

/// Parse a data line holding exactly `expected_fields` values after the prefix.
pub fn parse_record(line: &str, expected_fields: usize, line_no: usize) -> Result<ResultRecord> {
    let malformed = |reason: String| AggregationError::MalformedRecord {
        line: line_no,
        reason,
    };

    let fields = split_fields(line.trim_end_matches(['\r', '\n']));
    if fields.len() < PREFIX_LEN {
        return Err(malformed(format!("only {} fields", fields.len())));
    }
    let (prefix, values) = fields.split_at(PREFIX_LEN);
    if values.len() != expected_fields {
        return Err(malformed(format!(
            "{} values, expected {}",
            values.len(),
            expected_fields
        )));
    }

    let number = |index: usize| -> Result<f64> {
        prefix[index].parse().map_err(|_| {
            malformed(format!("invalid {} '{}'", COMMON_HEADERS[index], prefix[index]))
        })
    };
    let latitude = number(1)?;
    let longitude = number(2)?;
    let area_km2 = number(7)?;
    let mu_global = prefix[3].parse().ok();

    let values = values
        .iter()
        .map(|v| {
            v.parse::<f64>()
                .map_err(|_| malformed(format!("invalid value '{}'", v)))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ResultRecord {
        prefix: RecordPrefix {
            fields: std::array::from_fn(|i| prefix[i].to_string()),
            latitude,
            longitude,
            mu_global,
            area_km2,
        },
        values,
    })
}

// ============================================================================
// Lock-step reading
// ============================================================================

/// Values of every metric for one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedRecord {
    pub prefix: RecordPrefix,
    pub values: BTreeMap<Metric, Vec<f64>>,
}

impl CombinedRecord {
    pub fn values(&self, metric: Metric) -> Option<&[f64]> {
        self.values.get(&metric).map(Vec::as_slice)
    }
}

struct MetricFile {
    metric: Metric,
    lines: Lines<BufReader<File>>,
}

/// One open file per metric, read one line per file at a time.
///
/// Iteration ends as soon as any file is exhausted. A line that is malformed
/// in any file yields `MalformedRecord` for the whole combined line.
pub struct MetricFileSet {
    files: Vec<MetricFile>,
    expected_fields: usize,
    line_no: usize,
    exhausted: bool,
}

impl MetricFileSet {
    /// Open the files and skip their header lines.
    pub fn open(paths: &BTreeMap<Metric, PathBuf>, expected_fields: usize) -> Result<Self> {
        let mut files = Vec::with_capacity(paths.len());
        for (metric, path) in paths {
            let mut lines = BufReader::new(File::open(path)?).lines();
            lines.next().transpose()?;
            files.push(MetricFile {
                metric: *metric,
                lines,
            });
        }

        Ok(Self {
            exhausted: files.is_empty(),
            files,
            expected_fields,
            line_no: 1,
        })
    }

    pub fn metrics(&self) -> impl Iterator<Item = Metric> + '_ {
        self.files.iter().map(|f| f.metric)
    }

    /// Line number, header included, of the last line read.
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    fn read_lines(&mut self) -> Result<Option<Vec<(Metric, String)>>> {
        let mut lines = Vec::with_capacity(self.files.len());
        for file in &mut self.files {
            match file.lines.next() {
                Some(line) => lines.push((file.metric, line?)),
                None => return Ok(None),
            }
        }
        Ok(Some(lines))
    }

    fn combine(&self, lines: Vec<(Metric, String)>) -> Result<CombinedRecord> {
        let mut prefix: Option<RecordPrefix> = None;
        let mut values = BTreeMap::new();

        for (metric, line) in lines {
            let record = parse_record(&line, self.expected_fields, self.line_no)?;
            if let Some(first) = &prefix {
                if !first.same_cell(&record.prefix) {
                    return Err(AggregationError::MalformedRecord {
                        line: self.line_no,
                        reason: format!(
                            "{} file is at ({}, {}), expected ({}, {})",
                            metric,
                            record.prefix.latitude,
                            record.prefix.longitude,
                            first.latitude,
                            first.longitude
                        ),
                    });
                }
            } else {
                prefix = Some(record.prefix);
            }
            values.insert(metric, record.values);
        }

        let prefix = prefix.ok_or_else(|| AggregationError::NoInput("no metric files".to_string()))?;
        Ok(CombinedRecord { prefix, values })
    }
}

impl Iterator for MetricFileSet {
    type Item = Result<CombinedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let lines = match self.read_lines() {
            Ok(Some(lines)) => lines,
            Ok(None) => {
                self.exhausted = true;
                return None;
            }
            Err(e) => {
                self.exhausted = true;
                return Some(Err(e));
            }
        };
        self.line_no += 1;
        Some(self.combine(lines))
    }
}

// ============================================================================
// Discovery
// ============================================================================

/// Per-metric result files found in a results directory.
#[derive(Debug, Clone)]
pub struct ResultsInventory {
    pub files: BTreeMap<Metric, PathBuf>,
    /// Values per data line, prefix excluded
    pub nfields: usize,
    /// Lines of the first file, header included
    pub nlines: usize,
    pub timestep: Timestep,
}

impl ResultsInventory {
    /// Find the result file of every requested metric, named `*_<metric>.txt`.
    pub fn discover(results_dir: &Path, metrics: &MetricSet) -> Result<Self> {
        let mut names: Vec<PathBuf> = std::fs::read_dir(results_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        names.sort();

        let mut files = BTreeMap::new();
        for metric in metrics.iter() {
            let suffix = format!("_{}.txt", metric);
            let found = names.iter().find(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.ends_with(&suffix))
                    .unwrap_or(false)
            });
            match found {
                Some(path) => {
                    files.insert(metric, path.clone());
                }
                None => debug!(metric = %metric, "No result file for metric"),
            }
        }

        let Some(first) = files.values().next() else {
            return Err(AggregationError::NoInput(format!(
                "no result files in {}",
                results_dir.display()
            )));
        };

        let (nfields, nlines) = inspect_file(first)?;
        let timestep = Timestep::from_field_count(nfields);
        info!(
            files = files.len(),
            nfields = nfields,
            nlines = nlines,
            timestep = ?timestep,
            "Discovered result files"
        );

        Ok(Self {
            files,
            nfields,
            nlines,
            timestep,
        })
    }

    pub fn contains(&self, metric: Metric) -> bool {
        self.files.contains_key(&metric)
    }

    /// Inventory restricted to the given metrics, `None` if any is missing.
    pub fn subset(&self, metrics: &[Metric]) -> Option<BTreeMap<Metric, PathBuf>> {
        metrics
            .iter()
            .map(|m| self.files.get(m).map(|p| (*m, p.clone())))
            .collect()
    }

    /// Number of data lines, header excluded.
    pub fn data_lines(&self) -> usize {
        self.nlines.saturating_sub(1)
    }
}

/// Value count of the first data line, and the number of lines.
fn inspect_file(path: &Path) -> Result<(usize, usize)> {
    let reader = BufReader::new(File::open(path)?);
    let mut nfields = None;
    let mut nlines = 0;

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        nlines += 1;
        if i == 1 {
            let fields = split_fields(&line).len();
            if fields < PREFIX_LEN {
                return Err(AggregationError::MalformedRecord {
                    line: 2,
                    reason: format!("first data line of {} has {} fields", path.display(), fields),
                });
            }
            nfields = Some(fields - PREFIX_LEN);
        }
    }

    let nfields = nfields.ok_or_else(|| {
        AggregationError::NoInput(format!("{} has no data lines", path.display()))
    })?;
    Ok((nfields, nlines))
}
