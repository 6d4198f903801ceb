//! Tab-delimited per-metric result files.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{Writer, WriterBuilder};
use ecosse_common::{Metric, MetricSet};
use tracing::info;

use crate::error::{AggregationError, Result};
use crate::records::COMMON_HEADERS;

/// Name of the result file of one metric, e.g. `uk_arable_soc.txt`.
pub fn result_file_name(study: &str, metric: Metric) -> String {
    format!("{}_{}.txt", study, metric)
}

/// Remove an existing output file when overwriting, otherwise refuse.
pub fn prepare_output(path: &Path, overwrite: bool) -> Result<()> {
    if path.exists() {
        if !overwrite {
            return Err(AggregationError::OutputExists(path.to_path_buf()));
        }
        std::fs::remove_file(path)?;
        info!(path = %path.display(), "Deleted existing output file");
    }
    Ok(())
}

/// One open result file per metric, all sharing a header.
pub struct CsvResultWriter {
    writers: BTreeMap<Metric, Writer<File>>,
    paths: Vec<PathBuf>,
    rows: usize,
}

impl CsvResultWriter {
    /// Create `<study>_<metric>.txt` for every metric and write the header
    /// of the 8 prefix columns followed by `time_labels`.
    pub fn create(
        results_dir: &Path,
        study: &str,
        metrics: &MetricSet,
        time_labels: &[String],
        overwrite: bool,
    ) -> Result<Self> {
        let mut header: Vec<&str> = COMMON_HEADERS.to_vec();
        header.extend(time_labels.iter().map(String::as_str));

        let mut writers = BTreeMap::new();
        let mut paths = Vec::with_capacity(metrics.len());
        for metric in metrics.iter() {
            let path = results_dir.join(result_file_name(study, metric));
            prepare_output(&path, overwrite)?;

            let mut writer = WriterBuilder::new()
                .delimiter(b'\t')
                .has_headers(false)
                .flexible(true)
                .from_path(&path)?;
            writer.write_record(&header)?;

            info!(path = %path.display(), metric = %metric, "Created result file");
            writers.insert(metric, writer);
            paths.push(path);
        }

        Ok(Self {
            writers,
            paths,
            rows: 0,
        })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Data rows written per file.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Write one row per metric: the shared prefix, then values formatted
    /// with the metric's precision.
    pub fn write_cell<'a>(
        &mut self,
        prefix: &[String],
        series: impl IntoIterator<Item = (Metric, &'a [f64])>,
    ) -> Result<()> {
        self.write_cell_rows(prefix, 1, series)
    }

    /// Like [`write_cell`](Self::write_cell), repeating each row `copies`
    /// times, e.g. once per granular longitude of the cell.
    pub fn write_cell_rows<'a>(
        &mut self,
        prefix: &[String],
        copies: usize,
        series: impl IntoIterator<Item = (Metric, &'a [f64])>,
    ) -> Result<()> {
        for (metric, values) in series {
            let Some(writer) = self.writers.get_mut(&metric) else {
                continue;
            };
            let formatted: Vec<String> = values.iter().map(|v| metric.format_value(*v)).collect();
            for _ in 0..copies {
                writer.write_record(prefix.iter().chain(&formatted))?;
            }
        }
        self.rows += copies;
        Ok(())
    }

    pub fn finish(mut self) -> Result<Vec<PathBuf>> {
        for writer in self.writers.values_mut() {
            writer.flush()?;
        }
        Ok(self.paths)
    }
}
