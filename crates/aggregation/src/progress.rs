//! Run counters and periodic progress reporting.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::info;

use crate::error::{AggregationError, Result};

/// Tally of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Cells written to output
    pub completed: usize,
    /// Cells dropped, e.g. for a missing manifest or out-of-bounds location
    pub skipped: usize,
    /// Data-quality warnings
    pub warnings: usize,
    /// Unusable records or simulation results
    pub failed: usize,
    /// Area of the completed cells, km2
    pub total_area_km2: f64,
}

impl RunSummary {
    pub fn record_completed(&mut self, area_km2: f64) {
        self.completed += 1;
        self.total_area_km2 += area_km2;
    }

    /// Log the final tally.
    pub fn log(&self, stage: &str) {
        info!(
            stage = stage,
            completed = self.completed,
            skipped = self.skipped,
            warnings = self.warnings,
            failures = self.failed,
            total_area_km2 = self.total_area_km2,
            "Run finished: {}",
            self
        );
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "# completed: {} skipped: {} warnings: {} failures: {} Total area covered: {:.1} km2",
            self.completed, self.skipped, self.warnings, self.failed, self.total_area_km2
        )
    }
}

/// Counts failures and aborts the run once the limit is exceeded.
#[derive(Debug, Clone)]
pub struct FailureBudget {
    max_failures: usize,
}

impl FailureBudget {
    pub fn new(max_failures: usize) -> Self {
        Self { max_failures }
    }

    /// Record one failure in `summary`.
    pub fn charge(&self, summary: &mut RunSummary) -> Result<()> {
        summary.failed += 1;
        if summary.failed > self.max_failures {
            return Err(AggregationError::TooManyFailures {
                failures: summary.failed,
                max_failures: self.max_failures,
            });
        }
        Ok(())
    }
}

/// Logs a progress line at most once per interval.
#[derive(Debug)]
pub struct ProgressReporter {
    interval: Duration,
    started: Instant,
    last: Instant,
    total: usize,
}

impl ProgressReporter {
    /// `total` is the expected number of cells.
    pub fn new(interval: Duration, total: usize) -> Self {
        let now = Instant::now();
        Self {
            interval,
            started: now,
            last: now,
            total,
        }
    }

    /// Log progress if the interval has elapsed. Returns whether it logged.
    pub fn update(&mut self, summary: &RunSummary) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last) < self.interval {
            return false;
        }
        self.last = now;

        info!(
            completed = summary.completed,
            skipped = summary.skipped,
            warnings = summary.warnings,
            remaining = self.remaining(summary),
            elapsed_secs = self.started.elapsed().as_secs(),
            "Progress"
        );
        true
    }

    pub fn remaining(&self, summary: &RunSummary) -> usize {
        self.total.saturating_sub(summary.completed)
    }
}
