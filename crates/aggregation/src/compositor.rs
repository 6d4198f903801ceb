//! Area-weighted combination of dominant soil results into one cell result.

use std::collections::BTreeMap;

use ecosse_common::{Metric, MetricSet, MAX_NUM_DOM_SOILS};
use tracing::warn;

use crate::error::{AggregationError, Result};
use crate::manifest::Manifest;
use crate::summary::DominantSoilResult;

/// Results collected for the dominant soils of one cell, keyed by slot.
#[derive(Debug, Clone, Default)]
pub struct SoilSlots {
    results: BTreeMap<usize, DominantSoilResult>,
}

impl SoilSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the result of a slot; slots outside `1..=9` are rejected.
    pub fn insert(&mut self, slot: usize, result: DominantSoilResult) -> bool {
        if !(1..=MAX_NUM_DOM_SOILS).contains(&slot) {
            return false;
        }
        self.results.insert(slot, result);
        true
    }

    pub fn get(&self, slot: usize) -> Option<&DominantSoilResult> {
        self.results.get(&slot)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn clear(&mut self) {
        self.results.clear();
    }
}

/// Per-metric series of one grid cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeResult {
    series: BTreeMap<Metric, Vec<f64>>,
}

impl CompositeResult {
    pub fn series(&self, metric: Metric) -> Option<&[f64]> {
        self.series.get(&metric).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, &[f64])> + '_ {
        self.series.iter().map(|(m, v)| (*m, v.as_slice()))
    }
}

/// Outcome of compositing one cell.
#[derive(Debug, Clone)]
pub struct Composition {
    pub result: CompositeResult,
    /// Factor applied to compensate for soils without a result
    pub multiplier: f64,
    /// Number of slots contributing to the composite
    pub num_dom_soils: usize,
    /// Data-quality warnings raised while compositing
    pub warnings: usize,
}

/// Combine the slot results of a cell using the manifest's soil shares.
///
/// Returns `Ok(None)` when no slot with a share contributed. Soils listed in
/// the manifest but without a result are compensated by scaling the whole
/// composite by `1 + Σ missing shares`.
pub fn compose(
    slots: &SoilSlots,
    manifest: &Manifest,
    metrics: &MetricSet,
) -> Result<Option<Composition>> {
    let mut warnings = 0;

    if manifest.share_count() != slots.len() {
        warn!(
            shares = manifest.share_count(),
            results = slots.len(),
            "Number of soil shares differs from the number of soil results"
        );
        warnings += 1;
    }

    let mut contributing = Vec::with_capacity(slots.len());
    for (slot, result) in &slots.results {
        match manifest.get_share(*slot) {
            Some(share) => contributing.push((share, result)),
            None => {
                warn!(slot = slot, "Ignoring soil result without a manifest share");
                warnings += 1;
            }
        }
    }
    if contributing.is_empty() {
        return Ok(None);
    }

    let mut multiplier = 1.0;
    for slot in manifest.slots() {
        if slots.get(slot).is_none() {
            multiplier += manifest.get_share(slot).unwrap_or(0.0);
        }
    }

    let mut composite = BTreeMap::new();
    for metric in metrics.iter() {
        let mut totals: Option<Vec<f64>> = None;
        for (share, result) in &contributing {
            let values = result.series(metric).unwrap_or_default();
            let totals = totals.get_or_insert_with(|| vec![0.0; values.len()]);
            if values.len() != totals.len() {
                return Err(AggregationError::SeriesLengthMismatch {
                    metric: metric.to_string(),
                    len: values.len(),
                    expected: totals.len(),
                });
            }
            for (total, value) in totals.iter_mut().zip(values) {
                *total += share * value;
            }
        }

        let mut totals = totals.unwrap_or_default();
        if multiplier > 1.0 {
            totals.iter_mut().for_each(|v| *v *= multiplier);
        }
        composite.insert(metric, totals);
    }

    Ok(Some(Composition {
        result: CompositeResult { series: composite },
        multiplier,
        num_dom_soils: contributing.len(),
        warnings,
    }))
}
