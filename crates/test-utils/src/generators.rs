//! Generators for synthetic metric series.
//!
//! These create predictable, verifiable values so tests can check
//! composites and conversions by hand.

/// A series of `len` copies of `value`.
///
/// # Example
///
/// ```
/// use test_utils::constant_series;
///
/// assert_eq!(constant_series(3, 2.5), vec![2.5, 2.5, 2.5]);
/// ```
pub fn constant_series(len: usize, value: f64) -> Vec<f64> {
    vec![value; len]
}

/// A linearly increasing series: `start, start + step, …`.
///
/// # Example
///
/// ```
/// use test_utils::ramp_series;
///
/// assert_eq!(ramp_series(3, 10.0, 0.5), vec![10.0, 10.5, 11.0]);
/// ```
pub fn ramp_series(len: usize, start: f64, step: f64) -> Vec<f64> {
    (0..len).map(|i| start + step * i as f64).collect()
}

/// Values that encode their own position: `slot * 1000 + index`.
///
/// Makes it easy to check that a composite or a raster cell received the
/// series of the expected soil.
///
/// # Example
///
/// ```
/// use test_utils::tagged_series;
///
/// assert_eq!(tagged_series(2, 3), vec![2000.0, 2001.0, 2002.0]);
/// ```
pub fn tagged_series(slot: usize, len: usize) -> Vec<f64> {
    (0..len).map(|i| (slot * 1000 + i) as f64).collect()
}
