//! Shared test utilities for the ecosse post-processing workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Fixture builders for simulation directories, manifests and result files
//! - Metric series generators
//! - Approximate float assertions
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{assert_approx_eq, SimsDirFixture};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

/// Default tolerance of the two-argument form of [`assert_approx_eq!`].
pub const DEFAULT_EPSILON: f64 = 1.0e-9;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(0.1 + 0.2, 0.3);                 // passes, default epsilon
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr $(,)?) => {
        $crate::assert_approx_eq!($left, $right, $crate::DEFAULT_EPSILON)
    };
    ($left:expr, $right:expr, $epsilon:expr $(,)?) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Element-wise [`assert_approx_eq!`] over two slices of equal length.
#[macro_export]
macro_rules! assert_series_approx_eq {
    ($left:expr, $right:expr $(,)?) => {
        $crate::assert_series_approx_eq!($left, $right, $crate::DEFAULT_EPSILON)
    };
    ($left:expr, $right:expr, $epsilon:expr $(,)?) => {{
        let left: &[f64] = &$left[..];
        let right: &[f64] = &$right[..];
        assert_eq!(left.len(), right.len(), "series lengths differ");
        for (l, r) in left.iter().zip(right.iter()) {
            $crate::assert_approx_eq!(*l, *r, $epsilon);
        }
    }};
}
