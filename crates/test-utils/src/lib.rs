//! Shared test utilities for the CIS workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic dataset generators (grids, point sets, aircraft tracks)
//! - Fixtures for the end-to-end collocation and aggregation scenarios
//! - A tolerance assertion for plain and masked values
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
//! use test_utils::{fixtures, linear_gridded_field};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use generators::*;

/// A value that can be compared within a tolerance: a plain `f64`, or an
/// `Option<f64>` where `None` marks a masked point.
pub trait Close: std::fmt::Debug + Copy {
    /// `None` when `self` and `other` agree within `tolerance`, otherwise
    /// the reason they differ.
    fn mismatch(self, other: Self, tolerance: f64) -> Option<String>;
}

impl Close for f64 {
    fn mismatch(self, other: Self, tolerance: f64) -> Option<String> {
        if self.is_nan() || other.is_nan() {
            return Some("NaN never compares close".to_string());
        }
        let diff = (self - other).abs();
        (diff > tolerance).then(|| format!("|difference| {diff:e} exceeds {tolerance:e}"))
    }
}

impl Close for Option<f64> {
    fn mismatch(self, other: Self, tolerance: f64) -> Option<String> {
        match (self, other) {
            (Some(a), Some(b)) => a.mismatch(b, tolerance),
            (None, None) => None,
            _ => Some("one side is masked".to_string()),
        }
    }
}

/// Panic with both values unless they are close.
#[track_caller]
pub fn check_close<T: Close>(left: T, right: T, tolerance: f64) {
    if let Some(reason) = left.mismatch(right, tolerance) {
        panic!("values differ: {reason}\n  left: {left:?}\n right: {right:?}");
    }
}

/// `assert_close!(got, expected, tolerance)` over `f64` or masked
/// `Option<f64>` values.
#[macro_export]
macro_rules! assert_close {
    ($left:expr, $right:expr, $tolerance:expr) => {
        $crate::check_close($left, $right, $tolerance)
    };
}
