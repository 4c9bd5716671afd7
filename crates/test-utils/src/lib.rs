//! Shared test utilities for the solar flux workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic flux grids and in-memory GeoTIFF encoding
//! - Provider response fixtures
//! - An in-process HTTP server for fetch and client tests
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
//! use test_utils::{encode_test_geotiff, fixtures, spawn_server};
//! ```

pub mod fixtures;
pub mod generators;
pub mod server;

// Re-export commonly used items at the crate root
pub use generators::*;
pub use server::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
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

/// Approximate equality of anything with `lat`/`lng` fields against a pair.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_latlng_approx_eq;
///
/// assert_latlng_approx_eq!(bounds.center(), (27.95, -82.46), 1e-9);
/// ```
#[macro_export]
macro_rules! assert_latlng_approx_eq {
    ($point:expr, ($lat:expr, $lng:expr), $epsilon:expr) => {{
        let point = $point;
        $crate::assert_approx_eq!(point.lat, $lat, $epsilon);
        $crate::assert_approx_eq!(point.lng, $lng, $epsilon);
    }};
}

#[cfg(test)]
mod tests {
    struct Point {
        lat: f64,
        lng: f64,
    }

    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(0.0, 0.0, 0.0001);
        assert_approx_eq!(-82.46, -82.460001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }

    #[test]
    fn test_assert_latlng_approx_eq_passes() {
        let p = Point { lat: 27.9500001, lng: -82.46 };
        assert_latlng_approx_eq!(p, (27.95, -82.46), 1e-6);
    }
}
