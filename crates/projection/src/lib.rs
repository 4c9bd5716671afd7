//! Coordinate reference system transformations.
//!
//! Implements the projections flux rasters arrive in, without external
//! dependencies.

pub mod utm;

pub use utm::{UtmError, UtmZone};
