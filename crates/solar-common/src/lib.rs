//! Common types shared across the solar flux crates and services.

pub mod bounds;
pub mod diagnostics;
pub mod error;
pub mod geo;
pub mod insights;

pub use bounds::{BoundsRepair, GeoBounds, MIN_SAFETY_MARGIN_DEG};
pub use diagnostics::url_prefix;
pub use error::{SolarError, SolarResult};
pub use geo::{LatLng, Viewport};
pub use insights::{BuildingInsights, DataLayers, SolarPotential};
