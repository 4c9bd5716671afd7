//! Flux overlay rendering.
//!
//! Implements the three stages between a decoded raster and a map:
//! - Gradient color mapping of normalized flux
//! - Viewport resampling into a georeferenced overlay, with a simulated
//!   fallback built from summary scalars
//! - Session ownership of the single attached overlay

pub mod gradient;
pub mod overlay;
pub mod png;
pub mod session;
pub mod simulation;

pub use gradient::{map_to_color, Color, ColorStop, Gradient, DEFAULT_STOPS};
pub use overlay::{
    render_overlay, OverlayContent, OverlayImage, OverlayRenderer, RenderedOverlay, Resampling, SimulatedShape,
    RASTER_OPACITY,
};
pub use session::{AttachOutcome, MapView, MemoryMapView, OverlayHandle, OverlaySession, SearchState, SearchTicket};
pub use simulation::{
    simulate, IntensityBand, SimulationInput, Simulator, DEFAULT_SUN_HOURS_CEILING, DEFAULT_SYNTHESIZED_HALF_EXTENT_DEG,
    SIMULATION_OPACITY,
};
