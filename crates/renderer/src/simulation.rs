//! Simulated overlay from summary scalars.
//!
//! When no flux raster can be fetched, decoded or attached, the overlay is
//! a uniform fill over the building footprint, colored by a coarse
//! intensity derived from the annual sunshine hours.

use serde::{Deserialize, Serialize};
use solar_common::{GeoBounds, LatLng, SolarError, SolarResult, MIN_SAFETY_MARGIN_DEG};
use tracing::{debug, info};

use crate::gradient::Color;
use crate::overlay::{OverlayContent, RenderedOverlay, SimulatedShape};

/// Sunshine hours that map to full intensity.
pub const DEFAULT_SUN_HOURS_CEILING: f64 = 2500.0;

/// Intensity used when a footprint exists but the sunshine scalar does not.
pub const MISSING_SCALAR_INTENSITY: f32 = 0.5;

/// Half-extent of the box synthesized around the anchor when nothing else
/// gives the overlay a shape.
pub const DEFAULT_SYNTHESIZED_HALF_EXTENT_DEG: f64 = 0.0003;

/// Fill opacity of simulated overlays.
pub const SIMULATION_OPACITY: f32 = 0.6;

const STROKE_WEIGHT: f32 = 2.0;

/// Coarse intensity classes of the fallback overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntensityBand {
    Low,
    Good,
    High,
    Optimal,
}

impl IntensityBand {
    pub fn from_intensity(intensity: f32) -> Self {
        match intensity {
            i if i >= 0.9 => IntensityBand::Optimal,
            i if i >= 0.7 => IntensityBand::High,
            i if i >= 0.5 => IntensityBand::Good,
            _ => IntensityBand::Low,
        }
    }

    pub fn fill_color(&self) -> Color {
        match self {
            IntensityBand::Low => Color::new(135, 206, 235, 204),
            IntensityBand::Good => Color::new(255, 215, 0, 204),
            IntensityBand::High => Color::new(255, 140, 0, 230),
            IntensityBand::Optimal => Color::new(255, 69, 0, 255),
        }
    }

    pub fn stroke_color(&self) -> Color {
        match self {
            IntensityBand::Low => Color::new(255, 215, 0, 230),
            IntensityBand::Good => Color::new(255, 140, 0, 230),
            IntensityBand::High | IntensityBand::Optimal => Color::new(255, 69, 0, 230),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IntensityBand::Low => "Low",
            IntensityBand::Good => "Good",
            IntensityBand::High => "High",
            IntensityBand::Optimal => "Optimal",
        }
    }
}

impl std::fmt::Display for IntensityBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What the fallback knows about the building.
#[derive(Debug, Clone, Copy)]
pub struct SimulationInput<'a> {
    pub anchor: LatLng,
    pub max_sunshine_hours: Option<f64>,
    /// Building outline; fewer than 3 points counts as absent.
    pub footprint: &'a [LatLng],
    /// Provider or raster bounds, used when there is no footprint.
    pub bounds: Option<GeoBounds>,
}

/// Produces simulated overlays.
#[derive(Debug, Clone)]
pub struct Simulator {
    pub sun_hours_ceiling: f64,
    pub min_margin_deg: f64,
    pub synthesized_half_extent_deg: f64,
}

impl Default for Simulator {
    fn default() -> Self {
        Self {
            sun_hours_ceiling: DEFAULT_SUN_HOURS_CEILING,
            min_margin_deg: MIN_SAFETY_MARGIN_DEG,
            synthesized_half_extent_deg: DEFAULT_SYNTHESIZED_HALF_EXTENT_DEG,
        }
    }
}

impl Simulator {
    /// `min(hours / ceiling, 1)`, or [`MISSING_SCALAR_INTENSITY`] without a scalar.
    pub fn intensity(&self, max_sunshine_hours: Option<f64>) -> f32 {
        match max_sunshine_hours.filter(|h| h.is_finite() && *h >= 0.0) {
            Some(hours) if self.sun_hours_ceiling > 0.0 => (hours / self.sun_hours_ceiling).min(1.0) as f32,
            Some(_) => 1.0,
            None => MISSING_SCALAR_INTENSITY,
        }
    }

    /// Build the fallback overlay.
    ///
    /// Fails with `NoSolarData` only when there is neither a footprint nor a
    /// sunshine scalar.
    pub fn simulate(&self, input: &SimulationInput<'_>) -> SolarResult<RenderedOverlay> {
        let has_footprint = input.footprint.len() >= 3;
        let has_scalar = input
            .max_sunshine_hours
            .map(|h| h.is_finite() && h >= 0.0)
            .unwrap_or(false);
        if !has_footprint && !has_scalar {
            return Err(SolarError::NoSolarData);
        }
        if !input.anchor.is_valid() {
            return Err(SolarError::InvalidBounds(format!(
                "anchor {} is not a valid location",
                input.anchor
            )));
        }

        let intensity = self.intensity(input.max_sunshine_hours);
        let band = IntensityBand::from_intensity(intensity);

        let (outline, bounds) = if has_footprint {
            let envelope = GeoBounds::envelope(input.footprint.iter().copied())
                .unwrap_or_else(|| GeoBounds::around(input.anchor, self.synthesized_half_extent_deg));
            let bounds = envelope.repair_around(input.anchor, self.min_margin_deg).bounds;
            (input.footprint.to_vec(), bounds)
        } else {
            let base = input
                .bounds
                .unwrap_or_else(|| GeoBounds::around(input.anchor, self.synthesized_half_extent_deg));
            let bounds = base.repair_around(input.anchor, self.min_margin_deg).bounds;
            (rectangle(&bounds), bounds)
        };

        info!(
            intensity,
            band = %band,
            footprint = has_footprint,
            "Rendering simulated flux overlay"
        );
        debug!(sw = %bounds.sw, ne = %bounds.ne, vertices = outline.len(), "Simulated overlay shape");

        Ok(RenderedOverlay {
            content: OverlayContent::Simulated(SimulatedShape {
                outline,
                fill: band.fill_color(),
                stroke: band.stroke_color(),
                stroke_weight: STROKE_WEIGHT,
                band,
                intensity,
            }),
            bounds,
            opacity: SIMULATION_OPACITY,
        })
    }
}

/// Simulate with default parameters.
pub fn simulate(input: &SimulationInput<'_>) -> SolarResult<RenderedOverlay> {
    Simulator::default().simulate(input)
}

/// Corners of `bounds`, counter-clockwise from south-west.
fn rectangle(bounds: &GeoBounds) -> Vec<LatLng> {
    vec![
        LatLng::new(bounds.south(), bounds.west()),
        LatLng::new(bounds.south(), bounds.east()),
        LatLng::new(bounds.north(), bounds.east()),
        LatLng::new(bounds.north(), bounds.west()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_thresholds() {
        assert_eq!(IntensityBand::from_intensity(0.0), IntensityBand::Low);
        assert_eq!(IntensityBand::from_intensity(0.49), IntensityBand::Low);
        assert_eq!(IntensityBand::from_intensity(0.5), IntensityBand::Good);
        assert_eq!(IntensityBand::from_intensity(0.69), IntensityBand::Good);
        assert_eq!(IntensityBand::from_intensity(0.7), IntensityBand::High);
        assert_eq!(IntensityBand::from_intensity(0.9), IntensityBand::Optimal);
        assert_eq!(IntensityBand::from_intensity(1.0), IntensityBand::Optimal);
    }

    #[test]
    fn test_intensity_caps_at_one() {
        let sim = Simulator::default();
        assert_eq!(sim.intensity(Some(2600.0)), 1.0);
        assert_eq!(sim.intensity(Some(1250.0)), 0.5);
        assert_eq!(sim.intensity(None), MISSING_SCALAR_INTENSITY);
    }
}
