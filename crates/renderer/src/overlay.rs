//! Georeferenced flux overlays.
//!
//! A decoded raster is resampled onto a viewport-sized RGBA canvas through
//! the flux gradient. The canvas is anchored to bounds that have been
//! checked against the searched location, so the overlay always covers it.
//!
//! Row 0 of both the raster and the canvas is the northern edge; the
//! canvas's south-west and north-east corners sit on the corresponding
//! corners of the overlay bounds.

use flux_raster::{is_no_data, DecodedRaster};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use solar_common::{GeoBounds, LatLng, SolarError, SolarResult, Viewport, MIN_SAFETY_MARGIN_DEG};
use tracing::{debug, warn};

use crate::gradient::{Color, Gradient};
use crate::png;
use crate::simulation::IntensityBand;

/// Display opacity of an overlay rendered from real flux data.
pub const RASTER_OPACITY: f32 = 0.9;

/// How destination pixels pick source samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resampling {
    /// `src = floor(dst / dst_size * src_size)`
    #[default]
    Nearest,
    /// Weighted blend of the valid neighbours around the pixel center.
    /// Pixels whose nearest sample is no-data stay transparent.
    Bilinear,
}

/// RGBA canvas, row-major, 4 bytes per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl OverlayImage {
    pub fn pixel(&self, x: u32, y: u32) -> Color {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Color::new(
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        )
    }

    /// Encode as PNG, indexed when the palette allows.
    pub fn to_png(&self) -> SolarResult<Vec<u8>> {
        png::create_png_auto(&self.pixels, self.width as usize, self.height as usize)
            .map_err(SolarError::MapView)
    }
}

/// Uniform-fill polygon produced by the simulation fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedShape {
    /// Closed ring, first point not repeated.
    pub outline: Vec<LatLng>,
    pub fill: Color,
    pub stroke: Color,
    pub stroke_weight: f32,
    pub band: IntensityBand,
    pub intensity: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayContent {
    Image(OverlayImage),
    Simulated(SimulatedShape),
}

/// An overlay ready to attach to a map view.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedOverlay {
    pub content: OverlayContent,
    pub bounds: GeoBounds,
    pub opacity: f32,
}

impl RenderedOverlay {
    pub fn is_simulated(&self) -> bool {
        matches!(self.content, OverlayContent::Simulated(_))
    }

    pub fn kind(&self) -> &'static str {
        match self.content {
            OverlayContent::Image(_) => "flux_image",
            OverlayContent::Simulated(_) => "simulated",
        }
    }

    pub fn image(&self) -> Option<&OverlayImage> {
        match &self.content {
            OverlayContent::Image(img) => Some(img),
            OverlayContent::Simulated(_) => None,
        }
    }

    pub fn shape(&self) -> Option<&SimulatedShape> {
        match &self.content {
            OverlayContent::Simulated(shape) => Some(shape),
            OverlayContent::Image(_) => None,
        }
    }
}

/// Renders decoded rasters into overlays.
#[derive(Debug, Clone)]
pub struct OverlayRenderer {
    gradient: Gradient,
    resampling: Resampling,
    min_margin_deg: f64,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self {
            gradient: Gradient::flux(),
            resampling: Resampling::Nearest,
            min_margin_deg: MIN_SAFETY_MARGIN_DEG,
        }
    }
}

impl OverlayRenderer {
    pub fn new(gradient: Gradient, resampling: Resampling) -> Self {
        Self {
            gradient,
            resampling,
            ..Self::default()
        }
    }

    pub fn with_min_margin(mut self, min_margin_deg: f64) -> Self {
        self.min_margin_deg = min_margin_deg;
        self
    }

    pub fn resampling(&self) -> Resampling {
        self.resampling
    }

    /// Check `bounds` against `anchor`, repairing them if needed.
    pub fn resolve_bounds(&self, bounds: GeoBounds, anchor: LatLng) -> SolarResult<GeoBounds> {
        if !anchor.is_valid() {
            return Err(SolarError::InvalidBounds(format!("anchor {} is not a valid location", anchor)));
        }

        let repair = bounds.repair_around(anchor, self.min_margin_deg);
        if repair.repaired {
            warn!(
                anchor = %anchor,
                original_sw = %bounds.sw,
                original_ne = %bounds.ne,
                repaired_sw = %repair.bounds.sw,
                repaired_ne = %repair.bounds.ne,
                "Overlay bounds did not contain the anchor, recentered"
            );
        }
        if repair.bounds.has_unusual_extent() {
            warn!(
                width_deg = repair.bounds.width_deg(),
                height_deg = repair.bounds.height_deg(),
                "Overlay bounds have an unusual extent"
            );
        }
        Ok(repair.bounds)
    }

    /// Resample `raster` onto a `viewport` canvas anchored to `bounds`.
    pub fn render(
        &self,
        raster: &DecodedRaster,
        bounds: GeoBounds,
        anchor: LatLng,
        viewport: Viewport,
    ) -> SolarResult<RenderedOverlay> {
        if viewport.is_empty() {
            return Err(SolarError::Config(format!(
                "viewport must be non-empty, got {}x{}",
                viewport.width_px, viewport.height_px
            )));
        }
        let bounds = self.resolve_bounds(bounds, anchor)?;

        let pixels = self.render_pixels(raster, viewport);
        debug!(
            width = viewport.width_px,
            height = viewport.height_px,
            resampling = ?self.resampling,
            "Rendered flux overlay"
        );

        Ok(RenderedOverlay {
            content: OverlayContent::Image(OverlayImage {
                width: viewport.width_px,
                height: viewport.height_px,
                pixels,
            }),
            bounds,
            opacity: RASTER_OPACITY,
        })
    }

    /// RGBA pixels for the viewport; rows are filled in parallel.
    pub fn render_pixels(&self, raster: &DecodedRaster, viewport: Viewport) -> Vec<u8> {
        let (vw, vh) = (viewport.width_px as usize, viewport.height_px as usize);
        let mut pixels = vec![0u8; vw * vh * 4];

        pixels.par_chunks_mut(vw * 4).enumerate().for_each(|(y, row)| {
            let src_y = nearest_index(y, vh, raster.height());
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let src_x = nearest_index(x, vw, raster.width());
                let color = self.color_for(raster, x, y, src_x, src_y, vw, vh);
                px.copy_from_slice(&color.to_array());
            }
        });

        pixels
    }

    #[allow(clippy::too_many_arguments)]
    #[inline]
    fn color_for(
        &self,
        raster: &DecodedRaster,
        x: usize,
        y: usize,
        src_x: usize,
        src_y: usize,
        vw: usize,
        vh: usize,
    ) -> Color {
        let nearest = raster.sample(src_x, src_y);
        if is_no_data(nearest) {
            return Color::transparent();
        }

        let value = match self.resampling {
            Resampling::Nearest => nearest,
            Resampling::Bilinear => bilinear_sample(raster, x, y, vw, vh).unwrap_or(nearest),
        };

        match raster.normalize(value) {
            Some(n) => self.gradient.map_to_color(n),
            None => Color::transparent(),
        }
    }
}

/// Render with the default gradient and nearest-neighbour sampling.
pub fn render_overlay(
    raster: &DecodedRaster,
    bounds: GeoBounds,
    anchor: LatLng,
    viewport: Viewport,
) -> SolarResult<RenderedOverlay> {
    OverlayRenderer::default().render(raster, bounds, anchor, viewport)
}

/// `floor(dst / dst_size * src_size)` in integer arithmetic.
#[inline]
fn nearest_index(dst: usize, dst_size: usize, src_size: usize) -> usize {
    (dst * src_size / dst_size).min(src_size - 1)
}

/// Blend of the up to four valid samples around the pixel center.
fn bilinear_sample(raster: &DecodedRaster, x: usize, y: usize, vw: usize, vh: usize) -> Option<f32> {
    let sx = ((x as f32 + 0.5) * raster.width() as f32 / vw as f32 - 0.5).clamp(0.0, (raster.width() - 1) as f32);
    let sy = ((y as f32 + 0.5) * raster.height() as f32 / vh as f32 - 0.5).clamp(0.0, (raster.height() - 1) as f32);

    let x0 = sx.floor() as usize;
    let y0 = sy.floor() as usize;
    let x1 = (x0 + 1).min(raster.width() - 1);
    let y1 = (y0 + 1).min(raster.height() - 1);
    let dx = sx - x0 as f32;
    let dy = sy - y0 as f32;

    let taps = [
        (raster.sample(x0, y0), (1.0 - dx) * (1.0 - dy)),
        (raster.sample(x1, y0), dx * (1.0 - dy)),
        (raster.sample(x0, y1), (1.0 - dx) * dy),
        (raster.sample(x1, y1), dx * dy),
    ];

    let (sum, weight) = taps
        .iter()
        .filter(|(v, _)| !is_no_data(*v))
        .fold((0.0f32, 0.0f32), |(s, w), (v, wt)| (s + v * wt, w + wt));

    (weight > 0.0).then(|| sum / weight)
}
