//! Flux color ramp.
//!
//! Normalized flux in [0, 1] maps onto a fixed multi-stop gradient that
//! runs from transparent through light blue, green, yellow and orange to
//! red. Alpha rises with the value, so low-flux roof areas fade into the
//! basemap.

use serde::{Deserialize, Serialize};
use solar_common::{SolarError, SolarResult};

/// Color value in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn transparent() -> Self {
        Self { r: 0, g: 0, b: 0, a: 0 }
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// `#RRGGBB` form, as map views expect for fill and stroke colors.
    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// A color pinned to a normalized value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub value: f32,
    pub color: Color,
}

impl ColorStop {
    pub const fn new(value: f32, color: Color) -> Self {
        Self { value, color }
    }
}

/// The flux gradient.
pub const DEFAULT_STOPS: [ColorStop; 6] = [
    ColorStop::new(0.0, Color::new(0, 0, 0, 0)),
    ColorStop::new(0.1, Color::new(100, 150, 200, 80)),
    ColorStop::new(0.25, Color::new(150, 200, 100, 120)),
    ColorStop::new(0.5, Color::new(255, 255, 0, 180)),
    ColorStop::new(0.75, Color::new(255, 165, 0, 220)),
    ColorStop::new(1.0, Color::new(255, 0, 0, 255)),
];

/// Validated, ascending list of color stops spanning [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    stops: Vec<ColorStop>,
}

impl Gradient {
    /// Validate and build a gradient.
    ///
    /// Requires at least two finite stops in strictly ascending order, the
    /// first at 0 and the last at 1.
    pub fn new(stops: Vec<ColorStop>) -> SolarResult<Self> {
        if stops.len() < 2 {
            return Err(SolarError::InvalidGradient(format!(
                "need at least 2 stops, got {}",
                stops.len()
            )));
        }
        if let Some(bad) = stops.iter().find(|s| !s.value.is_finite()) {
            return Err(SolarError::InvalidGradient(format!(
                "non-finite stop value {}",
                bad.value
            )));
        }
        if let Some(pair) = stops.windows(2).find(|w| w[1].value <= w[0].value) {
            return Err(SolarError::InvalidGradient(format!(
                "stops not ascending: {} then {}",
                pair[0].value, pair[1].value
            )));
        }
        let (first, last) = (stops[0].value, stops[stops.len() - 1].value);
        if first != 0.0 || last != 1.0 {
            return Err(SolarError::InvalidGradient(format!(
                "stops must span [0, 1], got [{}, {}]",
                first, last
            )));
        }
        Ok(Self { stops })
    }

    /// The default flux gradient.
    pub fn flux() -> Self {
        Self {
            stops: DEFAULT_STOPS.to_vec(),
        }
    }

    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    /// Color for a normalized value.
    ///
    /// Values are clamped to [0, 1]; zero, negative and NaN map to
    /// transparent.
    #[inline]
    pub fn map_to_color(&self, v: f32) -> Color {
        color_at(&self.stops, v)
    }
}

impl Default for Gradient {
    fn default() -> Self {
        Self::flux()
    }
}

/// [`Gradient::map_to_color`] on the default flux gradient.
#[inline]
pub fn map_to_color(v: f32) -> Color {
    color_at(&DEFAULT_STOPS, v)
}

fn color_at(stops: &[ColorStop], v: f32) -> Color {
    if v.is_nan() || v <= 0.0 {
        return Color::transparent();
    }
    let v = v.min(1.0);

    // Stops are ascending and span [0, 1], so some pair brackets v.
    for pair in stops.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if v <= hi.value {
            let t = (v - lo.value) / (hi.value - lo.value);
            return interpolate_color(lo.color, hi.color, t);
        }
    }
    stops.last().map(|s| s.color).unwrap_or(Color::transparent())
}

/// Linear color interpolation, channels rounded to nearest
pub fn interpolate_color(color1: Color, color2: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;

    Color::new(
        lerp(color1.r, color2.r),
        lerp(color1.g, color2.g),
        lerp(color1.b, color2.b),
        lerp(color1.a, color2.a),
    )
}
