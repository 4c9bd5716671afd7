//! Raster buffers before and after decoding.

use bytes::Bytes;
use solar_common::{GeoBounds, SolarError, SolarResult};

/// Raw bytes of a georeferenced image, as received from the proxy.
#[derive(Debug, Clone)]
pub struct GeoRasterBuffer {
    bytes: Bytes,
    content_type: String,
}

impl GeoRasterBuffer {
    /// Wrap a payload, enforcing `0 < len <= max_bytes`.
    pub fn new(bytes: Bytes, content_type: impl Into<String>, max_bytes: u64) -> SolarResult<Self> {
        if bytes.is_empty() {
            return Err(SolarError::DecodeFailure("empty response body".to_string()));
        }
        if bytes.len() as u64 > max_bytes {
            return Err(SolarError::PayloadTooLarge {
                received: bytes.len() as u64,
                limit: max_bytes,
            });
        }
        Ok(Self {
            bytes,
            content_type: content_type.into(),
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

/// Zero, negative and NaN samples carry no flux.
#[inline]
pub fn is_no_data(v: f32) -> bool {
    v.is_nan() || v <= 0.0
}

/// Single-band flux grid with statistics over its valid samples.
#[derive(Debug, Clone)]
pub struct DecodedRaster {
    width: usize,
    height: usize,
    samples: Vec<f32>,
    min: f32,
    max: f32,
    valid_count: usize,
    bounds: Option<GeoBounds>,
}

impl DecodedRaster {
    /// Build from row-major samples.
    ///
    /// Fails with `DecodeFailure` on a dimension mismatch and `EmptyRaster`
    /// when no sample is positive.
    pub fn new(
        width: usize,
        height: usize,
        samples: Vec<f32>,
        bounds: Option<GeoBounds>,
    ) -> SolarResult<Self> {
        if width == 0 || height == 0 {
            return Err(SolarError::DecodeFailure(format!(
                "invalid raster dimensions {}x{}",
                width, height
            )));
        }
        if samples.len() != width * height {
            return Err(SolarError::DecodeFailure(format!(
                "expected {} samples for {}x{}, got {}",
                width * height,
                width,
                height,
                samples.len()
            )));
        }

        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut valid_count = 0;
        for &v in samples.iter().filter(|v| !is_no_data(**v)) {
            min = min.min(v);
            max = max.max(v);
            valid_count += 1;
        }

        if valid_count == 0 {
            return Err(SolarError::EmptyRaster);
        }

        Ok(Self {
            width,
            height,
            samples,
            min,
            max,
            valid_count,
            bounds,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Smallest positive sample.
    pub fn min(&self) -> f32 {
        self.min
    }

    /// Largest positive sample.
    pub fn max(&self) -> f32 {
        self.max
    }

    /// Number of samples that carry flux.
    pub fn valid_count(&self) -> usize {
        self.valid_count
    }

    /// Bounds read from the GeoTIFF tags, if any.
    pub fn bounds(&self) -> Option<GeoBounds> {
        self.bounds
    }

    #[inline]
    pub fn sample(&self, x: usize, y: usize) -> f32 {
        self.samples[y * self.width + x]
    }

    /// Map a sample into [0, 1]; `None` for no-data.
    ///
    /// A uniform raster (`max == min`) normalizes to 0.
    #[inline]
    pub fn normalize(&self, v: f32) -> Option<f32> {
        if is_no_data(v) {
            return None;
        }
        let range = self.max - self.min;
        if range <= 0.0 {
            return Some(0.0);
        }
        Some(((v - self.min) / range).clamp(0.0, 1.0))
    }
}
