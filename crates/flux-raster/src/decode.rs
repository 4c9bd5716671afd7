//! First-band GeoTIFF decoding.

use std::io::Cursor;

use solar_common::{SolarError, SolarResult};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tracing::{debug, instrument};

use crate::georef::{GeoReference, TAG_GEO_KEY_DIRECTORY, TAG_MODEL_PIXEL_SCALE, TAG_MODEL_TIEPOINT};
use crate::raster::{DecodedRaster, GeoRasterBuffer};

/// Decode the first band of a GeoTIFF into `f32` samples.
///
/// Any integer or float sample format is accepted. Multi-sample pixels
/// keep their first sample. Embedded bounds are attached when the file is
/// georeferenced in a CRS we can place.
#[instrument(skip(buffer), fields(bytes = buffer.len()))]
pub fn decode_raster(buffer: GeoRasterBuffer) -> SolarResult<DecodedRaster> {
    let mut decoder = Decoder::new(Cursor::new(buffer.into_bytes()))
        .map_err(|e| SolarError::DecodeFailure(format!("not a readable TIFF: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| SolarError::DecodeFailure(e.to_string()))?;
    let (width, height) = (width as usize, height as usize);
    if width == 0 || height == 0 {
        return Err(SolarError::DecodeFailure(format!(
            "invalid raster dimensions {}x{}",
            width, height
        )));
    }

    let georef = read_georeference(&mut decoder);

    let image = decoder
        .read_image()
        .map_err(|e| SolarError::DecodeFailure(e.to_string()))?;
    let samples = first_band(image, width * height)?;

    let bounds = georef.as_ref().and_then(|g| g.bounds(width, height));
    debug!(width, height, crs = ?georef.as_ref().map(|g| g.crs), has_bounds = bounds.is_some(), "Decoded raster");

    DecodedRaster::new(width, height, samples, bounds)
}

fn read_georeference<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<GeoReference> {
    let scale = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_MODEL_PIXEL_SCALE)).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_MODEL_TIEPOINT)).ok()?;
    let keys = decoder.get_tag_u16_vec(Tag::from_u16_exhaustive(TAG_GEO_KEY_DIRECTORY)).ok();
    GeoReference::from_tags(&tiepoint, &scale, keys.as_deref())
}

/// Widen every sample to `f32`, then keep the first of each pixel.
fn first_band(image: DecodingResult, pixels: usize) -> SolarResult<Vec<f32>> {
    let values: Vec<f32> = match image {
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|s| s as f32).collect(),
    };

    if values.is_empty() || values.len() % pixels != 0 {
        return Err(SolarError::DecodeFailure(format!(
            "{} samples do not divide into {} pixels",
            values.len(),
            pixels
        )));
    }

    let samples_per_pixel = values.len() / pixels;
    if samples_per_pixel == 1 {
        return Ok(values);
    }
    Ok(values.into_iter().step_by(samples_per_pixel).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_band_of_rgb() {
        let image = DecodingResult::U8(vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(first_band(image, 2).unwrap(), vec![1.0, 4.0]);
    }

    #[test]
    fn test_first_band_rejects_ragged() {
        let image = DecodingResult::F32(vec![1.0, 2.0, 3.0]);
        assert!(first_band(image, 2).is_err());
    }

    #[test]
    fn test_garbage_bytes() {
        let buffer = GeoRasterBuffer::new(bytes::Bytes::from_static(b"<html>nope</html>"), "text/html", 1024).unwrap();
        assert!(matches!(decode_raster(buffer), Err(SolarError::DecodeFailure(_))));
    }
}
