//! Synthetic flux grids and in-memory TIFF encoding.
//!
//! Grids are row-major `Vec<f32>` in kWh/m²/year, the unit of the annual
//! flux layer. Encoders panic on failure; they only run in tests.

use std::io::Cursor;

use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

/// A rooftop-like flux pattern.
///
/// Values rise from about 800 at the edges to 1800 at the center, which is
/// the typical spread of a south-facing roof in the annual flux layer.
///
/// # Example
///
/// ```
/// use test_utils::create_flux_grid;
///
/// let grid = create_flux_grid(10, 10);
/// assert_eq!(grid.len(), 100);
/// assert!(grid.iter().all(|v| *v >= 800.0 && *v <= 1800.0));
/// ```
pub fn create_flux_grid(width: usize, height: usize) -> Vec<f32> {
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;
    let max_dist = (cx * cx + cy * cy).sqrt().max(1.0);

    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let dx = col as f32 - cx;
            let dy = row as f32 - cy;
            let t = 1.0 - (dx * dx + dy * dy).sqrt() / max_dist;
            data.push(800.0 + 1000.0 * t.clamp(0.0, 1.0));
        }
    }
    data
}

/// Like [`create_flux_grid`], with a `border` of zero (no-data) cells.
pub fn create_masked_flux_grid(width: usize, height: usize, border: usize) -> Vec<f32> {
    let mut data = create_flux_grid(width, height);
    for row in 0..height {
        for col in 0..width {
            let edge = row < border || col < border || row + border >= height || col + border >= width;
            if edge {
                data[row * width + col] = 0.0;
            }
        }
    }
    data
}

/// A grid with every cell set to `value`.
pub fn create_uniform_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Coordinate system written into a test GeoTIFF.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TestCrs {
    /// No GeoKey directory at all.
    None,
    /// EPSG:4326, model units are degrees.
    Geographic,
    /// A WGS84 UTM zone by EPSG code, model units are meters.
    Projected(u16),
}

/// Parameters of an in-memory single-band float GeoTIFF.
#[derive(Debug, Clone)]
pub struct TestGeoTiff {
    pub width: u32,
    pub height: u32,
    pub samples: Vec<f32>,
    /// Model coordinates `(x, y)` of the top-left corner.
    pub origin: (f64, f64),
    /// Model units per pixel `(x, y)`.
    pub pixel_size: (f64, f64),
    pub crs: TestCrs,
}

impl TestGeoTiff {
    /// A geographic raster whose top-left corner is `(north, west)`.
    pub fn geographic(width: u32, height: u32, samples: Vec<f32>, north: f64, west: f64, deg_per_px: f64) -> Self {
        Self {
            width,
            height,
            samples,
            origin: (west, north),
            pixel_size: (deg_per_px, deg_per_px),
            crs: TestCrs::Geographic,
        }
    }

    /// A UTM raster whose top-left corner is `(easting, northing)` in meters.
    pub fn utm(width: u32, height: u32, samples: Vec<f32>, epsg: u16, easting: f64, northing: f64, m_per_px: f64) -> Self {
        Self {
            width,
            height,
            samples,
            origin: (easting, northing),
            pixel_size: (m_per_px, m_per_px),
            crs: TestCrs::Projected(epsg),
        }
    }
}

/// Encode a single-band `f32` GeoTIFF.
pub fn encode_test_geotiff(spec: &TestGeoTiff) -> Vec<u8> {
    assert_eq!(spec.samples.len(), (spec.width * spec.height) as usize);

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut cursor).expect("tiff encoder");
        let mut image = encoder
            .new_image::<colortype::Gray32Float>(spec.width, spec.height)
            .expect("tiff image");

        let scale = [spec.pixel_size.0, spec.pixel_size.1, 0.0];
        let tiepoint = [0.0, 0.0, 0.0, spec.origin.0, spec.origin.1, 0.0];
        image
            .encoder()
            .write_tag(Tag::Unknown(33550), &scale[..])
            .expect("pixel scale tag");
        image
            .encoder()
            .write_tag(Tag::Unknown(33922), &tiepoint[..])
            .expect("tiepoint tag");

        let keys: Option<Vec<u16>> = match spec.crs {
            TestCrs::None => None,
            TestCrs::Geographic => Some(vec![1, 1, 0, 2, 1024, 0, 1, 2, 2048, 0, 1, 4326]),
            TestCrs::Projected(epsg) => Some(vec![1, 1, 0, 2, 1024, 0, 1, 1, 3072, 0, 1, epsg]),
        };
        if let Some(keys) = keys {
            image
                .encoder()
                .write_tag(Tag::Unknown(34735), &keys[..])
                .expect("geokey tag");
        }

        image.write_data(&spec.samples).expect("tiff data");
    }
    cursor.into_inner()
}

/// Encode a plain single-band `f32` TIFF with no georeferencing.
pub fn encode_float_tiff(width: u32, height: u32, samples: &[f32]) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    TiffEncoder::new(&mut cursor)
        .expect("tiff encoder")
        .write_image::<colortype::Gray32Float>(width, height, samples)
        .expect("tiff data");
    cursor.into_inner()
}

/// Encode an 8-bit RGB TIFF; `rgb` holds three samples per pixel.
pub fn encode_rgb8_tiff(width: u32, height: u32, rgb: &[u8]) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    TiffEncoder::new(&mut cursor)
        .expect("tiff encoder")
        .write_image::<colortype::RGB8>(width, height, rgb)
        .expect("tiff data");
    cursor.into_inner()
}

/// Encode a 16-bit grayscale TIFF.
pub fn encode_gray16_tiff(width: u32, height: u32, samples: &[u16]) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    TiffEncoder::new(&mut cursor)
        .expect("tiff encoder")
        .write_image::<colortype::Gray16>(width, height, samples)
        .expect("tiff data");
    cursor.into_inner()
}
