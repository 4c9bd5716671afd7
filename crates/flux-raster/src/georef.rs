//! GeoTIFF georeferencing tags.
//!
//! Only the subset needed to place a north-up raster is supported: a single
//! tiepoint plus a pixel scale. Rotated rasters (ModelTransformation) are
//! treated as unreferenced.

use projection::UtmZone;
use solar_common::{GeoBounds, LatLng};
use tracing::debug;

/// ModelPixelScaleTag
pub const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
/// ModelTiepointTag
pub const TAG_MODEL_TIEPOINT: u16 = 33922;
/// GeoKeyDirectoryTag
pub const TAG_GEO_KEY_DIRECTORY: u16 = 34735;

const KEY_MODEL_TYPE: u16 = 1024;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;

/// Coordinate reference system declared by the GeoKey directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterCrs {
    /// Lat/lng degrees (EPSG code when given, e.g. 4326).
    Geographic(Option<u16>),
    Utm(UtmZone),
    /// Projected, but not a zone we can invert.
    UnsupportedProjected(u16),
    Unknown,
}

impl RasterCrs {
    /// Interpret a raw GeoKeyDirectory.
    ///
    /// Layout: a 4-value header `[version, revision, minor, count]` followed
    /// by `count` entries of `[key, location, count, value]`. Only keys
    /// stored inline (`location == 0`) are read.
    pub fn from_geo_keys(directory: &[u16]) -> Self {
        if directory.len() < 4 {
            return RasterCrs::Unknown;
        }
        let count = directory[3] as usize;

        let mut model_type = None;
        let mut geographic = None;
        let mut projected = None;
        for entry in directory[4..].chunks_exact(4).take(count) {
            let (key, location, value) = (entry[0], entry[1], entry[3]);
            if location != 0 {
                continue;
            }
            match key {
                KEY_MODEL_TYPE => model_type = Some(value),
                KEY_GEOGRAPHIC_TYPE => geographic = Some(value),
                KEY_PROJECTED_CS_TYPE => projected = Some(value),
                _ => {}
            }
        }

        match (model_type, projected) {
            (Some(MODEL_TYPE_GEOGRAPHIC), _) => RasterCrs::Geographic(geographic),
            (Some(MODEL_TYPE_PROJECTED), Some(code)) | (None, Some(code)) => {
                match UtmZone::from_epsg(code) {
                    Ok(zone) => RasterCrs::Utm(zone),
                    Err(_) => RasterCrs::UnsupportedProjected(code),
                }
            }
            (None, None) if geographic.is_some() => RasterCrs::Geographic(geographic),
            _ => RasterCrs::Unknown,
        }
    }
}

/// Tiepoint, pixel scale and CRS of a raster.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoReference {
    /// `[i, j, k, x, y, z]`: raster point `(i, j)` sits at model `(x, y)`.
    pub tiepoint: [f64; 6],
    /// `[sx, sy, sz]` model units per pixel.
    pub pixel_scale: [f64; 3],
    pub crs: RasterCrs,
}

impl GeoReference {
    /// Assemble from raw tag values; `None` when either tag is short.
    pub fn from_tags(tiepoint: &[f64], pixel_scale: &[f64], geo_keys: Option<&[u16]>) -> Option<Self> {
        if tiepoint.len() < 6 || pixel_scale.len() < 2 {
            return None;
        }
        let mut tp = [0.0; 6];
        tp.copy_from_slice(&tiepoint[..6]);
        let sz = pixel_scale.get(2).copied().unwrap_or(0.0);

        Some(Self {
            tiepoint: tp,
            pixel_scale: [pixel_scale[0], pixel_scale[1], sz],
            crs: geo_keys.map(RasterCrs::from_geo_keys).unwrap_or(RasterCrs::Unknown),
        })
    }

    /// Model-space edges `(west, south, east, north)` of a `width x height` raster.
    pub fn model_extent(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let [i, j, _, x, y, _] = self.tiepoint;
        let [sx, sy, _] = self.pixel_scale;
        let west = x - i * sx;
        let north = y + j * sy;
        let east = west + width as f64 * sx;
        let south = north - height as f64 * sy;
        (west, south, east, north)
    }

    /// Geographic bounds of the raster, when the CRS can be placed.
    pub fn bounds(&self, width: usize, height: usize) -> Option<GeoBounds> {
        let (west, south, east, north) = self.model_extent(width, height);

        let bounds = match self.crs {
            RasterCrs::Geographic(_) => GeoBounds::from_edges(south, west, north, east),
            RasterCrs::Utm(zone) => {
                let corners = [
                    zone.to_geographic(west, south),
                    zone.to_geographic(west, north),
                    zone.to_geographic(east, south),
                    zone.to_geographic(east, north),
                ];
                GeoBounds::envelope(corners)?
            }
            RasterCrs::UnsupportedProjected(code) => {
                debug!(epsg = code, "Projected CRS is not a UTM zone, ignoring embedded bounds");
                return None;
            }
            RasterCrs::Unknown => {
                debug!("No usable GeoKey directory, ignoring embedded bounds");
                return None;
            }
        }
        .normalized();

        let sane = bounds.is_valid()
            && LatLng::new(bounds.south(), bounds.west()).is_valid()
            && LatLng::new(bounds.north(), bounds.east()).is_valid();
        sane.then_some(bounds)
    }
}
