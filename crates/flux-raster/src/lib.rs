//! Solar flux raster acquisition.
//!
//! A flux raster arrives as a GeoTIFF through the image proxy. This crate
//! fetches it under a byte ceiling and a timeout ([`fetch`]), decodes the
//! first band into `f32` samples ([`decode`]) and reads the embedded
//! georeferencing when the file carries one ([`georef`]).

pub mod decode;
pub mod fetch;
pub mod georef;
pub mod raster;

pub use decode::decode_raster;
pub use fetch::{fetch_raster, FetchConfig, FluxFetcher, DEFAULT_MAX_RASTER_BYTES};
pub use georef::{GeoReference, RasterCrs};
pub use raster::{is_no_data, DecodedRaster, GeoRasterBuffer};
