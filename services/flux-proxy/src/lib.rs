//! Image proxy for solar flux GeoTIFFs.
//!
//! Browsers and the analyzer cannot read provider GeoTIFFs directly, so
//! requests go through `GET /api/geotiff-proxy?url=...`. The proxy only
//! forwards to allow-listed provider hosts, caps the payload size and the
//! upstream wait, and answers every failure with a JSON body and a
//! distinct status code.

pub mod config;
pub mod error;
pub mod handlers;

pub use config::ProxyConfig;
pub use error::ProxyError;
pub use handlers::{router, ProxyState};
