//! Clients for the upstream lookup collaborators.
//!
//! - [`geocoder`]: address to coordinates
//! - [`solar`]: building insights and data layers, including the
//!   prioritized data-layer request chain
//! - [`urls`]: API key and image proxy URL construction

pub mod geocoder;
pub mod solar;
pub mod urls;

pub use geocoder::{GeocodedAddress, Geocoder, GoogleGeocoder, DEFAULT_GEOCODE_ENDPOINT};
pub use solar::{
    default_request_chain, first_flux_layers, DataLayerRequest, DataLayerView, GoogleSolarClient,
    SolarProvider, DEFAULT_SOLAR_ENDPOINT,
};
pub use urls::{proxied_url, with_api_key, PROXY_PATH};
