//! Address geocoding.

use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use reqwest::Client;
use serde::Serialize;
use solar_common::insights::GeocodeResponse;
use solar_common::{LatLng, SolarError, SolarResult};
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_GEOCODE_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// A resolved address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodedAddress {
    pub location: LatLng,
    pub formatted_address: Option<String>,
}

/// Resolves free-form addresses to coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Geocode `address`. Unknown addresses fail with `GeocodeNotFound`.
    async fn geocode(&self, address: &str) -> SolarResult<GeocodedAddress>;
}

/// Google Geocoding API client.
#[derive(Debug, Clone)]
pub struct GoogleGeocoder {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl GoogleGeocoder {
    pub fn new(api_key: impl Into<String>) -> SolarResult<Self> {
        Self::with_endpoint(DEFAULT_GEOCODE_ENDPOINT, api_key)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, api_key: impl Into<String>) -> SolarResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| SolarError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    #[instrument(skip(self))]
    async fn geocode(&self, address: &str) -> SolarResult<GeocodedAddress> {
        let address = address.trim();
        if address.is_empty() {
            return Err(SolarError::GeocodeNotFound("empty address".to_string()));
        }

        counter!("geocode_requests_total").increment(1);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| SolarError::ProviderError(format!("geocoding request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Geocoding request rejected");
            return Err(SolarError::ProviderError(format!("geocoding returned HTTP {}", status.as_u16())));
        }

        let body: GeocodeResponse = response
            .json()
            .await
            .map_err(|e| SolarError::ProviderError(format!("invalid geocoding response: {}", e)))?;
        debug!(status = %body.status, results = body.results.len(), "Geocoding response");

        resolve(address, body)
    }
}

/// Map a geocoding response onto the first result or an error.
fn resolve(address: &str, body: GeocodeResponse) -> SolarResult<GeocodedAddress> {
    match body.status.as_str() {
        "OK" => {
            let first = body
                .results
                .into_iter()
                .next()
                .ok_or_else(|| SolarError::GeocodeNotFound(address.to_string()))?;
            let location = first.geometry.location;
            if !location.is_valid() {
                return Err(SolarError::ProviderError(format!("geocoder returned invalid location {}", location)));
            }
            info!(location = %location, "Geocoded address");
            Ok(GeocodedAddress {
                location,
                formatted_address: first.formatted_address,
            })
        }
        "ZERO_RESULTS" => Err(SolarError::GeocodeNotFound(address.to_string())),
        other => {
            let detail = body.error_message.unwrap_or_default();
            warn!(status = other, detail = %detail, "Geocoding failed");
            Err(SolarError::ProviderError(format!("{}: {}", other, detail)))
        }
    }
}
