//! Error types for the solar flux pipeline.

use thiserror::Error;

/// Result type alias using SolarError.
pub type SolarResult<T> = Result<T, SolarError>;

/// Primary error type for lookup, raster and rendering operations.
#[derive(Debug, Error)]
pub enum SolarError {
    // === Upstream Lookup Errors ===
    #[error("Address not found: {0}")]
    GeocodeNotFound(String),

    #[error("Provider request failed: {0}")]
    ProviderError(String),

    #[error("No solar data available for this location")]
    NoSolarData,

    // === Raster Path Errors ===
    #[error("Raster fetch timed out after {secs}s")]
    FetchTimeout { secs: u64 },

    #[error("Raster fetch failed with HTTP {status}: {message}")]
    FetchHttpError { status: u16, message: String },

    #[error("Raster payload too large: {received} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { received: u64, limit: u64 },

    #[error("Failed to decode raster: {0}")]
    DecodeFailure(String),

    #[error("Raster contains no positive samples")]
    EmptyRaster,

    #[error("Image proxy unavailable: {0}")]
    ProxyUnavailable(String),

    // === Rendering Errors ===
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),

    #[error("Invalid gradient: {0}")]
    InvalidGradient(String),

    #[error("Map view rejected overlay: {0}")]
    MapView(String),

    // === Infrastructure Errors ===
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SolarError {
    /// Errors on the raster path, recovered locally by the simulation fallback.
    pub fn is_raster_path(&self) -> bool {
        matches!(
            self,
            SolarError::FetchTimeout { .. }
                | SolarError::FetchHttpError { .. }
                | SolarError::PayloadTooLarge { .. }
                | SolarError::DecodeFailure(_)
                | SolarError::EmptyRaster
                | SolarError::ProxyUnavailable(_)
                | SolarError::MapView(_)
        )
    }

    /// Short stable label, used for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            SolarError::GeocodeNotFound(_) => "geocode_not_found",
            SolarError::ProviderError(_) => "provider_error",
            SolarError::NoSolarData => "no_solar_data",
            SolarError::FetchTimeout { .. } => "fetch_timeout",
            SolarError::FetchHttpError { .. } => "fetch_http_error",
            SolarError::PayloadTooLarge { .. } => "payload_too_large",
            SolarError::DecodeFailure(_) => "decode_failure",
            SolarError::EmptyRaster => "empty_raster",
            SolarError::ProxyUnavailable(_) => "proxy_unavailable",
            SolarError::InvalidBounds(_) => "invalid_bounds",
            SolarError::InvalidGradient(_) => "invalid_gradient",
            SolarError::MapView(_) => "map_view",
            SolarError::Config(_) => "config",
        }
    }

    /// Message suitable for showing to the person who ran the search.
    pub fn user_message(&self) -> String {
        match self {
            SolarError::GeocodeNotFound(_) => {
                "Address not found. Please try a more specific address.".to_string()
            }
            SolarError::NoSolarData => {
                "Solar potential data is not available for this location.".to_string()
            }
            SolarError::ProviderError(msg) if msg.contains("OVER_QUERY_LIMIT") => {
                "API quota exceeded. Please try again later.".to_string()
            }
            e if e.is_raster_path() => {
                "Detailed irradiance mapping is not available for this location.".to_string()
            }
            _ => "An unexpected error occurred. Please try again.".to_string(),
        }
    }
}

impl From<serde_json::Error> for SolarError {
    fn from(err: serde_json::Error) -> Self {
        SolarError::ProviderError(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_path_classification() {
        assert!(SolarError::EmptyRaster.is_raster_path());
        assert!(SolarError::FetchTimeout { secs: 20 }.is_raster_path());
        assert!(!SolarError::GeocodeNotFound("x".into()).is_raster_path());
        assert!(!SolarError::NoSolarData.is_raster_path());
    }
}
