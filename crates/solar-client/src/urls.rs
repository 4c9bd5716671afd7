//! Flux URL construction.

use reqwest::Url;
use solar_common::{SolarError, SolarResult};

/// Path of the image proxy endpoint.
pub const PROXY_PATH: &str = "/api/geotiff-proxy";

/// Append `key=<api_key>` unless the URL already carries a key.
pub fn with_api_key(url: &str, api_key: &str) -> SolarResult<String> {
    let mut parsed =
        Url::parse(url).map_err(|e| SolarError::ProviderError(format!("invalid flux URL: {}", e)))?;
    if api_key.is_empty() || parsed.query_pairs().any(|(k, _)| k == "key") {
        return Ok(parsed.into());
    }
    parsed.query_pairs_mut().append_pair("key", api_key);
    Ok(parsed.into())
}

/// `<proxy_base>/api/geotiff-proxy?url=<percent-encoded flux_url>`
pub fn proxied_url(proxy_base: &str, flux_url: &str) -> SolarResult<String> {
    let endpoint = format!("{}{}", proxy_base.trim_end_matches('/'), PROXY_PATH);
    let url = Url::parse_with_params(&endpoint, &[("url", flux_url)])
        .map_err(|e| SolarError::Config(format!("invalid proxy base URL '{}': {}", proxy_base, e)))?;
    Ok(url.into())
}
