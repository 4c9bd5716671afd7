//! Analyzer configuration.
//!
//! Defaults cover a local setup with the image proxy on port 8080. A YAML
//! file may override any subset of fields; `GOOGLE_API_KEY` and
//! `PROXY_BASE_URL` in the environment override the file.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use flux_raster::{FetchConfig, DEFAULT_MAX_RASTER_BYTES};
use renderer::{Resampling, DEFAULT_SUN_HOURS_CEILING, DEFAULT_SYNTHESIZED_HALF_EXTENT_DEG};
use serde::{Deserialize, Serialize};
use solar_client::{default_request_chain, DataLayerRequest, DEFAULT_GEOCODE_ENDPOINT, DEFAULT_SOLAR_ENDPOINT};
use solar_common::Viewport;
use tracing::{debug, info};

use crate::summary::Assumptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Key for the geocoding and solar APIs; also appended to flux URLs
    #[serde(skip_serializing)]
    pub api_key: String,
    pub geocode_endpoint: String,
    pub solar_endpoint: String,
    /// Base URL of the image proxy
    pub proxy_base_url: String,

    pub max_raster_bytes: u64,
    pub fetch_timeout_secs: u64,
    pub decode_timeout_secs: u64,

    pub viewport: Viewport,
    pub resampling: Resampling,
    pub sun_hours_ceiling: f64,
    pub synthesized_half_extent_deg: f64,

    /// Data layer requests, tried in order
    pub data_layer_chain: Vec<DataLayerRequest>,
    pub assumptions: Assumptions,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            geocode_endpoint: DEFAULT_GEOCODE_ENDPOINT.to_string(),
            solar_endpoint: DEFAULT_SOLAR_ENDPOINT.to_string(),
            proxy_base_url: "http://localhost:8080".to_string(),
            max_raster_bytes: DEFAULT_MAX_RASTER_BYTES,
            fetch_timeout_secs: 20,
            decode_timeout_secs: 10,
            viewport: Viewport::default(),
            resampling: Resampling::Nearest,
            sun_hours_ceiling: DEFAULT_SUN_HOURS_CEILING,
            synthesized_half_extent_deg: DEFAULT_SYNTHESIZED_HALF_EXTENT_DEG,
            data_layer_chain: default_request_chain(),
            assumptions: Assumptions::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Read a YAML file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;
        let config: AnalyzerConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {:?}", path))?;
        info!(path = ?path, "Loaded analyzer config");
        Ok(config)
    }

    /// Apply `GOOGLE_API_KEY` and `PROXY_BASE_URL` when set and non-empty.
    pub fn apply_env(&mut self) {
        if let Some(key) = non_empty_env("GOOGLE_API_KEY") {
            debug!("Using GOOGLE_API_KEY from environment");
            self.api_key = key;
        }
        if let Some(base) = non_empty_env("PROXY_BASE_URL") {
            self.proxy_base_url = base;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.viewport.is_empty() {
            bail!(
                "viewport must be non-empty, got {}x{}",
                self.viewport.width_px,
                self.viewport.height_px
            );
        }
        if self.max_raster_bytes == 0 {
            bail!("max_raster_bytes must be positive");
        }
        if self.fetch_timeout_secs == 0 || self.decode_timeout_secs == 0 {
            bail!("timeouts must be at least one second");
        }
        if self.sun_hours_ceiling.is_nan() || self.sun_hours_ceiling <= 0.0 {
            bail!("sun_hours_ceiling must be positive, got {}", self.sun_hours_ceiling);
        }
        if self.data_layer_chain.is_empty() {
            bail!("data_layer_chain must contain at least one request");
        }
        Ok(())
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            request_timeout: Duration::from_secs(self.fetch_timeout_secs),
            decode_timeout: Duration::from_secs(self.decode_timeout_secs),
            max_bytes: self.max_raster_bytes,
            ..FetchConfig::default()
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
