//! Bounded HTTP fetch of flux rasters.
//!
//! The body is streamed and counted chunk by chunk, so an oversized
//! response is abandoned as soon as it crosses the ceiling instead of being
//! buffered first.

use std::time::Duration;

use bytes::BytesMut;
use futures::StreamExt;
use metrics::counter;
use reqwest::{header, Client, Response};
use serde::Deserialize;
use solar_common::{url_prefix, SolarError, SolarResult};
use tracing::{debug, info, instrument, warn};

use crate::decode::decode_raster;
use crate::raster::{DecodedRaster, GeoRasterBuffer};

/// 50 MB, the same ceiling the image proxy enforces.
pub const DEFAULT_MAX_RASTER_BYTES: u64 = 50 * 1024 * 1024;

/// Bytes of an error response read for its message; the rest is dropped.
const ERROR_BODY_LIMIT: usize = 4 * 1024;

/// Configuration for raster fetches.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Whole-request timeout, headers and body included
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Bound on the blocking decode step
    pub decode_timeout: Duration,
    /// Largest body accepted, checked against Content-Length and while streaming
    pub max_bytes: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(20),
            connect_timeout: Duration::from_secs(10),
            decode_timeout: Duration::from_secs(10),
            max_bytes: DEFAULT_MAX_RASTER_BYTES,
        }
    }
}

/// JSON error body returned by the image proxy.
#[derive(Debug, Deserialize)]
struct ProxyErrorBody {
    error: String,
    #[serde(default)]
    details: Option<String>,
}

/// Fetches and decodes flux rasters.
#[derive(Debug, Clone)]
pub struct FluxFetcher {
    client: Client,
    config: FetchConfig,
}

impl FluxFetcher {
    pub fn new(config: FetchConfig) -> SolarResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| SolarError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch the raw GeoTIFF bytes.
    #[instrument(skip(self), fields(url = %url_prefix(url)))]
    pub async fn fetch(&self, url: &str) -> SolarResult<GeoRasterBuffer> {
        counter!("flux_fetch_total").increment(1);

        let result = self.fetch_inner(url).await;
        if let Err(e) = &result {
            counter!("flux_fetch_errors_total", "kind" => e.kind()).increment(1);
            warn!(error = %e, kind = e.kind(), "Raster fetch failed");
        }
        result
    }

    async fn fetch_inner(&self, url: &str) -> SolarResult<GeoRasterBuffer> {
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "image/tiff,image/*,*/*")
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            warn!(status = status.as_u16(), message = %message, "Raster request rejected");
            return Err(SolarError::FetchHttpError {
                status: status.as_u16(),
                message,
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/tiff")
            .to_string();

        let declared = response.content_length();
        if let Some(len) = declared {
            if len > self.config.max_bytes {
                return Err(SolarError::PayloadTooLarge {
                    received: len,
                    limit: self.config.max_bytes,
                });
            }
        }

        let bytes = self.read_body(response, declared).await?;
        info!(bytes = bytes.len(), content_type = %content_type, "Fetched raster");

        GeoRasterBuffer::new(bytes.freeze(), content_type, self.config.max_bytes)
    }

    /// Stream the body, aborting as soon as the running total passes the ceiling.
    async fn read_body(&self, response: Response, declared: Option<u64>) -> SolarResult<BytesMut> {
        let limit = self.config.max_bytes;
        let mut buf = BytesMut::with_capacity(declared.unwrap_or(64 * 1024).min(limit) as usize);
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.map_request_error(e))?;
            let received = (buf.len() + chunk.len()) as u64;
            if received > limit {
                debug!(received, limit, "Aborting oversized raster stream");
                return Err(SolarError::PayloadTooLarge { received, limit });
            }
            buf.extend_from_slice(&chunk);
        }

        Ok(buf)
    }

    /// Fetch, then decode on the blocking pool under the decode timeout.
    #[instrument(skip(self), fields(url = %url_prefix(url)))]
    pub async fn fetch_and_decode(&self, url: &str) -> SolarResult<DecodedRaster> {
        let buffer = self.fetch(url).await?;
        self.decode(buffer).await
    }

    /// Decode on the blocking pool, bounded by the decode timeout.
    pub async fn decode(&self, buffer: GeoRasterBuffer) -> SolarResult<DecodedRaster> {
        let limit = self.config.decode_timeout;

        let task = tokio::task::spawn_blocking(move || decode_raster(buffer));
        let raster = match tokio::time::timeout(limit, task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join_err)) => {
                return Err(SolarError::DecodeFailure(format!("decode task failed: {}", join_err)));
            }
            Err(_) => {
                return Err(SolarError::DecodeFailure(format!(
                    "decode exceeded {}s",
                    limit.as_secs()
                )));
            }
        };

        info!(
            width = raster.width(),
            height = raster.height(),
            min = raster.min(),
            max = raster.max(),
            "Decoded flux raster"
        );
        Ok(raster)
    }

    fn map_request_error(&self, err: reqwest::Error) -> SolarError {
        if err.is_timeout() {
            SolarError::FetchTimeout {
                secs: self.config.request_timeout.as_secs(),
            }
        } else if err.is_connect() {
            SolarError::ProxyUnavailable(format!("connection failed: {}", err))
        } else {
            SolarError::ProxyUnavailable(err.to_string())
        }
    }
}

/// Fetch and decode with default settings and the given byte ceiling.
pub async fn fetch_raster(url: &str, max_bytes: u64) -> SolarResult<DecodedRaster> {
    let fetcher = FluxFetcher::new(FetchConfig {
        max_bytes,
        ..FetchConfig::default()
    })?;
    fetcher.fetch_and_decode(url).await
}

/// Read at most `limit` bytes of the body, stopping at the first error.
async fn body_prefix(response: Response, limit: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(Ok(chunk)) = stream.next().await {
        let take = chunk.len().min(limit - buf.len());
        buf.extend_from_slice(&chunk[..take]);
        if buf.len() >= limit {
            break;
        }
    }
    buf
}

/// Best-effort description of an error response, from a bounded prefix of its body.
async fn error_message(response: Response) -> String {
    let status = response.status();
    let bytes = body_prefix(response, ERROR_BODY_LIMIT).await;
    let body = String::from_utf8_lossy(&bytes);

    match serde_json::from_slice::<ProxyErrorBody>(&bytes) {
        Ok(parsed) => match parsed.details {
            Some(details) => format!("{}: {}", parsed.error, details),
            None => parsed.error,
        },
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        Err(_) => body.chars().take(200).collect(),
    }
}
