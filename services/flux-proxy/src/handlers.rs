//! HTTP handlers and router.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use reqwest::{Client, Url};
use serde::Deserialize;
use solar_common::{url_prefix, SolarError, SolarResult};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument, warn};

use crate::config::ProxyConfig;
use crate::error::ProxyError;

const CACHE_CONTROL: &str = "public, max-age=3600, s-maxage=7200";
const CONTENT_DISPOSITION: &str = "inline; filename=\"solar-flux.tiff\"";
const DEFAULT_CONTENT_TYPE: &str = "image/tiff";
const UPSTREAM_DETAILS_CHARS: usize = 200;
/// Enough bytes for `UPSTREAM_DETAILS_CHARS` characters of any UTF-8 text.
const UPSTREAM_DETAILS_BYTES: usize = UPSTREAM_DETAILS_CHARS * 4;

pub struct ProxyState {
    pub client: Client,
    pub config: ProxyConfig,
    pub prometheus: Option<PrometheusHandle>,
}

impl ProxyState {
    pub fn new(config: ProxyConfig, prometheus: Option<PrometheusHandle>) -> SolarResult<Self> {
        let client = Client::builder()
            .timeout(config.upstream_timeout())
            .user_agent(concat!("flux-proxy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SolarError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            prometheus,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    pub url: Option<String>,
}

/// Proxy routes. `OPTIONS` requests are answered by the CORS layer.
pub fn router(state: Arc<ProxyState>) -> Router {
    Router::new()
        .route("/api/geotiff-proxy", any(geotiff_proxy_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn metrics_handler(State(state): State<Arc<ProxyState>>) -> Response {
    match &state.prometheus {
        Some(handle) => (StatusCode::OK, handle.render()).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

pub async fn geotiff_proxy_handler(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    Query(query): Query<ProxyQuery>,
) -> Response {
    counter!("proxy_requests_total").increment(1);
    let result = if method == Method::GET {
        proxy(&state, query.url.as_deref()).await
    } else {
        Err(ProxyError::MethodNotAllowed)
    };

    match result {
        Ok(response) => response,
        Err(e) => {
            let status = e.status();
            counter!("proxy_errors_total", "status" => status.as_u16().to_string()).increment(1);
            warn!(status = status.as_u16(), error = %e, "Proxy request failed");
            e.into_response()
        }
    }
}

#[instrument(skip(state, target), fields(url = tracing::field::Empty))]
async fn proxy(state: &ProxyState, target: Option<&str>) -> Result<Response, ProxyError> {
    let target = target.map(str::trim).filter(|u| !u.is_empty()).ok_or(ProxyError::MissingUrl)?;
    tracing::Span::current().record("url", url_prefix(target).as_str());

    let allowed = Url::parse(target)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .and_then(|u| u.host_str().map(|h| state.config.is_allowed_host(h)))
        .unwrap_or(false);
    if !allowed {
        return Err(ProxyError::DomainNotAllowed {
            attempted: url_prefix(target),
        });
    }

    let timeout_secs = state.config.upstream_timeout_secs;
    let upstream = state
        .client
        .get(target)
        .header(reqwest::header::ACCEPT, "image/tiff,image/*,*/*")
        .send()
        .await
        .map_err(|e| ProxyError::from_reqwest(e, timeout_secs, false))?;

    let status = upstream.status();
    if !status.is_success() {
        let reason = status.canonical_reason().unwrap_or("Upstream error").to_string();
        let details = upstream_details(upstream).await;
        return Err(ProxyError::Upstream {
            status: StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
            reason,
            details,
        });
    }

    let content_type = upstream
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    let limit = state.config.max_bytes;
    let declared = upstream.content_length();
    if let Some(size) = declared.filter(|len| *len > limit) {
        return Err(ProxyError::TooLarge { size, limit });
    }

    let mut body = BytesMut::with_capacity(declared.unwrap_or(64 * 1024).min(limit) as usize);
    let mut stream = upstream.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ProxyError::from_reqwest(e, timeout_secs, true))?;
        let size = (body.len() + chunk.len()) as u64;
        if size > limit {
            debug!(size, limit, "Aborting oversized upstream body");
            return Err(ProxyError::TooLarge { size, limit });
        }
        body.extend_from_slice(&chunk);
    }

    let size = body.len() as u64;
    if size < state.config.min_bytes {
        return Err(ProxyError::TooSmall { size });
    }

    let body = body.freeze();
    info!(bytes = size, content_type = %content_type, "GeoTIFF proxied");
    Ok(tiff_response(body, &content_type))
}

/// Leading characters of an upstream error body. Reading stops once enough
/// bytes have arrived, so an unbounded body is never drained.
async fn upstream_details(upstream: reqwest::Response) -> String {
    let mut buf = Vec::with_capacity(UPSTREAM_DETAILS_BYTES);
    let mut stream = upstream.bytes_stream();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => {
                let take = chunk.len().min(UPSTREAM_DETAILS_BYTES - buf.len());
                buf.extend_from_slice(&chunk[..take]);
                if buf.len() >= UPSTREAM_DETAILS_BYTES {
                    break;
                }
            }
            Err(_) if buf.is_empty() => return "Could not read error response".to_string(),
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&buf).chars().take(UPSTREAM_DETAILS_CHARS).collect()
}

fn tiff_response(body: Bytes, content_type: &str) -> Response {
    let mut headers = HeaderMap::new();
    let content_type =
        HeaderValue::from_str(content_type).unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));
    headers.insert(header::CONTENT_DISPOSITION, HeaderValue::from_static(CONTENT_DISPOSITION));
    if let Ok(etag) = HeaderValue::from_str(&etag(&body)) {
        headers.insert(header::ETAG, etag);
    }
    (StatusCode::OK, headers, body).into_response()
}

/// Quoted 16 hex digit tag: CRC-32 of the body followed by its length.
pub fn etag(body: &[u8]) -> String {
    let crc = crc32fast::hash(body);
    format!("\"{:08x}{:08x}\"", crc, body.len() as u32)
}
