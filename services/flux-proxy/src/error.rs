//! Proxy failures and their JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("URL parameter is required")]
    MissingUrl,

    #[error("Only Google Solar API URLs are allowed")]
    DomainNotAllowed { attempted: String },

    #[error("Failed to fetch GeoTIFF: {reason}")]
    Upstream {
        status: StatusCode,
        reason: String,
        details: String,
    },

    #[error("File too large")]
    TooLarge { size: u64, limit: u64 },

    #[error("Response too small to be valid GeoTIFF")]
    TooSmall { size: u64 },

    #[error("Request timeout - GeoTIFF fetch took too long")]
    Timeout { secs: u64 },

    #[error("Unable to connect to Google Solar API")]
    Unavailable(String),

    #[error("Upstream connection failed while reading the GeoTIFF")]
    BadGateway(String),

    #[error("Failed to proxy GeoTIFF request")]
    Internal { details: String, kind: &'static str },
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::MissingUrl | ProxyError::DomainNotAllowed { .. } => StatusCode::BAD_REQUEST,
            ProxyError::Upstream { status, .. } => *status,
            ProxyError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::TooSmall { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ProxyError::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
            ProxyError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Classify a reqwest failure. `streaming` is set once headers arrived.
    pub fn from_reqwest(err: reqwest::Error, timeout_secs: u64, streaming: bool) -> Self {
        if err.is_timeout() {
            ProxyError::Timeout { secs: timeout_secs }
        } else if err.is_connect() {
            ProxyError::Unavailable(err.to_string())
        } else if streaming {
            ProxyError::BadGateway(err.to_string())
        } else {
            ProxyError::Internal {
                details: err.to_string(),
                kind: if err.is_request() { "RequestError" } else { "Unknown" },
            }
        }
    }

    fn body(&self) -> serde_json::Value {
        let error = self.to_string();
        match self {
            ProxyError::DomainNotAllowed { attempted } => json!({ "error": error, "attempted": attempted }),
            ProxyError::Upstream { status, details, .. } => {
                json!({ "error": error, "details": details, "status": status.as_u16() })
            }
            ProxyError::TooLarge { size, limit } => json!({ "error": error, "size": size, "limit": limit }),
            ProxyError::TooSmall { size } => json!({ "error": error, "size": size }),
            ProxyError::Timeout { secs } => json!({ "error": error, "timeout": format!("{} seconds", secs) }),
            ProxyError::Unavailable(details) | ProxyError::BadGateway(details) => {
                json!({ "error": error, "details": details })
            }
            ProxyError::Internal { details, kind } => json!({ "error": error, "details": details, "type": kind }),
            ProxyError::MethodNotAllowed | ProxyError::MissingUrl => json!({ "error": error }),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
