//! HTTP error envelope and status mapping.
//!
//! Every error body has the same shape:
//! `{ "error": <kind>, "detail": <string>, "timestamp": <iso-8601> }`.
//! Status codes are assigned here, at the edge — the core never sees HTTP.
//! Rate-limit rejections additionally carry the `X-RateLimit-*` headers.

use axum::http::{header::HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;

use crate::error::ServiceError;

/// Uniform error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub detail: String,
    pub timestamp: String,
}

impl ErrorBody {
    fn new(kind: &'static str, detail: impl Into<String>) -> Self {
        Self { error: kind, detail: detail.into(), timestamp: Utc::now().to_rfc3339() }
    }
}

/// Status code for each error kind.
fn status_for(error: &ServiceError) -> StatusCode {
    match error {
        ServiceError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
        ServiceError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        ServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Conflict(_) => StatusCode::CONFLICT,
        ServiceError::Busy(_) | ServiceError::ModelUnavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ServiceError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        // Internal details never leak to callers.
        let detail = match &self {
            ServiceError::Internal(_) => "internal service error".to_string(),
            other => other.to_string(),
        };
        let body = ErrorBody::new(self.kind(), detail);
        let mut response = (status, axum::Json(body)).into_response();

        if let ServiceError::RateLimited { limit, reset_epoch_secs } = self {
            let headers = response.headers_mut();
            insert_header(headers, "x-ratelimit-limit", &limit.to_string());
            insert_header(headers, "x-ratelimit-remaining", "0");
            insert_header(headers, "x-ratelimit-reset", &reset_epoch_secs.to_string());
        }
        response
    }
}

fn insert_header(headers: &mut axum::http::HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}
