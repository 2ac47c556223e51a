//! API error responses.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Boundary errors surfaced to clients as structured JSON.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Admission denied; carries the wait in whole seconds.
    #[error("rate limit exceeded")]
    RateLimited { retry_after: u64 },

    #[error("{0}")]
    InvalidParameter(String),

    #[error("external service temporarily unavailable")]
    DownstreamUnavailable,

    #[error("internal server error")]
    Internal,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    timestamp: DateTime<Utc>,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            ApiError::DownstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            ApiError::InvalidParameter(_) => "INVALID_PARAMETER",
            ApiError::DownstreamUnavailable => "DOWNSTREAM_UNAVAILABLE",
            ApiError::Internal => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
            timestamp: Utc::now(),
        };
        let mut response = (self.status(), Json(body)).into_response();

        if let ApiError::RateLimited { retry_after } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }
        response
    }
}
