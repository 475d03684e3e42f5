use axum_core::response::IntoResponse;
use displaydoc::Display;
use http::{HeaderValue, StatusCode};
use thiserror::Error;
use tracing::debug;

use super::api::{error_body, INVALID_REQUEST_ERROR_TYPE};

/// Errors caused by the caller's request, never the upstream.
#[derive(Debug, Error, Display)]
pub enum InvalidRequestError {
    /// unsupported method or route
    NotFound,
    /// request body must be json
    UnsupportedMediaType,
    /// request body exceeds configured limit
    PayloadTooLarge,
    /// too many requests, retry after {retry_after}s
    TooManyRequests { retry_after: u64 },
    /// malformed request path
    InvalidPath,
}

impl IntoResponse for InvalidRequestError {
    fn into_response(self) -> axum_core::response::Response {
        debug!(error = %self, "rejecting request");
        match self {
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                error_body(self.to_string(), INVALID_REQUEST_ERROR_TYPE, None),
            )
                .into_response(),
            Self::UnsupportedMediaType => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                error_body(self.to_string(), INVALID_REQUEST_ERROR_TYPE, None),
            )
                .into_response(),
            Self::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                error_body(self.to_string(), INVALID_REQUEST_ERROR_TYPE, None),
            )
                .into_response(),
            Self::TooManyRequests { retry_after } => {
                let message = self.to_string();
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    error_body(message, INVALID_REQUEST_ERROR_TYPE, None),
                )
                    .into_response();
                if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                    response.headers_mut().insert("retry-after", value);
                }
                response
            }
            Self::InvalidPath => (
                StatusCode::BAD_REQUEST,
                error_body(self.to_string(), INVALID_REQUEST_ERROR_TYPE, None),
            )
                .into_response(),
        }
    }
}
