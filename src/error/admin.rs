use axum_core::response::IntoResponse;
use displaydoc::Display;
use http::StatusCode;
use thiserror::Error;

use super::{api::error_body, internal::InternalError, INVALID_REQUEST_ERROR_TYPE, SERVER_ERROR_TYPE};

/// Errors from the `/internal/*` admin surface: key lifecycle and cache
/// invalidation. Kept separate from [`super::api::ApiError`] because the
/// admin surface has its own auth scheme and its own fail-closed rule for
/// a degraded state store.
#[derive(Debug, Error, Display)]
pub enum AdminError {
    /// missing or invalid admin bearer token
    Unauthorized,
    /// too many requests, retry after {retry_after}s
    TooManyRequests { retry_after: u64 },
    /// {0}
    BadRequest(String),
    /// record not found
    NotFound,
    /// admin backend unavailable
    ServiceUnavailable,
    /// internal error: {0}
    Internal(#[from] InternalError),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> axum_core::response::Response {
        match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                error_body(self.to_string(), INVALID_REQUEST_ERROR_TYPE, None),
            )
                .into_response(),
            Self::TooManyRequests { retry_after } => {
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    error_body(self.to_string(), INVALID_REQUEST_ERROR_TYPE, None),
                )
                    .into_response();
                if let Ok(value) = http::HeaderValue::from_str(&retry_after.to_string()) {
                    response.headers_mut().insert("retry-after", value);
                }
                response
            }
            Self::BadRequest(_) => (
                StatusCode::BAD_REQUEST,
                error_body(self.to_string(), INVALID_REQUEST_ERROR_TYPE, None),
            )
                .into_response(),
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                error_body(self.to_string(), INVALID_REQUEST_ERROR_TYPE, None),
            )
                .into_response(),
            Self::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                error_body(self.to_string(), SERVER_ERROR_TYPE, None),
            )
                .into_response(),
            Self::Internal(error) => internal_error_response(error),
        }
    }
}

/// Maps an [`InternalError`] to the admin surface's own status codes,
/// distinct from [`InternalError::into_response`]'s proxy-path mapping
/// (which assumes a failed upstream call). A dead connection pool or a
/// live Redis error reaching here means the backend this admin action
/// needed is unreachable, not that an upstream fetch failed, so it maps to
/// 503 rather than 502.
fn internal_error_response(error: InternalError) -> axum_core::response::Response {
    tracing::error!(error = %error, "admin backend error");
    match error {
        InternalError::StateStore(_) | InternalError::Pool(_) | InternalError::StateStoreFallback => (
            StatusCode::SERVICE_UNAVAILABLE,
            error_body("admin backend unavailable", SERVER_ERROR_TYPE, None),
        )
            .into_response(),
        InternalError::Upstream(_) | InternalError::Serde(_) | InternalError::Join(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_body("internal error", SERVER_ERROR_TYPE, None),
        )
            .into_response(),
    }
}
