use axum_core::response::IntoResponse;
use displaydoc::Display;
use http::StatusCode;
use thiserror::Error;

use super::api::{error_body, SERVER_ERROR_TYPE};

/// Errors that originate from our own infrastructure (state store, upstream
/// dispatch) rather than from the caller's request.
#[derive(Debug, Error, Display)]
pub enum InternalError {
    /// state store error: {0}
    StateStore(#[from] redis::RedisError),
    /// connection pool error: {0}
    Pool(#[from] r2d2::Error),
    /// upstream dispatch error: {0}
    Upstream(#[from] reqwest::Error),
    /// serialization error: {0}
    Serde(#[from] serde_json::Error),
    /// background task join error: {0}
    Join(#[from] tokio::task::JoinError),
    /// state store unavailable, operating in fallback mode
    StateStoreFallback,
}

impl IntoResponse for InternalError {
    fn into_response(self) -> axum_core::response::Response {
        tracing::error!(error = %self, "internal error");
        match self {
            Self::StateStoreFallback => (
                StatusCode::SERVICE_UNAVAILABLE,
                error_body("service degraded", SERVER_ERROR_TYPE, None),
            )
                .into_response(),
            _ => (
                StatusCode::BAD_GATEWAY,
                error_body("upstream request failed", SERVER_ERROR_TYPE, None),
            )
                .into_response(),
        }
    }
}
