use axum_core::response::{IntoResponse, Response};
use displaydoc::Display;
use http::StatusCode;
use thiserror::Error;

use super::api::{error_body, INVALID_REQUEST_ERROR_TYPE};

#[derive(Debug, Error, Display)]
pub enum AuthError {
    /// missing x-api-key header
    MissingApiKey,
    /// invalid or revoked api key
    InvalidCredentials,
    /// key registry unavailable
    RegistryUnavailable,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            Self::MissingApiKey | Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                error_body(message, INVALID_REQUEST_ERROR_TYPE, Some("invalid_api_key")),
            )
                .into_response(),
            Self::RegistryUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                error_body(message, INVALID_REQUEST_ERROR_TYPE, None),
            )
                .into_response(),
        }
    }
}
