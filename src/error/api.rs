use axum::Json;
use axum_core::response::IntoResponse;
use displaydoc::Display;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{auth::AuthError, internal::InternalError, invalid_req::InvalidRequestError};

pub const INVALID_REQUEST_ERROR_TYPE: &str = "invalid_request_error";
pub const SERVER_ERROR_TYPE: &str = "server_error";

/// Top-level error returned by any request-handling path.
#[derive(Debug, Error, Display)]
pub enum ApiError {
    /// invalid request: {0}
    InvalidRequest(#[from] InvalidRequestError),
    /// authentication error: {0}
    Authentication(#[from] AuthError),
    /// internal error: {0}
    Internal(#[from] InternalError),
    /// handler panicked: {0}
    Panic(String),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorDetails {
    pub message: String,
    pub r#type: Option<String>,
    pub code: Option<String>,
}

pub(super) fn error_body(
    message: impl Into<String>,
    r#type: &str,
    code: Option<&str>,
) -> Json<ErrorResponse> {
    Json(ErrorResponse {
        error: ErrorDetails {
            message: message.into(),
            r#type: Some(r#type.to_string()),
            code: code.map(str::to_string),
        },
    })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum_core::response::Response {
        match self {
            Self::InvalidRequest(error) => error.into_response(),
            Self::Authentication(error) => error.into_response(),
            Self::Internal(error) => error.into_response(),
            Self::Panic(details) => {
                tracing::error!(error = %details, "handler panicked");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_body("internal server error", SERVER_ERROR_TYPE, None),
                )
                    .into_response()
            }
        }
    }
}
