use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use crate::{app_state::AppState, error::admin::AdminError, hash, rate_limit::Scope};

/// The admin identity attached to a request once its bearer token has
/// been verified, carried forward so handlers can include it in their
/// audit log entries without re-hashing the token.
#[derive(Debug, Clone)]
pub struct AdminIdentity(pub String);

/// Gate for every `/internal/*` route: a per-IP `admin`-scope rate limit
/// (keyed on presence/absence of the bearer, never the token itself),
/// then a constant-time comparison against the configured admin token.
/// Runs ahead of every admin handler; handlers never see an unauthorized
/// request.
#[tracing::instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn require_admin(
    State(app_state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request,
    next: Next,
) -> Response {
    let bearer = request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let identifier = format!("{}:{}", addr.ip(), if bearer.is_some() { "present" } else { "missing" });
    let keys_config = &app_state.0.keys_config;

    let decision = match app_state
        .0
        .rate_limiter
        .consume(
            Scope::Admin,
            &identifier,
            keys_config.rate_limit_window_seconds,
            keys_config.rate_limit_max_requests,
        )
        .await
    {
        Ok(decision) => decision,
        Err(error) => return AdminError::Internal(error).into_response(),
    };
    if !decision.allowed {
        return AdminError::TooManyRequests { retry_after: decision.retry_after }.into_response();
    }

    let Some(configured_token) = app_state.0.admin_config.api_token.as_ref() else {
        return AdminError::Unauthorized.into_response();
    };
    let Some(token) = bearer else {
        return AdminError::Unauthorized.into_response();
    };
    if !hash::constant_time_eq(&token, configured_token.expose()) {
        return AdminError::Unauthorized.into_response();
    }

    request.extensions_mut().insert(AdminIdentity(hash::admin_identity(&token)));
    next.run(request).await
}
