use std::net::SocketAddr;

use axum::{
    body::{to_bytes, Body},
    extract::{ConnectInfo, Request, State},
    response::{IntoResponse, Response},
};
use http::{HeaderValue, StatusCode};

use crate::{
    app_state::AppState,
    cache::{self, CacheStatus, DecideOptions, KeyHeaders, LoaderResult},
    error::{api::ApiError, auth::AuthError, invalid_req::InvalidRequestError},
    hash,
    middleware::headers as header_ops,
    rate_limit::{RateLimitDecision, Scope},
    upstream::UpstreamResponse,
};

const ROUTE_PREFIX: &str = "/api/v1";

/// Entry point wired into the router for `/api/v1/**`. Runs the full
/// authenticate -> throttle -> header-clean -> path-check -> dispatch
/// pipeline and always returns a response (errors are rendered inline,
/// never propagated past this point).
#[tracing::instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
pub async fn handle(
    State(app_state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let (parts, body) = request.into_parts();

    let forwarded_headers = header_ops::normalize_and_filter(&parts.headers);
    let has_authorization = header_ops::has_authorization(&parts.headers);
    let (accept, accept_language) = header_ops::key_headers(&parts.headers);
    let client_api_key = header_ops::extract_client_api_key(&parts.headers);

    let preauth_identifier = format!(
        "{}:{}",
        addr.ip(),
        if client_api_key.is_some() { "present" } else { "missing" }
    );

    let keys_config = &app_state.0.keys_config;
    let window = keys_config.rate_limit_window_seconds;
    let max_requests = keys_config.rate_limit_max_requests;

    let consumer = match &client_api_key {
        Some(key) => match app_state.0.key_registry.validate(key).await {
            Ok(consumer) => consumer,
            Err(error) => {
                tracing::error!(%error, "key registry unavailable, failing closed");
                return AuthError::RegistryUnavailable.into_response();
            }
        },
        None => None,
    };

    let (rate_limit_decision, auth_error) = match &consumer {
        Some(consumer) => {
            let decision = match app_state
                .0
                .rate_limiter
                .consume(Scope::Key, &consumer.key_id.to_string(), window, max_requests)
                .await
            {
                Ok(decision) => decision,
                Err(error) => return error.into_response(),
            };
            (decision, None)
        }
        None => {
            let decision = match app_state
                .0
                .rate_limiter
                .consume(Scope::Preauth, &preauth_identifier, window, max_requests)
                .await
            {
                Ok(decision) => decision,
                Err(error) => return error.into_response(),
            };
            let auth_error = if client_api_key.is_none() {
                AuthError::MissingApiKey
            } else {
                AuthError::InvalidCredentials
            };
            (decision, Some(auth_error))
        }
    };

    if !rate_limit_decision.allowed {
        let response = InvalidRequestError::TooManyRequests {
            retry_after: rate_limit_decision.retry_after,
        }
        .into_response();
        return with_rate_limit_headers(response, &rate_limit_decision);
    }

    if let Some(auth_error) = auth_error {
        let response = auth_error.into_response();
        return with_rate_limit_headers(response, &rate_limit_decision);
    }

    let outcome = dispatch(&app_state, &parts, body, &forwarded_headers, has_authorization, accept, accept_language, client_api_key.as_deref()).await;
    let response = match outcome {
        Ok(response) => response,
        Err(error) => error.into_response(),
    };
    with_rate_limit_headers(response, &rate_limit_decision)
}

#[allow(clippy::too_many_arguments)]
async fn dispatch(
    app_state: &AppState,
    parts: &http::request::Parts,
    body: Body,
    forwarded_headers: &std::collections::BTreeMap<String, String>,
    has_authorization: bool,
    accept: Option<&str>,
    accept_language: Option<&str>,
    client_api_key: Option<&str>,
) -> Result<Response, ApiError> {
    let path_with_query = normalize_route_path(parts)?;

    let mut forwarded_headers = forwarded_headers.clone();
    if !forwarded_headers.contains_key("api_key")
        && let Some(server_key) = app_state.0.upstream.server_api_key()
    {
        forwarded_headers.insert("api_key".to_string(), server_key.to_string());
    }

    let method = parts.method.as_str();
    if method != "GET" && method != "POST" {
        return Err(InvalidRequestError::NotFound.into());
    }

    let cache_config = &app_state.0.cache_config;

    if method == "POST" {
        let content_type = parts
            .headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let limit = app_state.0.config.proxy_body_limit;
        let raw_body = to_bytes(body, limit)
            .await
            .map_err(|_| InvalidRequestError::PayloadTooLarge)?;

        let json_body = if raw_body.is_empty() {
            None
        } else {
            if !content_type.contains("application/json") && !content_type.contains("+json") {
                return Err(InvalidRequestError::UnsupportedMediaType.into());
            }
            Some(
                serde_json::from_slice::<serde_json::Value>(&raw_body)
                    .map_err(|_| InvalidRequestError::UnsupportedMediaType)?,
            )
        };

        let upstream_response = app_state
            .0
            .upstream
            .request_raw("POST", &path_with_query, json_body.as_ref(), &forwarded_headers)
            .await?;

        return Ok(relay(upstream_response, None, None));
    }

    let base_path = cache::policy::normalize_base_path(&path_with_query);
    let should_bypass = cache::should_bypass(has_authorization, &base_path, &cache_config.bypass_paths);

    let key_headers = KeyHeaders { accept, accept_language };
    let cache_key = cache::build_key("GET", &path_with_query, &key_headers, client_api_key);
    let key_hash = cache_config.debug.then(|| hash::short_fingerprint(&cache_key));

    if should_bypass {
        let upstream_response = app_state
            .0
            .upstream
            .request_raw("GET", &path_with_query, None, &forwarded_headers)
            .await?;
        return Ok(relay(upstream_response, Some(CacheStatus::Bypass), key_hash));
    }

    let loader = make_get_loader(
        app_state.0.upstream.clone(),
        path_with_query.clone(),
        forwarded_headers.clone(),
        cache_config.ignore_upstream_control,
    );

    let outcome = app_state
        .0
        .cache
        .swr(&cache_key, cache_config.ttl_default_seconds, cache_config.stale_ttl_seconds, loader)
        .await?;

    Ok(relay(outcome.value, Some(outcome.status), key_hash))
}

fn to_internal_error(error: ApiError) -> crate::error::internal::InternalError {
    match error {
        ApiError::Internal(error) => error,
        _ => crate::error::internal::InternalError::StateStoreFallback,
    }
}

/// Builds a loader closure for [`cache::Loader`]: re-fetches from upstream
/// and re-applies [`cache::decide`] on every call, so a background refresh
/// observes the same cacheability rules a foreground miss would.
fn make_get_loader(
    upstream: crate::upstream::UpstreamClient,
    path_with_query: String,
    forwarded_headers: std::collections::BTreeMap<String, String>,
    ignore_upstream_control: bool,
) -> cache::Loader {
    std::sync::Arc::new(move || {
        let upstream = upstream.clone();
        let path_with_query = path_with_query.clone();
        let forwarded_headers = forwarded_headers.clone();
        Box::pin(async move {
            let response = upstream
                .request_raw("GET", &path_with_query, None, &forwarded_headers)
                .await
                .map_err(to_internal_error)?;
            let decision = cache::decide(
                response.status,
                response.cache_control(),
                DecideOptions { ignore_upstream_control },
            );
            Ok(LoaderResult {
                value: response,
                cacheable: decision.cacheable,
                ttl_seconds: decision.ttl_seconds,
                stale_ttl_seconds: decision.stale_ttl_seconds,
            })
        }) as std::pin::Pin<Box<dyn std::future::Future<Output = Result<LoaderResult, crate::error::internal::InternalError>> + Send>>
    })
}

fn normalize_route_path(parts: &http::request::Parts) -> Result<String, ApiError> {
    let uri = &parts.uri;
    let path = uri.path();
    let stripped = path.strip_prefix(ROUTE_PREFIX).unwrap_or(path);
    if stripped.contains("://") {
        return Err(InvalidRequestError::InvalidPath.into());
    }
    let mut collapsed = stripped.trim_start_matches('/').to_string();
    collapsed.insert(0, '/');
    if collapsed == "/" && stripped.is_empty() {
        collapsed = "/".to_string();
    }

    Ok(match uri.query() {
        Some(query) if !query.is_empty() => format!("{collapsed}?{query}"),
        _ => collapsed,
    })
}

fn relay(upstream: UpstreamResponse, cache_status: Option<CacheStatus>, key_hash: Option<String>) -> Response {
    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let omit_body = status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED;

    let mut response = if omit_body {
        Response::new(Body::empty())
    } else {
        match &upstream.body {
            serde_json::Value::String(text) => Response::new(Body::from(text.clone())),
            serde_json::Value::Null => Response::new(Body::empty()),
            value => Response::new(Body::from(value.to_string())),
        }
    };
    *response.status_mut() = status;

    for (name, value) in &upstream.headers {
        if let (Ok(name), Ok(value)) = (
            http::HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            response.headers_mut().insert(name, value);
        }
    }

    if !omit_body && let Some(content_type) = &upstream.content_type
        && let Ok(value) = HeaderValue::from_str(content_type)
    {
        response.headers_mut().insert(http::header::CONTENT_TYPE, value);
    }

    if let Some(status) = cache_status
        && let Ok(value) = HeaderValue::from_str(status.as_header_value())
    {
        response.headers_mut().insert("x-cache", value);
    }

    if let Some(hash) = key_hash
        && let Ok(value) = HeaderValue::from_str(&hash)
    {
        response.headers_mut().insert("x-cache-key-hash", value);
    }

    response
}

fn with_rate_limit_headers(mut response: Response, decision: &RateLimitDecision) -> Response {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert("x-ratelimit-limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("x-ratelimit-remaining", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.reset_at.to_string()) {
        headers.insert("x-ratelimit-reset", value);
    }
    response
}
