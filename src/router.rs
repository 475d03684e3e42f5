use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer, request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    sensitive_headers::SetSensitiveHeadersLayer, trace::TraceLayer,
};

use crate::{admin, app_state::AppState, catch_panic::PanicResponder, health, middleware as mw, proxy};

/// Builds the full axum [`Router`]: health endpoints, the `/api/v1/**`
/// proxy catch-all, and the bearer-guarded `/internal/*` admin surface,
/// wrapped in an ambient middleware stack providing panic catching,
/// header hygiene, tracing, request-id propagation, and body-size
/// limiting.
pub fn build(app_state: AppState) -> Router {
    let body_limit = app_state.config().proxy_body_limit;

    let admin_routes = Router::new()
        .route("/internal/api-keys", post(admin::handlers::create_api_key).get(admin::handlers::list_api_keys))
        .route("/internal/api-keys/{key_id}/revoke", post(admin::handlers::revoke_api_key))
        .route("/internal/api-keys/{key_id}/activate", post(admin::handlers::activate_api_key))
        .route("/internal/api-keys/{key_id}", delete(admin::handlers::delete_api_key))
        .route("/internal/cache/invalidate", post(admin::handlers::invalidate_cache))
        .layer(middleware::from_fn_with_state(app_state.clone(), mw::admin::require_admin));

    let proxy_routes = Router::new()
        .route("/api/v1", get(proxy::handle).post(proxy::handle))
        .route("/api/v1/{*rest}", get(proxy::handle).post(proxy::handle));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/cache", get(health::health_cache))
        .merge(proxy_routes)
        .merge(admin_routes)
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::custom(PanicResponder))
                .layer(SetSensitiveHeadersLayer::new(std::iter::once(http::header::AUTHORIZATION)))
                .layer(TraceLayer::new_for_http())
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(RequestBodyLimitLayer::new(body_limit)),
        )
        .with_state(app_state)
}
