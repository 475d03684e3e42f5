mod common;

use axum::body::Body;
use common::{build_router, request, test_config};
use edge_proxy::types::secret::Secret;
use http::StatusCode;
use serde_json::json;
use tower::ServiceExt;
use wiremock::MockServer;

#[tokio::test]
async fn admin_surface_requires_the_bearer_token() {
    let upstream = MockServer::start().await;
    let (app, _) = build_router(test_config(&upstream)).await;

    let response = app
        .clone()
        .oneshot(
            request("GET", "/internal/api-keys")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            request("GET", "/internal/api-keys")
                .header("authorization", "Bearer wrong-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_cache_invalidation_fails_closed_without_a_connected_store() {
    let upstream = MockServer::start().await;
    let (app, _) = build_router(test_config(&upstream)).await;

    // CACHE_REDIS_URL is unset, so the state store is the in-memory
    // fallback, and invalidation must refuse rather than silently no-op.
    let response = app
        .oneshot(
            request("POST", "/internal/cache/invalidate")
                .header("authorization", "Bearer s3cr3t-admin")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json!({"scope": "all"})).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn admin_cache_invalidation_surfaces_503_for_a_live_but_unreachable_redis_backend() {
    let upstream = MockServer::start().await;
    let mut config = test_config(&upstream);
    // Nothing listens on this address, so the pool is built successfully
    // (connections are established lazily on first use) but the SCAN the
    // invalidator issues fails at call time. This exercises the live-Redis
    // failure path, distinct from the in-memory-fallback case above: before
    // the fix this surfaced as a 502 "upstream request failed" because the
    // admin path reused the proxy's error mapping.
    config.cache_redis_url = Some(Secret::from("redis://127.0.0.1:1/".parse().unwrap()));
    let (app, app_state) = build_router(config).await;
    assert!(
        matches!(&app_state.0.state_store, edge_proxy::state_store::StateStore::Redis(_)),
        "pool construction against an unreachable address must not fall back to in-memory"
    );

    let response = app
        .oneshot(
            request("POST", "/internal/cache/invalidate")
                .header("authorization", "Bearer s3cr3t-admin")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json!({"scope": "all"})).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
