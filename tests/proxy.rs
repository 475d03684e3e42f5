mod common;

use axum::body::Body;
use common::{body_json, build_router, request, test_config};
use http::StatusCode;
use serde_json::json;
use tower::ServiceExt;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

#[tokio::test]
async fn proxy_rejects_missing_and_unknown_api_keys() {
    let upstream = MockServer::start().await;
    let (app, _) = build_router(test_config(&upstream)).await;

    let response = app
        .clone()
        .oneshot(request("GET", "/api/v1/widgets").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            request("GET", "/api/v1/widgets")
                .header("x-api-key", "pk_not_a_real_key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn proxy_relays_get_and_post_for_a_valid_key() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/widgets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"widgets": ["a", "b"]})))
        .mount(&upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/widgets"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"created": true})))
        .mount(&upstream)
        .await;

    let (app, app_state) = build_router(test_config(&upstream)).await;
    let (raw_key, _) = app_state
        .0
        .key_registry
        .create(edge_proxy::keys::NewApiKey {
            owner: "acme".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            request("GET", "/api/v1/widgets")
                .header("x-api-key", raw_key.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-ratelimit-remaining").is_some());
    // no CACHE_REDIS_URL configured, so the state store runs in fallback
    // mode and cache::store::swr always serves BYPASS (see cache/store.rs
    // unit tests for the HIT/MISS/STALE envelope behavior against a live
    // store).
    assert_eq!(response.headers().get("x-cache").unwrap(), "BYPASS");
    assert_eq!(body_json(response).await, json!({"widgets": ["a", "b"]}));

    let response = app
        .oneshot(
            request("POST", "/api/v1/widgets")
                .header("x-api-key", raw_key.as_str())
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json!({"name": "gizmo"})).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await, json!({"created": true}));
}

#[tokio::test]
async fn proxy_relays_upstream_error_status_verbatim() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"error": "down"})))
        .mount(&upstream)
        .await;

    let mut config = test_config(&upstream);
    config.http_client_retries = 0;
    let (app, app_state) = build_router(config).await;
    let (raw_key, _) = app_state
        .0
        .key_registry
        .create(edge_proxy::keys::NewApiKey {
            owner: "acme".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let response = app
        .oneshot(
            request("GET", "/api/v1/broken")
                .header("x-api-key", raw_key.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
