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
async fn health_endpoints_report_liveness_and_fallback_mode() {
    let upstream = MockServer::start().await;
    let (app, _) = build_router(test_config(&upstream)).await;

    let response = app
        .clone()
        .oneshot(request("GET", "/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"status": "ok"}));

    // no CACHE_REDIS_URL configured in tests, so the store runs in its
    // in-memory fallback mode and health/cache must say so.
    let response = app
        .oneshot(request("GET", "/health/cache").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "degraded");
}

#[tokio::test]
async fn proxy_bypasses_cache_when_client_sends_authorization() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/secure"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
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
        .oneshot(
            request("GET", "/api/v1/secure")
                .header("x-api-key", raw_key.as_str())
                .header("authorization", "Bearer end-user-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-cache").unwrap(), "BYPASS");
}
