mod common;

use axum::body::Body;
use common::{body_json, build_router, request, test_config};
use http::StatusCode;
use serde_json::json;
use tower::ServiceExt;
use wiremock::MockServer;

#[tokio::test]
async fn admin_can_create_list_revoke_and_delete_keys() {
    let upstream = MockServer::start().await;
    let (app, _) = build_router(test_config(&upstream)).await;
    let auth = "Bearer s3cr3t-admin";

    let response = app
        .clone()
        .oneshot(
            request("POST", "/internal/api-keys")
                .header("authorization", auth)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json!({"owner": "acme"})).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let key_id = created["keyId"].as_str().unwrap().to_string();
    assert!(created["apiKey"].as_str().unwrap().starts_with("pk_"));

    let response = app
        .clone()
        .oneshot(
            request("GET", "/internal/api-keys")
                .header("authorization", auth)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = body_json(response).await;
    assert_eq!(listed["items"].as_array().unwrap().len(), 1);

    let response = app
        .clone()
        .oneshot(
            request("POST", &format!("/internal/api-keys/{key_id}/revoke"))
                .header("authorization", auth)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            request("DELETE", &format!("/internal/api-keys/{key_id}"))
                .header("authorization", auth)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            request("POST", &format!("/internal/api-keys/{key_id}/revoke"))
                .header("authorization", auth)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
