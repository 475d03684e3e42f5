use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::extract::ConnectInfo;
use edge_proxy::{app_state::AppState, config::Config, router, types::secret::Secret};
use http::Request;
use serde_json::Value;
use wiremock::MockServer;

pub const PEER: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 12345);

pub fn test_config(upstream: &MockServer) -> Config {
    Config {
        http_client_base_url: upstream.uri().parse().unwrap(),
        admin_api_token: Some(Secret::from("s3cr3t-admin".to_string())),
        ..Config::default()
    }
}

pub async fn build_router(config: Config) -> (axum::Router, AppState) {
    let app_state = AppState::build(config).await.expect("app state builds");
    (router::build(app_state.clone()), app_state)
}

pub fn request(method: &str, uri: &str) -> http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .extension(ConnectInfo(PEER))
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
