use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::app_state::AppState;

/// `GET /health` — liveness only, never touches the state store.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /health/cache` — reports whether the state store backing the
/// cache/key-registry/rate-limiter is the real backend (pinged live) or
/// the in-memory fallback installed at startup.
pub async fn health_cache(State(app_state): State<AppState>) -> Json<Value> {
    if app_state.0.state_store.is_fallback() {
        return Json(json!({
            "status": "degraded",
            "message": "running without a connected state store",
        }));
    }
    if app_state.0.state_store.ping().await {
        Json(json!({ "status": "ok" }))
    } else {
        Json(json!({
            "status": "degraded",
            "message": "state store ping failed",
        }))
    }
}
