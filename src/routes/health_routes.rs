//! Liveness and readiness endpoints.
//!
//! Both answer with fixed payloads and never consult the metrics registry.

use crate::state::AppState;
use axum::{Json, Router, response::IntoResponse, routing::get};
use serde_json::json;

/// Registers health check routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
}

/// Simple health check endpoint.
///
/// Returns a 200 OK status to indicate the service is running.
async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn readiness_check() -> impl IntoResponse {
    Json(json!({ "status": "ready" }))
}
