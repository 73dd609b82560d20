//! Application endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;
use crate::utils::http_helpers::HTTPError;

/// Registers the application routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/error", get(simulated_error))
}

#[derive(Serialize)]
struct IndexResponse {
    app: String,
    message: &'static str,
}

#[derive(Serialize)]
struct SimulatedErrorResponse {
    error: &'static str,
    app: String,
}

async fn index(State(state): State<AppState>) -> Json<IndexResponse> {
    Json(IndexResponse {
        app: state.config.app_name.clone(),
        message: "Application is running",
    })
}

/// Test fixture reporting an application error.
///
/// Answers 200 on purpose; the error lives in the body, not the status.
async fn simulated_error(State(state): State<AppState>) -> Json<SimulatedErrorResponse> {
    Json(SimulatedErrorResponse {
        error: "Simulated application error",
        app: state.config.app_name.clone(),
    })
}

/// Fallback for paths without a registered route.
pub(super) async fn not_found() -> HTTPError {
    HTTPError::new(StatusCode::NOT_FOUND, "Not found")
}
