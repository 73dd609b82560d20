//! HTTP route definitions and handlers.
//!
//! Application and health routes run behind the request instrumentation;
//! the scrape endpoint is mounted beside it and is not instrumented.

mod app_routes;
mod health_routes;
mod metrics;

pub use metrics::PROMETHEUS_CONTENT_TYPE;

use crate::instrument::track_requests;
use crate::state::AppState;
use axum::{Router, middleware};

/// Creates the application router with all configured routes.
pub fn create_router(state: AppState) -> Router {
    let app = Router::new()
        .merge(app_routes::routes())
        .merge(health_routes::routes());

    with_instrumentation(app, state)
}

/// Wraps `routes` and the not-found fallback in the request
/// instrumentation, adds the scrape endpoint and attaches the application
/// state.
pub fn with_instrumentation(routes: Router<AppState>, state: AppState) -> Router {
    routes
        .fallback(app_routes::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .merge(metrics::routes())
        .with_state(state)
}
