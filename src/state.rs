//! Shared application state.
//!
//! Contains the state that is shared across all request handlers and the
//! instrumentation middleware.

use crate::config::ConfigV1;
use crate::metrics::Metrics;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// This state is cloned for each request handler; both fields are cheap
/// handles onto shared data.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// Request metrics registry, read by the scrape endpoint.
    pub metrics: Metrics,
}
