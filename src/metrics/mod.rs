//! Metrics collection and exposition for Prometheus.
//!
//! This module provides centralized recording of the per-request metrics
//! and their text exposition for the scrape endpoint.

mod error;
mod recorder;

pub use error::MetricsError;
pub use recorder::{Metrics, MetricsRecorder};
