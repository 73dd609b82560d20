//! Metrics recording implementation using Prometheus.

use prometheus::{
    DEFAULT_BUCKETS, Encoder, Gauge, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
    register_gauge_with_registry, register_histogram_vec_with_registry,
    register_int_counter_vec_with_registry,
};
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::warn;

use super::MetricsError;
use crate::config::MetricsConfig;
use crate::utils::log_throttle::LogThrottle;

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const HTTP_ERROR_RATE: &str = "http_error_rate";
pub const HTTP_REQUESTS_CANCELED_TOTAL: &str = "http_requests_canceled_total";

const DROP_WARNING_INTERVAL: Duration = Duration::from_secs(60);

/// Trait for recording per-request metrics.
///
/// Every method is infallible from the caller's point of view: an
/// observation that cannot be recorded is logged and dropped.
pub trait MetricsRecorder: Clone + Send + Sync + 'static {
    /// Observes the latency of a completed request.
    fn record_request_duration(&self, endpoint: &str, duration_secs: f64);

    /// Counts a completed request.
    fn record_request(&self, method: &str, endpoint: &str, status: u16);

    /// Raises the error flag after a server error.
    fn record_server_error(&self);

    /// Counts a request whose handler was dropped before producing a status.
    fn record_canceled_request(&self, method: &str, endpoint: &str);
}

/// Prometheus metrics collector.
///
/// Cheap to clone: every clone shares the same registry and accumulators.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    requests_total: IntCounterVec,
    request_duration_seconds: HistogramVec,
    error_rate: Gauge,
    requests_canceled_total: IntCounterVec,

    endpoints: Arc<EndpointBudget>,
    drop_warnings: Arc<LogThrottle>,
}

/// Bounds the number of distinct `endpoint` label values.
struct EndpointBudget {
    limit: Option<usize>,
    seen: RwLock<HashSet<String>>,
}

impl EndpointBudget {
    fn new(limit: Option<usize>) -> Self {
        EndpointBudget {
            limit,
            seen: RwLock::new(HashSet::new()),
        }
    }

    /// Returns true when `endpoint` is already tracked or fits under the cap.
    /// Admitted endpoints stay admitted for the lifetime of the registry.
    fn admit(&self, endpoint: &str) -> bool {
        let Some(limit) = self.limit else {
            return true;
        };

        {
            let seen = self.seen.read().unwrap_or_else(PoisonError::into_inner);
            if seen.contains(endpoint) {
                return true;
            }
            if seen.len() >= limit {
                return false;
            }
        }

        let mut seen = self.seen.write().unwrap_or_else(PoisonError::into_inner);
        if seen.contains(endpoint) {
            return true;
        }
        if seen.len() >= limit {
            return false;
        }
        seen.insert(endpoint.to_string());
        true
    }
}

impl Metrics {
    /// Creates a metrics instance with an unbounded endpoint label.
    pub fn new() -> Result<Self, MetricsError> {
        Self::with_config(&MetricsConfig::default())
    }

    /// Creates a metrics instance backed by a fresh Prometheus registry.
    pub fn with_config(config: &MetricsConfig) -> Result<Self, MetricsError> {
        let registry = Arc::new(Registry::new());

        let requests_total = register_int_counter_vec_with_registry!(
            Opts::new(HTTP_REQUESTS_TOTAL, "Total Request Count"),
            &["method", "endpoint", "status"],
            registry.clone()
        )?;

        let request_duration_seconds = register_histogram_vec_with_registry!(
            HTTP_REQUEST_DURATION_SECONDS,
            "Request Latency",
            &["endpoint"],
            DEFAULT_BUCKETS.to_vec(),
            registry.clone()
        )?;

        let error_rate = register_gauge_with_registry!(
            HTTP_ERROR_RATE,
            "Set to 1 once any request has returned a 5xx status; never reset",
            registry.clone()
        )?;

        let requests_canceled_total = register_int_counter_vec_with_registry!(
            Opts::new(
                HTTP_REQUESTS_CANCELED_TOTAL,
                "Requests dropped before the handler produced a status"
            ),
            &["method", "endpoint"],
            registry.clone()
        )?;

        Ok(Metrics {
            registry,
            requests_total,
            request_duration_seconds,
            error_rate,
            requests_canceled_total,
            endpoints: Arc::new(EndpointBudget::new(config.max_endpoints)),
            drop_warnings: Arc::new(LogThrottle::new(DROP_WARNING_INTERVAL)),
        })
    }

    /// Renders all metrics in Prometheus text format.
    pub fn render(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Current value of the request counter for one label combination.
    ///
    /// Reading a combination that was never recorded materializes it at zero.
    pub fn request_count(&self, method: &str, endpoint: &str, status: u16) -> u64 {
        let status = status.to_string();
        self.requests_total
            .get_metric_with_label_values(&[method, endpoint, status.as_str()])
            .map(|counter| counter.get())
            .unwrap_or(0)
    }

    /// Number of latency observations recorded for `endpoint`.
    pub fn duration_sample_count(&self, endpoint: &str) -> u64 {
        self.request_duration_seconds
            .get_metric_with_label_values(&[endpoint])
            .map(|histogram| histogram.get_sample_count())
            .unwrap_or(0)
    }

    /// Current value of the error flag.
    pub fn error_rate(&self) -> f64 {
        self.error_rate.get()
    }

    /// Number of canceled requests for one (method, endpoint) combination.
    pub fn canceled_count(&self, method: &str, endpoint: &str) -> u64 {
        self.requests_canceled_total
            .get_metric_with_label_values(&[method, endpoint])
            .map(|counter| counter.get())
            .unwrap_or(0)
    }

    fn admit(&self, endpoint: &str) -> bool {
        if self.endpoints.admit(endpoint) {
            return true;
        }
        if let Some(suppressed) = self.drop_warnings.should_emit("endpoint_cap") {
            warn!(
                endpoint,
                suppressed,
                "Endpoint label limit reached, dropping observation"
            );
        }
        false
    }

    fn drop_observation(&self, metric: &'static str, error: prometheus::Error) {
        if let Some(suppressed) = self.drop_warnings.should_emit(metric) {
            warn!(metric, suppressed, error = %error, "Failed to record metric");
        }
    }
}

impl MetricsRecorder for Metrics {
    fn record_request_duration(&self, endpoint: &str, duration_secs: f64) {
        if !self.admit(endpoint) {
            return;
        }
        match self
            .request_duration_seconds
            .get_metric_with_label_values(&[endpoint])
        {
            Ok(histogram) => histogram.observe(duration_secs),
            Err(e) => self.drop_observation(HTTP_REQUEST_DURATION_SECONDS, e),
        }
    }

    fn record_request(&self, method: &str, endpoint: &str, status: u16) {
        if !self.admit(endpoint) {
            return;
        }
        let status = status.to_string();
        match self
            .requests_total
            .get_metric_with_label_values(&[method, endpoint, status.as_str()])
        {
            Ok(counter) => counter.inc(),
            Err(e) => self.drop_observation(HTTP_REQUESTS_TOTAL, e),
        }
    }

    fn record_server_error(&self) {
        self.error_rate.set(1.0);
    }

    fn record_canceled_request(&self, method: &str, endpoint: &str) {
        if !self.admit(endpoint) {
            return;
        }
        match self
            .requests_canceled_total
            .get_metric_with_label_values(&[method, endpoint])
        {
            Ok(counter) => counter.inc(),
            Err(e) => self.drop_observation(HTTP_REQUESTS_CANCELED_TOTAL, e),
        }
    }
}
