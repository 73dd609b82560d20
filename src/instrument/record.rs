use std::time::Instant;

use http::StatusCode;

/// Status recorded for a failed handler that carries no status of its own.
pub const FALLBACK_STATUS: u16 = 500;

/// Per-request facts the metrics are labeled with.
///
/// Created when the request enters the middleware and dropped once the
/// metrics and the log line have been recorded.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub method: String,
    /// Raw request path, used verbatim as the `endpoint` label.
    pub path: String,
    pub started_at: Instant,
}

impl RequestRecord {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        RequestRecord {
            method: method.into(),
            path: path.into(),
            started_at: Instant::now(),
        }
    }

    /// Wall-clock seconds since the request entered the middleware.
    pub fn elapsed_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}

/// Anything a handler can finish with that may carry an HTTP status.
pub trait ResponseStatus {
    fn status_code(&self) -> Option<u16>;
}

impl ResponseStatus for StatusCode {
    fn status_code(&self) -> Option<u16> {
        Some(self.as_u16())
    }
}

impl<B> ResponseStatus for http::Response<B> {
    fn status_code(&self) -> Option<u16> {
        Some(self.status().as_u16())
    }
}

impl ResponseStatus for std::convert::Infallible {
    fn status_code(&self) -> Option<u16> {
        match *self {}
    }
}
