use std::string::FromUtf8Error;

/// Failures while registering or exposing metrics.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("metrics exposition is not valid UTF-8: {0}")]
    Encoding(#[from] FromUtf8Error),
}
