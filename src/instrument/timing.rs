use std::fmt::Display;
use std::future::Future;

use tracing::{error, info};

use super::record::{RequestRecord, ResponseStatus, FALLBACK_STATUS};
use crate::metrics::MetricsRecorder;

/// Runs `handler` once and records the request it served.
///
/// After the handler finishes, and before its result is handed back, the
/// latency is observed, the request is counted, the error flag is raised for
/// a 5xx status and one log line is emitted, in that order. A failed handler
/// is recorded with its own status, or [`FALLBACK_STATUS`] when it has none,
/// and its error is returned unchanged.
///
/// If the returned future is dropped before the handler completes, only the
/// canceled-request counter is touched.
pub async fn instrument<M, F, T, E>(
    recorder: &M,
    environment: &str,
    record: RequestRecord,
    handler: F,
) -> Result<T, E>
where
    M: MetricsRecorder,
    F: Future<Output = Result<T, E>>,
    T: ResponseStatus,
    E: ResponseStatus + Display,
{
    let guard = CancelGuard::new(recorder, &record);
    let outcome = handler.await;
    guard.disarm();

    let latency = record.elapsed_secs();
    let status = match &outcome {
        Ok(response) => response.status_code(),
        Err(e) => e.status_code(),
    }
    .unwrap_or(FALLBACK_STATUS);

    recorder.record_request_duration(&record.path, latency);
    recorder.record_request(&record.method, &record.path, status);
    if status >= 500 {
        recorder.record_server_error();
    }

    let latency = format!("{:.3}", latency);
    match &outcome {
        Ok(_) => info!(
            endpoint = record.path.as_str(),
            method = record.method.as_str(),
            status,
            latency = latency.as_str(),
            environment,
            "Request completed"
        ),
        Err(e) => error!(
            endpoint = record.path.as_str(),
            method = record.method.as_str(),
            status,
            latency = latency.as_str(),
            environment,
            error = %e,
            "Request failed"
        ),
    }

    outcome
}

/// Counts the request as canceled unless disarmed before being dropped.
struct CancelGuard<'a, M: MetricsRecorder> {
    recorder: &'a M,
    record: &'a RequestRecord,
    armed: bool,
}

impl<'a, M: MetricsRecorder> CancelGuard<'a, M> {
    fn new(recorder: &'a M, record: &'a RequestRecord) -> Self {
        CancelGuard {
            recorder,
            record,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<M: MetricsRecorder> Drop for CancelGuard<'_, M> {
    fn drop(&mut self) {
        if self.armed {
            self.recorder
                .record_canceled_request(&self.record.method, &self.record.path);
        }
    }
}
