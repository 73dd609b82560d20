use std::any::Any;
use std::panic::AssertUnwindSafe;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;

use super::record::{RequestRecord, ResponseStatus};
use super::timing::instrument;
use crate::state::AppState;
use crate::utils::http_helpers::HTTPError;

/// A downstream handler panicked before producing a response.
#[derive(Debug, thiserror::Error)]
#[error("handler panicked: {message}")]
pub struct HandlerPanic {
    message: String,
}

impl HandlerPanic {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        HandlerPanic { message }
    }
}

impl ResponseStatus for HandlerPanic {
    fn status_code(&self) -> Option<u16> {
        None
    }
}

/// Axum middleware recording metrics and a log line for every request.
///
/// Use with `axum::middleware::from_fn_with_state`. A panicking handler is
/// recorded as a failed request and answered with a 500.
pub async fn track_requests(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let record = RequestRecord::new(request.method().as_str(), request.uri().path());
    let handler = AssertUnwindSafe(next.run(request))
        .catch_unwind()
        .map(|result| result.map_err(HandlerPanic::from_payload));

    match instrument(&state.metrics, &state.config.environment, record, handler).await {
        Ok(response) => response,
        Err(_) => {
            HTTPError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
                .into_response()
        }
    }
}
