//! Request instrumentation.
//!
//! [`instrument`] is the framework-agnostic core: it times a handler, records
//! the request metrics and emits the request log line. [`track_requests`]
//! adapts it to axum's middleware stack.

mod layer;
mod record;
mod timing;

pub use layer::{track_requests, HandlerPanic};
pub use record::{RequestRecord, ResponseStatus, FALLBACK_STATUS};
pub use timing::instrument;
