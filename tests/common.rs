#![allow(dead_code)]

use std::io::Write;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use srewatch::config::ConfigV1;
use srewatch::metrics::Metrics;
use srewatch::routes::{create_router, with_instrumentation};
use srewatch::state::AppState;
use tower::ServiceExt;

pub fn test_config() -> ConfigV1 {
    ConfigV1 {
        environment: "test".to_string(),
        ..ConfigV1::default()
    }
}

pub fn build_state(config: ConfigV1) -> AppState {
    AppState {
        config: Arc::new(config),
        metrics: Metrics::new().expect("metrics registry"),
    }
}

/// The production router over a fresh registry.
pub fn build_app() -> (Router, Metrics) {
    let state = build_state(test_config());
    let metrics = state.metrics.clone();
    (create_router(state), metrics)
}

/// Extra routes wrapped in the same instrumentation as the production router.
pub fn build_instrumented(routes: Router<AppState>) -> (Router, Metrics) {
    let state = build_state(test_config());
    let metrics = state.metrics.clone();
    (with_instrumentation(routes, state), metrics)
}

pub fn request(path: &str, method: Method) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .expect("failed to build request")
}

pub async fn send(app: &Router, path: &str, method: Method) -> Response<Body> {
    app.clone()
        .oneshot(request(path, method))
        .await
        .expect("request should succeed")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    String::from_utf8(bytes.to_vec()).expect("body should be utf-8")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_text(response).await).expect("body should be json")
}

/// In-memory log sink for asserting on emitted lines.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().expect("capture lock").clone();
        String::from_utf8(bytes)
            .expect("log output should be utf-8")
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("capture lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Routes this thread's tracing events into `capture` until the guard drops.
pub fn capture_logs(capture: &LogCapture) -> tracing::subscriber::DefaultGuard {
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    tracing::subscriber::set_default(subscriber)
}
