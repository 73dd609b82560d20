//! Application startup and server initialization.
//!
//! This module handles the creation and configuration of the HTTP server,
//! including initialization of the metrics registry and route setup.

use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use crate::config::ConfigV1;
use crate::metrics::Metrics;
use crate::routes;
use crate::state::AppState;

/// Initializes and runs the application server.
///
/// Builds a fresh metrics registry and the router, binds to the configured
/// address and serves until Ctrl-C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the metrics cannot be registered, the server fails to
/// bind to the specified address or encounters a runtime error during
/// execution.
pub async fn run(config: Arc<ConfigV1>) -> Result<(), Box<dyn std::error::Error>> {
    let metrics = Metrics::with_config(&config.metrics)?;
    let bind_address = config.bind_address();

    let state = AppState {
        config: config.clone(),
        metrics,
    };

    let app = routes::create_router(state);

    let listener = TcpListener::bind(&bind_address).await?;
    info!(
        address = bind_address.as_str(),
        environment = config.environment.as_str(),
        "Starting server"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
