use std::sync::Arc;

use srewatch::config::{load_config, print_schema};
use srewatch::startup;
use srewatch::utils::logger::init_logging;
use tracing::error;

#[tokio::main]
async fn main() {
    if std::env::args().any(|arg| arg == "--print-schema") {
        if let Err(e) = print_schema() {
            eprintln!("Failed to print configuration schema: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let config = load_config();

    let log_guard = match init_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error initializing logging: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = startup::run(Arc::new(config)).await {
        error!(error = %e, "Server exited with an error");
        drop(log_guard);
        std::process::exit(1);
    }
}
