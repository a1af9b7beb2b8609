//! Startup helpers for the dataset builder server.

use std::process::ExitCode;
use std::sync::Arc;

use crate::dataset::DatasetConfig;
use crate::server::{self, AppState};

/// Install the global tracing subscriber (`RUST_LOG` aware, `info` by default).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();
}

/// Run the server until Ctrl+C.
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    init_tracing();

    tracing::info!("Starting dataset builder v{}", env!("CARGO_PKG_VERSION"));

    let state = match initialize() {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to create state: {e}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(server::run_server_with_shutdown(state, shutdown_signal())) {
        tracing::error!("Server error: {e}");
        return ExitCode::from(1);
    }

    tracing::info!("Dataset builder stopped");
    ExitCode::SUCCESS
}

/// Read configuration from the environment and open the store.
///
/// # Errors
/// Returns an error if the configuration is invalid.
pub fn initialize() -> Result<Arc<AppState>, Box<dyn std::error::Error + Send + Sync>> {
    let config = DatasetConfig::from_env()?;
    tracing::info!(
        "Dataset file: {} (load policy: {}, weight policy: {})",
        config.storage.data_file.display(),
        config.storage.load_policy,
        config.form.weight_policy
    );
    Ok(AppState::new(config))
}

/// Completes on Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
