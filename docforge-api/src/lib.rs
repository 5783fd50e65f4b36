//! # docforge-api
//!
//! HTTP front end for docforge-core: markdown to PDF on `/convert`,
//! masked-region removal on `/clean-image`.

mod api;
mod config;
mod error;
mod response;

pub use api::{
    app, app_with, clean_image, convert_markdown, health_check, router, AppState,
    DEFAULT_BODY_LIMIT,
};
pub use config::ServerConfig;
pub use error::{AppError, ErrorResponse};
pub use response::attachment;

use anyhow::Context;
use tracing::info;

/// Bind `config.socket_addr()` and serve until interrupted.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr();
    let app = app_with(&config);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("docforge API listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("docforge API stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down gracefully..."),
        _ = terminate => info!("Received SIGTERM, shutting down gracefully..."),
    }
}
