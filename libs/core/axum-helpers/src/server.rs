//! Server startup and graceful shutdown.

use crate::envelope::error_body;
use axum::{Router, http::StatusCode, response::Response};
use core_config::server::ServerConfig;
use std::io;
use tokio::signal;
use tracing::info;

/// Starts the Axum server with graceful shutdown on SIGTERM/SIGINT.
///
/// # Errors
/// Returns an error if the TCP listener fails to bind or the server
/// encounters an error while running.
pub async fn create_app(router: Router, server_config: &ServerConfig) -> io::Result<()> {
    let listener = tokio::net::TcpListener::bind(server_config.address()).await?;

    info!("Server starting on {}", listener.local_addr()?);
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .inspect_err(|e| {
            tracing::error!("Server encountered an error: {:?}", e);
        })?;

    Ok(())
}

/// Resolves when SIGTERM or SIGINT is received.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

/// Fallback handler returning a 404 error envelope.
pub async fn not_found() -> Response {
    error_body(StatusCode::NOT_FOUND, "Resource not found")
}
