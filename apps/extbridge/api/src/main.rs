use axum_helpers::create_app;
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_identity::InMemoryUserRepository;
use std::sync::Arc;
use tracing::info;

mod api;
mod config;
mod openapi;

use config::Config;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Install color-eyre first for colored error output
    install_color_eyre();

    // Load configuration from environment variables
    let config = Config::from_env()?;

    init_tracing(&config.environment);

    // Credential store. Persistent-store wiring is deliberately outside
    // the identity domain; swap the repository here to change backends.
    let repository = Arc::new(InMemoryUserRepository::new());

    let router = api::routes(&config, Arc::clone(&repository))?;

    info!(
        "Starting {} {} ({:?})",
        config.app.name, config.app.version, config.environment
    );

    create_app(router, &config.server)
        .await
        .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("ExtBridge API shutdown complete");
    Ok(())
}
