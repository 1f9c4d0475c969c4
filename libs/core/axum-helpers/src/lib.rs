//! # Axum Helpers
//!
//! Shared utilities for the ExtBridge HTTP layer.
//!
//! ## Modules
//!
//! - **[`envelope`]**: the `{status, message?, data?}` response envelope
//!   used by every JSON endpoint
//! - **[`extractors`]**: custom extractors (validated JSON)
//! - **[`server`]**: server startup and graceful shutdown
//! - **[`health`]**: liveness endpoint

pub mod envelope;
pub mod extractors;
pub mod health;
pub mod server;

pub use envelope::{ApiResponse, ResponseStatus, error_body};
pub use extractors::ValidatedJson;
pub use health::{HealthResponse, health_router};
pub use server::{create_app, not_found, shutdown_signal};
