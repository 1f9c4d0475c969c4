//! Thin REST wrappers over the linked services.
//!
//! Pass-throughs only: no retry, no pagination. Every client is built
//! with a bounded request timeout; upstream failures surface as
//! `Upstream` errors with the detail logged, never forwarded to the
//! client.

pub mod figma;
pub mod github;
pub mod slack;

pub use figma::FigmaClient;
pub use github::GithubClient;
pub use slack::SlackClient;

use crate::error::{IdentityError, IdentityResult};
use std::time::Duration;

/// Default bound on upstream calls.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn build_http_client(timeout: Duration) -> IdentityResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| IdentityError::Internal(format!("Failed to build HTTP client: {}", e)))
}
