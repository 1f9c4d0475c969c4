use serde_json::Value;
use std::time::Duration;

use super::{DEFAULT_UPSTREAM_TIMEOUT, build_http_client};
use crate::error::{IdentityError, IdentityResult};

const GITHUB_API_BASE_URL: &str = "https://api.github.com";

/// Per-request GitHub API client, constructed from a stored access token.
pub struct GithubClient {
    http: reqwest::Client,
    access_token: String,
}

impl GithubClient {
    pub fn new(access_token: &str) -> IdentityResult<Self> {
        Self::with_timeout(access_token, DEFAULT_UPSTREAM_TIMEOUT)
    }

    pub fn with_timeout(access_token: &str, timeout: Duration) -> IdentityResult<Self> {
        Ok(Self {
            http: build_http_client(timeout)?,
            access_token: access_token.to_string(),
        })
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> IdentityResult<Value> {
        let response = self
            .http
            .get(format!("{}{}", GITHUB_API_BASE_URL, path))
            .bearer_auth(&self.access_token)
            .header("User-Agent", "extbridge")
            .header("Accept", "application/vnd.github+json")
            .query(query)
            .send()
            .await
            .map_err(|e| IdentityError::Upstream(format!("GitHub request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(IdentityError::Upstream(format!(
                "GitHub API error on {}: {}",
                path,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| IdentityError::Upstream(format!("GitHub response parse error: {}", e)))
    }

    /// The authenticated user's repositories, most recently updated first.
    pub async fn repositories(&self) -> IdentityResult<Value> {
        self.get("/user/repos", &[("sort", "updated"), ("per_page", "50")])
            .await
    }

    pub async fn repository(&self, owner: &str, repo: &str) -> IdentityResult<Value> {
        self.get(&format!("/repos/{}/{}", owner, repo), &[]).await
    }

    pub async fn commits(&self, owner: &str, repo: &str) -> IdentityResult<Value> {
        self.get(
            &format!("/repos/{}/{}/commits", owner, repo),
            &[("per_page", "10")],
        )
        .await
    }

    pub async fn issues(&self, owner: &str, repo: &str) -> IdentityResult<Value> {
        self.get(
            &format!("/repos/{}/{}/issues", owner, repo),
            &[("state", "open"), ("per_page", "10")],
        )
        .await
    }
}
