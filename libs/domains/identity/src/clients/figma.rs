use serde_json::Value;
use std::time::Duration;

use super::{DEFAULT_UPSTREAM_TIMEOUT, build_http_client};
use crate::error::{IdentityError, IdentityResult};

const FIGMA_API_BASE_URL: &str = "https://api.figma.com/v1";

/// Per-request Figma API client, constructed from a stored access token.
pub struct FigmaClient {
    http: reqwest::Client,
    access_token: String,
}

impl FigmaClient {
    pub fn new(access_token: &str) -> IdentityResult<Self> {
        Self::with_timeout(access_token, DEFAULT_UPSTREAM_TIMEOUT)
    }

    pub fn with_timeout(access_token: &str, timeout: Duration) -> IdentityResult<Self> {
        Ok(Self {
            http: build_http_client(timeout)?,
            access_token: access_token.to_string(),
        })
    }

    async fn get(&self, path: &str) -> IdentityResult<Value> {
        let response = self
            .http
            .get(format!("{}{}", FIGMA_API_BASE_URL, path))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| IdentityError::Upstream(format!("Figma request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(IdentityError::Upstream(format!(
                "Figma API error on {}: {}",
                path,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| IdentityError::Upstream(format!("Figma response parse error: {}", e)))
    }

    /// Projects in a team the user belongs to.
    pub async fn team_projects(&self, team_id: &str) -> IdentityResult<Value> {
        self.get(&format!("/teams/{}/projects", urlencoding::encode(team_id)))
            .await
    }

    /// Files in a project.
    pub async fn project_files(&self, project_id: &str) -> IdentityResult<Value> {
        self.get(&format!("/projects/{}/files", urlencoding::encode(project_id)))
            .await
    }

    /// A single file's document.
    pub async fn file(&self, file_key: &str) -> IdentityResult<Value> {
        self.get(&format!("/files/{}", urlencoding::encode(file_key)))
            .await
    }
}
