use async_trait::async_trait;
use chrono::Duration;
use serde::Deserialize;

use crate::error::{IdentityError, IdentityResult};
use crate::models::ServiceKind;
use crate::oauth::providers::ServiceProvider;
use crate::oauth::types::RemoteAccount;

#[derive(Clone)]
pub struct FigmaProvider {
    client_id: String,
    client_secret: String,
    http_client: reqwest::Client,
}

/// `GET /v1/me` response
#[derive(Debug, Deserialize)]
struct FigmaMe {
    id: String,
    email: String,
    handle: Option<String>,
}

impl FigmaProvider {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ServiceProvider for FigmaProvider {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Figma
    }

    fn scopes(&self) -> &'static [&'static str] {
        &["file_read"]
    }

    fn auth_url(&self) -> &str {
        "https://www.figma.com/oauth"
    }

    fn token_url(&self) -> &str {
        "https://www.figma.com/api/oauth/token"
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn client_secret(&self) -> &str {
        &self.client_secret
    }

    fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Figma access tokens are short-lived; assume one hour when the
    /// exchange response omits `expires_in`.
    fn default_token_ttl(&self) -> Option<Duration> {
        Some(Duration::hours(1))
    }

    async fn fetch_remote_account(&self, access_token: &str) -> IdentityResult<RemoteAccount> {
        let response = self
            .http_client
            .get("https://api.figma.com/v1/me")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| IdentityError::OAuth(format!("Failed to get user info: {}", e)))?;

        if !response.status().is_success() {
            return Err(IdentityError::OAuth(format!(
                "Figma API returned error: {}",
                response.status()
            )));
        }

        let me: FigmaMe = response
            .json()
            .await
            .map_err(|e| IdentityError::OAuth(format!("Failed to parse user info: {}", e)))?;

        Ok(RemoteAccount {
            service_user_id: me.id,
            email: me.email,
            display_name: me.handle,
            team: None,
        })
    }
}
