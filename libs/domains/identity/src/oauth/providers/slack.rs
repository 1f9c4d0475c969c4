use async_trait::async_trait;
use chrono::Duration;
use serde::Deserialize;

use crate::error::{IdentityError, IdentityResult};
use crate::models::ServiceKind;
use crate::oauth::providers::ServiceProvider;
use crate::oauth::types::{RemoteAccount, RemoteTeam, TokenSet};

#[derive(Clone)]
pub struct SlackProvider {
    client_id: String,
    client_secret: String,
    http_client: reqwest::Client,
}

/// `oauth.v2.access` response. Slack wraps everything in an `ok` flag
/// instead of HTTP status codes.
#[derive(Debug, Deserialize)]
struct SlackTokenResponse {
    ok: bool,
    error: Option<String>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
}

/// `users.identity` response
#[derive(Debug, Deserialize)]
struct SlackIdentity {
    ok: bool,
    error: Option<String>,
    user: Option<SlackIdentityUser>,
    team: Option<SlackIdentityTeam>,
}

#[derive(Debug, Deserialize)]
struct SlackIdentityUser {
    id: String,
    email: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackIdentityTeam {
    id: String,
    name: Option<String>,
}

impl SlackProvider {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ServiceProvider for SlackProvider {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Slack
    }

    fn scopes(&self) -> &'static [&'static str] {
        &[
            "channels:read",
            "chat:write",
            "users:read",
            "team:read",
            "files:read",
        ]
    }

    fn auth_url(&self) -> &str {
        "https://slack.com/oauth/v2/authorize"
    }

    fn token_url(&self) -> &str {
        "https://slack.com/api/oauth.v2.access"
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

    /// Slack tokens are treated as valid for 24 hours before a re-link
    /// is required.
    fn default_token_ttl(&self) -> Option<Duration> {
        Some(Duration::hours(24))
    }

    /// Slack's token endpoint is nonstandard (`ok` flag, form post), so
    /// the generic exchange is overridden.
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> IdentityResult<TokenSet> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];

        let response = self
            .http_client
            .post(self.token_url())
            .form(&params)
            .send()
            .await
            .map_err(|e| IdentityError::OAuth(format!("Failed to exchange code: {}", e)))?;

        let token: SlackTokenResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::OAuth(format!("Failed to parse token response: {}", e)))?;

        if !token.ok {
            return Err(IdentityError::OAuth(format!(
                "Slack token exchange failed: {}",
                token.error.unwrap_or_else(|| "unknown error".to_string())
            )));
        }

        let access_token = token.access_token.ok_or_else(|| {
            IdentityError::OAuth("Slack token response missing access_token".to_string())
        })?;

        Ok(TokenSet {
            access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
        })
    }

    async fn fetch_remote_account(&self, access_token: &str) -> IdentityResult<RemoteAccount> {
        let response = self
            .http_client
            .get("https://slack.com/api/users.identity")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| IdentityError::OAuth(format!("Failed to get user identity: {}", e)))?;

        let identity: SlackIdentity = response
            .json()
            .await
            .map_err(|e| IdentityError::OAuth(format!("Failed to parse identity: {}", e)))?;

        if !identity.ok {
            return Err(IdentityError::OAuth(format!(
                "Slack identity lookup failed: {}",
                identity.error.unwrap_or_else(|| "unknown error".to_string())
            )));
        }

        let user = identity.user.ok_or_else(|| {
            IdentityError::OAuth("Slack identity response missing user".to_string())
        })?;

        Ok(RemoteAccount {
            service_user_id: user.id,
            email: user.email,
            display_name: user.name,
            team: identity.team.map(|t| RemoteTeam {
                id: t.id,
                name: t.name,
            }),
        })
    }
}
