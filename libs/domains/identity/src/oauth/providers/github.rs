use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{IdentityError, IdentityResult};
use crate::models::ServiceKind;
use crate::oauth::providers::ServiceProvider;
use crate::oauth::types::RemoteAccount;

#[derive(Clone)]
pub struct GithubProvider {
    client_id: String,
    client_secret: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

impl GithubProvider {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            http_client: reqwest::Client::new(),
        }
    }

    /// The profile email can be private; fall back to the primary
    /// verified address from the emails endpoint.
    async fn fetch_primary_email(&self, access_token: &str) -> IdentityResult<Option<String>> {
        let response = self
            .http_client
            .get("https://api.github.com/user/emails")
            .bearer_auth(access_token)
            .header("User-Agent", "extbridge")
            .send()
            .await
            .map_err(|e| IdentityError::OAuth(format!("Failed to get user emails: {}", e)))?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let emails: Vec<GithubEmail> = response
            .json()
            .await
            .map_err(|e| IdentityError::OAuth(format!("Failed to parse emails: {}", e)))?;

        Ok(emails
            .into_iter()
            .find(|e| e.primary && e.verified)
            .map(|e| e.email))
    }
}

#[async_trait]
impl ServiceProvider for GithubProvider {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Github
    }

    fn scopes(&self) -> &'static [&'static str] {
        &["user", "repo", "read:org"]
    }

    fn auth_url(&self) -> &str {
        "https://github.com/login/oauth/authorize"
    }

    fn token_url(&self) -> &str {
        "https://github.com/login/oauth/access_token"
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

    // GitHub OAuth tokens carry no expiry

    async fn fetch_remote_account(&self, access_token: &str) -> IdentityResult<RemoteAccount> {
        let response = self
            .http_client
            .get("https://api.github.com/user")
            .bearer_auth(access_token)
            .header("User-Agent", "extbridge")
            .send()
            .await
            .map_err(|e| IdentityError::OAuth(format!("Failed to get user info: {}", e)))?;

        if !response.status().is_success() {
            return Err(IdentityError::OAuth(format!(
                "GitHub API returned error: {}",
                response.status()
            )));
        }

        let user: GithubUser = response
            .json()
            .await
            .map_err(|e| IdentityError::OAuth(format!("Failed to parse user info: {}", e)))?;

        let email = match user.email {
            Some(email) => email,
            None => self.fetch_primary_email(access_token).await?.ok_or_else(|| {
                IdentityError::OAuth("No verified primary email on GitHub account".to_string())
            })?,
        };

        Ok(RemoteAccount {
            service_user_id: user.id.to_string(),
            email,
            display_name: Some(user.name.unwrap_or(user.login)),
            team: None,
        })
    }
}
