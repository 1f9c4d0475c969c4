pub mod figma;
pub mod github;
pub mod slack;

pub use figma::FigmaProvider;
pub use github::GithubProvider;
pub use slack::SlackProvider;

use async_trait::async_trait;
use chrono::Duration;

use crate::error::{IdentityError, IdentityResult};
use crate::models::ServiceKind;
use crate::oauth::types::{RemoteAccount, TokenSet};

/// One external service's OAuth2 endpoints and identity lookup.
///
/// The authorization-code flow itself (`authorize_url`, `exchange_code`)
/// has standard-OAuth2 default implementations; providers with
/// non-standard token endpoints (Slack) override `exchange_code`.
#[async_trait]
pub trait ServiceProvider: Send + Sync {
    fn kind(&self) -> ServiceKind;

    fn scopes(&self) -> &'static [&'static str];

    fn auth_url(&self) -> &str;
    fn token_url(&self) -> &str;
    fn client_id(&self) -> &str;
    fn client_secret(&self) -> &str;
    fn http_client(&self) -> &reqwest::Client;

    /// Fallback token lifetime for providers that do not report
    /// `expires_in` on exchange. `None` means tokens never expire.
    fn default_token_ttl(&self) -> Option<Duration> {
        None
    }

    /// Build the authorization redirect URL.
    ///
    /// `state` is the opaque correlation value tying the eventual
    /// callback back to the initiating user.
    fn authorize_url(&self, state: &str, redirect_uri: &str) -> IdentityResult<String> {
        use oauth2::{AuthUrl, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope, basic::BasicClient};

        let auth_url = AuthUrl::new(self.auth_url().to_string())
            .map_err(|e| IdentityError::OAuth(format!("Invalid auth URL: {}", e)))?;
        let redirect_url = RedirectUrl::new(redirect_uri.to_string())
            .map_err(|e| IdentityError::OAuth(format!("Invalid redirect URL: {}", e)))?;

        let client = BasicClient::new(ClientId::new(self.client_id().to_string()))
            .set_client_secret(ClientSecret::new(self.client_secret().to_string()))
            .set_auth_uri(auth_url)
            .set_redirect_uri(redirect_url);

        let auth_request = self.scopes().iter().fold(
            client.authorize_url(|| CsrfToken::new(state.to_string())),
            |acc, scope| acc.add_scope(Scope::new(scope.to_string())),
        );

        let (url, _) = auth_request.url();
        Ok(url.to_string())
    }

    /// Exchange an authorization code for an access credential.
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> IdentityResult<TokenSet> {
        use oauth2::{
            AuthUrl, AuthorizationCode, ClientId, ClientSecret, RedirectUrl,
            TokenResponse as OAuth2TokenResponse, TokenUrl, basic::BasicClient,
        };

        let client = BasicClient::new(ClientId::new(self.client_id().to_string()))
            .set_client_secret(ClientSecret::new(self.client_secret().to_string()))
            .set_auth_uri(
                AuthUrl::new(self.auth_url().to_string())
                    .map_err(|e| IdentityError::OAuth(format!("Invalid auth URL: {}", e)))?,
            )
            .set_token_uri(
                TokenUrl::new(self.token_url().to_string())
                    .map_err(|e| IdentityError::OAuth(format!("Invalid token URL: {}", e)))?,
            )
            .set_redirect_uri(
                RedirectUrl::new(redirect_uri.to_string())
                    .map_err(|e| IdentityError::OAuth(format!("Invalid redirect URL: {}", e)))?,
            );

        let token_result = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(self.http_client())
            .await
            .map_err(|e| IdentityError::OAuth(format!("Failed to exchange code: {}", e)))?;

        Ok(TokenSet {
            access_token: token_result.access_token().secret().clone(),
            refresh_token: token_result.refresh_token().map(|t| t.secret().clone()),
            expires_in: token_result.expires_in().map(|d| d.as_secs()),
        })
    }

    /// Call the service's "who am I" endpoint with a fresh credential.
    async fn fetch_remote_account(&self, access_token: &str) -> IdentityResult<RemoteAccount>;
}
