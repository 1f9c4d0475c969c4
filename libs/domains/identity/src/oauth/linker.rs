//! Drives the per-service linking protocol: authorization redirect,
//! callback completion, and disconnect.
//!
//! The initiating user's id travels through the whole OAuth2 round trip
//! as the `state` parameter, so the callback can be tied back to its
//! user without any server-side session state.

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{IdentityError, IdentityResult};
use crate::models::{ServiceConnection, ServiceKind, User};
use crate::oauth::providers::ServiceProvider;
use crate::repository::UserRepository;

/// Fail with `ServiceTokenExpired` if the stored credential is past its
/// expiry. Operations that use a linked token call this before the
/// upstream request; there is no automatic refresh, the user must
/// re-run the connect flow.
pub fn ensure_fresh(connection: &ServiceConnection) -> IdentityResult<()> {
    if connection.is_token_expired(Utc::now()) {
        return Err(IdentityError::ServiceTokenExpired(connection.service));
    }
    Ok(())
}

/// One service's linker, holding its provider configuration explicitly
/// rather than registering it into any shared registry.
pub struct ServiceLinker<R> {
    provider: Arc<dyn ServiceProvider>,
    repository: Arc<R>,
    /// The callback URL registered with the provider
    callback_url: String,
}

impl<R> Clone for ServiceLinker<R> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            repository: Arc::clone(&self.repository),
            callback_url: self.callback_url.clone(),
        }
    }
}

impl<R: UserRepository> ServiceLinker<R> {
    pub fn new(
        provider: Arc<dyn ServiceProvider>,
        repository: Arc<R>,
        callback_url: String,
    ) -> Self {
        Self {
            provider,
            repository,
            callback_url,
        }
    }

    pub fn kind(&self) -> ServiceKind {
        self.provider.kind()
    }

    /// Step 1: the authorization redirect for an already-authenticated
    /// user. The user's id is the correlation value.
    pub fn authorize_redirect(&self, user_id: Uuid) -> IdentityResult<String> {
        self.provider
            .authorize_url(&user_id.to_string(), &self.callback_url)
    }

    /// Steps 2-5: exchange the authorization code, resolve the remote
    /// identity, match it to a local account and write the connection.
    ///
    /// A remote account alone never creates a local account: when no
    /// user matches the remote email, or the matched user differs from
    /// the one that initiated the flow, the link is refused with
    /// `NoMatchingLocalAccount` and nothing is written.
    ///
    /// The write is a whole-document replace; concurrent links for the
    /// same user race last-writer-wins (see `UserRepository::update`).
    pub async fn complete(&self, state: &str, code: &str) -> IdentityResult<User> {
        let kind = self.provider.kind();

        let initiated_by = Uuid::parse_str(state)
            .map_err(|_| IdentityError::OAuth("Invalid state parameter".to_string()))?;

        let tokens = self.provider.exchange_code(code, &self.callback_url).await?;
        let remote = self.provider.fetch_remote_account(&tokens.access_token).await?;

        let Some(mut user) = self.repository.get_by_email(&remote.email).await? else {
            return Err(IdentityError::NoMatchingLocalAccount {
                service: kind,
                email: remote.email,
            });
        };

        if user.id != initiated_by {
            tracing::warn!(
                service = %kind,
                email = %remote.email,
                "Remote email resolves to a different local account than the initiating user"
            );
            return Err(IdentityError::NoMatchingLocalAccount {
                service: kind,
                email: remote.email,
            });
        }

        let now = Utc::now();
        let token_expiry = tokens
            .expires_in
            .map(|secs| Duration::seconds(secs as i64))
            .or_else(|| self.provider.default_token_ttl())
            .map(|ttl| now + ttl);

        let (team_id, team_name) = match remote.team {
            Some(team) => (Some(team.id), team.name),
            None => (None, None),
        };

        user.upsert_connection(ServiceConnection {
            service: kind,
            service_user_id: remote.service_user_id,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_expiry,
            scopes: self.provider.scopes().iter().map(|s| s.to_string()).collect(),
            connected_at: now,
            team_id,
            team_name,
        });
        user.updated_at = now;

        let user = self.repository.update(user).await?;
        tracing::info!(service = %kind, email = %user.email, "Service linked");
        Ok(user)
    }

    /// Remove the connection entry for this service. Removing an absent
    /// entry is a successful no-op.
    pub async fn disconnect(&self, user_id: Uuid) -> IdentityResult<User> {
        let kind = self.provider.kind();

        let mut user = self
            .repository
            .get_by_id(user_id)
            .await?
            .ok_or(IdentityError::NotFound(user_id))?;

        if !user.remove_connection(kind) {
            return Ok(user);
        }

        user.updated_at = Utc::now();
        let user = self.repository.update(user).await?;
        tracing::info!(service = %kind, email = %user.email, "Service disconnected");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::types::{RemoteAccount, RemoteTeam, TokenSet};
    use crate::repository::InMemoryUserRepository;
    use async_trait::async_trait;

    /// Provider stub with canned exchange and identity results.
    struct StubProvider {
        kind: ServiceKind,
        http_client: reqwest::Client,
        tokens: TokenSet,
        account: RemoteAccount,
        default_ttl: Option<Duration>,
    }

    impl StubProvider {
        fn new(kind: ServiceKind, access_token: &str, remote_id: &str, email: &str) -> Self {
            Self {
                kind,
                http_client: reqwest::Client::new(),
                tokens: TokenSet {
                    access_token: access_token.to_string(),
                    refresh_token: None,
                    expires_in: None,
                },
                account: RemoteAccount {
                    service_user_id: remote_id.to_string(),
                    email: email.to_string(),
                    display_name: None,
                    team: None,
                },
                default_ttl: None,
            }
        }
    }

    #[async_trait]
    impl ServiceProvider for StubProvider {
        fn kind(&self) -> ServiceKind {
            self.kind
        }
        fn scopes(&self) -> &'static [&'static str] {
            &["stub:read"]
        }
        fn auth_url(&self) -> &str {
            "https://example.com/oauth"
        }
        fn token_url(&self) -> &str {
            "https://example.com/oauth/token"
        }
        fn client_id(&self) -> &str {
            "stub-client"
        }
        fn client_secret(&self) -> &str {
            "stub-secret"
        }
        fn http_client(&self) -> &reqwest::Client {
            &self.http_client
        }
        fn default_token_ttl(&self) -> Option<Duration> {
            self.default_ttl
        }

        async fn exchange_code(&self, _code: &str, _redirect_uri: &str) -> IdentityResult<TokenSet> {
            Ok(self.tokens.clone())
        }

        async fn fetch_remote_account(&self, _access_token: &str) -> IdentityResult<RemoteAccount> {
            Ok(self.account.clone())
        }
    }

    fn linker(
        provider: StubProvider,
        repository: Arc<InMemoryUserRepository>,
    ) -> ServiceLinker<InMemoryUserRepository> {
        ServiceLinker::new(
            Arc::new(provider),
            repository,
            "http://localhost:3000/services/test/callback".to_string(),
        )
    }

    async fn seed_user(repo: &InMemoryUserRepository, email: &str) -> User {
        repo.create(User::new(email.to_string(), "Test".to_string()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_complete_links_matching_user() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let user = seed_user(&repo, "alice@example.com").await;

        let provider = StubProvider::new(ServiceKind::Github, "tok-1", "gh-42", "alice@example.com");
        let linker = linker(provider, Arc::clone(&repo));

        let linked = linker.complete(&user.id.to_string(), "code").await.unwrap();
        assert_eq!(linked.connected_services.len(), 1);

        let conn = linked.service_connection(ServiceKind::Github).unwrap();
        assert_eq!(conn.service_user_id, "gh-42");
        assert_eq!(conn.access_token, "tok-1");
        assert_eq!(conn.scopes, vec!["stub:read".to_string()]);
        assert!(conn.token_expiry.is_none());
    }

    #[tokio::test]
    async fn test_complete_twice_replaces_connection() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let user = seed_user(&repo, "alice@example.com").await;

        let first = StubProvider::new(ServiceKind::Github, "tok-1", "gh-42", "alice@example.com");
        linker(first, Arc::clone(&repo))
            .complete(&user.id.to_string(), "code")
            .await
            .unwrap();

        let second = StubProvider::new(ServiceKind::Github, "tok-2", "gh-42", "alice@example.com");
        let linked = linker(second, Arc::clone(&repo))
            .complete(&user.id.to_string(), "code")
            .await
            .unwrap();

        // Exactly one entry, carrying the second call's data
        assert_eq!(linked.connected_services.len(), 1);
        let conn = linked.service_connection(ServiceKind::Github).unwrap();
        assert_eq!(conn.access_token, "tok-2");
    }

    #[tokio::test]
    async fn test_complete_refuses_unknown_remote_email() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let user = seed_user(&repo, "alice@example.com").await;

        let provider =
            StubProvider::new(ServiceKind::Github, "tok-1", "gh-42", "stranger@example.com");
        let result = linker(provider, Arc::clone(&repo))
            .complete(&user.id.to_string(), "code")
            .await;

        assert!(matches!(
            result,
            Err(IdentityError::NoMatchingLocalAccount { .. })
        ));

        // No store write happened
        let stored = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.connected_services.is_empty());
    }

    #[tokio::test]
    async fn test_complete_refuses_mismatched_initiator() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let alice = seed_user(&repo, "alice@example.com").await;
        let bob = seed_user(&repo, "bob@example.com").await;

        // Bob initiates, but the remote account's email belongs to Alice
        let provider = StubProvider::new(ServiceKind::Github, "tok-1", "gh-42", "alice@example.com");
        let result = linker(provider, Arc::clone(&repo))
            .complete(&bob.id.to_string(), "code")
            .await;

        assert!(matches!(
            result,
            Err(IdentityError::NoMatchingLocalAccount { .. })
        ));

        let stored = repo.get_by_id(alice.id).await.unwrap().unwrap();
        assert!(stored.connected_services.is_empty());
    }

    #[tokio::test]
    async fn test_complete_rejects_garbage_state() {
        let repo = Arc::new(InMemoryUserRepository::new());
        seed_user(&repo, "alice@example.com").await;

        let provider = StubProvider::new(ServiceKind::Github, "tok-1", "gh-42", "alice@example.com");
        let result = linker(provider, Arc::clone(&repo))
            .complete("not-a-uuid", "code")
            .await;

        assert!(matches!(result, Err(IdentityError::OAuth(_))));
    }

    #[tokio::test]
    async fn test_expiry_from_provider_default_ttl() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let user = seed_user(&repo, "alice@example.com").await;

        let mut provider =
            StubProvider::new(ServiceKind::Figma, "tok-f", "fig-1", "alice@example.com");
        provider.default_ttl = Some(Duration::hours(1));

        let before = Utc::now();
        let linked = linker(provider, Arc::clone(&repo))
            .complete(&user.id.to_string(), "code")
            .await
            .unwrap();

        let expiry = linked
            .service_connection(ServiceKind::Figma)
            .unwrap()
            .token_expiry
            .unwrap();
        assert!(expiry >= before + Duration::minutes(59));
        assert!(expiry <= Utc::now() + Duration::hours(1));
    }

    #[tokio::test]
    async fn test_expiry_from_exchange_overrides_default() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let user = seed_user(&repo, "alice@example.com").await;

        let mut provider =
            StubProvider::new(ServiceKind::Slack, "tok-s", "sl-1", "alice@example.com");
        provider.default_ttl = Some(Duration::hours(24));
        provider.tokens.expires_in = Some(600);

        let linked = linker(provider, Arc::clone(&repo))
            .complete(&user.id.to_string(), "code")
            .await
            .unwrap();

        let expiry = linked
            .service_connection(ServiceKind::Slack)
            .unwrap()
            .token_expiry
            .unwrap();
        assert!(expiry <= Utc::now() + Duration::minutes(10));
    }

    #[tokio::test]
    async fn test_slack_team_recorded() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let user = seed_user(&repo, "alice@example.com").await;

        let mut provider =
            StubProvider::new(ServiceKind::Slack, "tok-s", "sl-1", "alice@example.com");
        provider.account.team = Some(RemoteTeam {
            id: "T12345".to_string(),
            name: Some("Acme".to_string()),
        });

        let linked = linker(provider, Arc::clone(&repo))
            .complete(&user.id.to_string(), "code")
            .await
            .unwrap();

        let conn = linked.service_connection(ServiceKind::Slack).unwrap();
        assert_eq!(conn.team_id.as_deref(), Some("T12345"));
        assert_eq!(conn.team_name.as_deref(), Some("Acme"));
    }

    #[tokio::test]
    async fn test_disconnect_removes_and_is_idempotent() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let user = seed_user(&repo, "alice@example.com").await;

        let provider = StubProvider::new(ServiceKind::Github, "tok-1", "gh-42", "alice@example.com");
        let linker = linker(provider, Arc::clone(&repo));
        linker.complete(&user.id.to_string(), "code").await.unwrap();

        let after = linker.disconnect(user.id).await.unwrap();
        assert!(!after.is_connected_to(ServiceKind::Github));

        // Disconnecting again is a no-op, not an error
        let again = linker.disconnect(user.id).await.unwrap();
        assert!(again.connected_services.is_empty());
    }

    #[tokio::test]
    async fn test_ensure_fresh() {
        let now = Utc::now();
        let mut connection = ServiceConnection {
            service: ServiceKind::Slack,
            service_user_id: "sl-1".to_string(),
            access_token: "tok".to_string(),
            refresh_token: None,
            token_expiry: Some(now + Duration::hours(1)),
            scopes: vec![],
            connected_at: now,
            team_id: None,
            team_name: None,
        };
        assert!(ensure_fresh(&connection).is_ok());

        connection.token_expiry = Some(now - Duration::seconds(1));
        assert!(matches!(
            ensure_fresh(&connection),
            Err(IdentityError::ServiceTokenExpired(ServiceKind::Slack))
        ));

        connection.token_expiry = None;
        assert!(ensure_fresh(&connection).is_ok());
    }
}
