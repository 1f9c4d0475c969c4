use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{IdentityError, IdentityResult};
use crate::models::{User, UserFilter};

/// Repository trait for the credential store.
///
/// Writes are full-document replaces with no version check: two
/// concurrent writers to the same record race and the later write wins.
/// Callers that read-modify-write (connection upserts) inherit that
/// last-writer-wins behavior.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: User) -> IdentityResult<User>;

    /// Get a user by ID
    async fn get_by_id(&self, id: Uuid) -> IdentityResult<Option<User>>;

    /// Get a user by email (case-insensitive)
    async fn get_by_email(&self, email: &str) -> IdentityResult<Option<User>>;

    /// Get a user by federated subject identifier
    async fn get_by_saml_id(&self, saml_id: &str) -> IdentityResult<Option<User>>;

    /// Replace an existing user document
    async fn update(&self, user: User) -> IdentityResult<User>;

    /// Delete a user by ID
    async fn delete(&self, id: Uuid) -> IdentityResult<bool>;

    /// Check if an email already exists
    async fn email_exists(&self, email: &str) -> IdentityResult<bool>;

    /// List users with optional filters
    async fn list(&self, filter: UserFilter) -> IdentityResult<Vec<User>>;
}

/// In-memory implementation of UserRepository.
///
/// This is the store wired by default; persistent-store connection setup
/// lives outside this crate.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> IdentityResult<User> {
        let mut users = self.users.write().await;

        let email_exists = users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email));

        if email_exists {
            return Err(IdentityError::DuplicateEmail(user.email));
        }

        users.insert(user.id, user.clone());

        tracing::info!(user_id = %user.id, email = %user.email, "Created user");
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> IdentityResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> IdentityResult<Option<User>> {
        let users = self.users.read().await;
        let user = users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned();
        Ok(user)
    }

    async fn get_by_saml_id(&self, saml_id: &str) -> IdentityResult<Option<User>> {
        let users = self.users.read().await;
        let user = users
            .values()
            .find(|u| u.saml_id.as_deref() == Some(saml_id))
            .cloned();
        Ok(user)
    }

    async fn update(&self, user: User) -> IdentityResult<User> {
        let mut users = self.users.write().await;

        if !users.contains_key(&user.id) {
            return Err(IdentityError::NotFound(user.id));
        }

        let email_exists = users
            .values()
            .any(|u| u.id != user.id && u.email.eq_ignore_ascii_case(&user.email));

        if email_exists {
            return Err(IdentityError::DuplicateEmail(user.email));
        }

        users.insert(user.id, user.clone());

        tracing::debug!(user_id = %user.id, "Updated user");
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> IdentityResult<bool> {
        let mut users = self.users.write().await;

        if users.remove(&id).is_some() {
            tracing::info!(user_id = %id, "Deleted user");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn email_exists(&self, email: &str) -> IdentityResult<bool> {
        let users = self.users.read().await;
        Ok(users.values().any(|u| u.email.eq_ignore_ascii_case(email)))
    }

    async fn list(&self, filter: UserFilter) -> IdentityResult<Vec<User>> {
        let users = self.users.read().await;

        let mut result: Vec<User> = users
            .values()
            .filter(|u| {
                if let Some(ref email) = filter.email {
                    if !u.email.to_lowercase().contains(&email.to_lowercase()) {
                        return false;
                    }
                }
                if let Some(service) = filter.service {
                    if !u.is_connected_to(service) {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();

        // Newest first
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let result = result
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect();

        Ok(result)
    }
}
