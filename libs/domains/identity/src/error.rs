use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_helpers::envelope::error_body;
use thiserror::Error;
use uuid::Uuid;

use crate::models::ServiceKind;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("SAML response missing from callback")]
    AssertionMissing,

    #[error("malformed SAML assertion")]
    AssertionMalformed,

    #[error("no session token presented")]
    CredentialMissing,

    #[error("invalid session token")]
    CredentialInvalid,

    #[error("expired session token")]
    CredentialExpired,

    #[error("insufficient role")]
    Forbidden,

    #[error("{0} is not connected")]
    NotLinked(ServiceKind),

    #[error("no local account matches the {service} account email '{email}'")]
    NoMatchingLocalAccount { service: ServiceKind, email: String },

    #[error("{0} access token has expired")]
    ServiceTokenExpired(ServiceKind),

    #[error("user not found: {0}")]
    NotFound(Uuid),

    #[error("user with email '{0}' already exists")]
    DuplicateEmail(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("OAuth exchange failed: {0}")]
    OAuth(String),

    #[error("upstream service error: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type IdentityResult<T> = Result<T, IdentityError>;

impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            IdentityError::AssertionMissing | IdentityError::AssertionMalformed => {
                tracing::warn!("SAML verification failed: {}", self);
                (StatusCode::UNAUTHORIZED, "Authentication failed".to_string())
            }
            IdentityError::CredentialMissing => (
                StatusCode::UNAUTHORIZED,
                "Authentication required".to_string(),
            ),
            IdentityError::CredentialInvalid | IdentityError::CredentialExpired => (
                StatusCode::FORBIDDEN,
                "Invalid or expired token".to_string(),
            ),
            IdentityError::Forbidden => (
                StatusCode::FORBIDDEN,
                "You do not have permission to access this resource".to_string(),
            ),
            IdentityError::NotLinked(kind) => (
                StatusCode::FORBIDDEN,
                format!("{} is not connected to this account", kind),
            ),
            IdentityError::NoMatchingLocalAccount { service, email } => {
                tracing::warn!(service = %service, email = %email, "Link refused: no matching local account");
                (
                    StatusCode::FORBIDDEN,
                    "No matching account found. Sign in through the identity provider before linking services.".to_string(),
                )
            }
            IdentityError::ServiceTokenExpired(kind) => (
                StatusCode::UNAUTHORIZED,
                format!("{} access token has expired. Please reconnect the service.", kind),
            ),
            IdentityError::NotFound(id) => {
                tracing::warn!(user_id = %id, "User not found");
                (StatusCode::NOT_FOUND, "User not found".to_string())
            }
            IdentityError::DuplicateEmail(email) => (
                StatusCode::CONFLICT,
                format!("User with email '{}' already exists", email),
            ),
            IdentityError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            IdentityError::OAuth(msg) => {
                tracing::error!("OAuth error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Service authorization failed".to_string(),
                )
            }
            IdentityError::Upstream(msg) => {
                tracing::error!("Upstream error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Upstream service error".to_string(),
                )
            }
            IdentityError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        error_body(status, message)
    }
}
