//! Bearer credential issuance and verification.
//!
//! Credentials are self-contained HS256 tokens; the server keeps no
//! session table, so validity is a pure function of signature and expiry.
//! A still-unexpired token cannot be revoked; the only revocation
//! mechanism is waiting out the expiry.

use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use core_config::{ConfigError, FromEnv, env_or_default};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{IdentityError, IdentityResult};
use crate::models::{Role, User};

/// Default session lifetime: 24 hours.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 86_400;

/// JWT configuration
#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_secs: i64,
}

impl FromEnv for JwtConfig {
    /// Reads `JWT_SECRET` (development fallback) and `JWT_TTL_SECS`
    /// (default 86400 = 24h).
    fn from_env() -> Result<Self, ConfigError> {
        let secret = env_or_default("JWT_SECRET", "extbridge_development_secret");
        let ttl_secs = env_or_default("JWT_TTL_SECS", &DEFAULT_SESSION_TTL_SECS.to_string())
            .parse()
            .map_err(|e| ConfigError::ParseError {
                key: "JWT_TTL_SECS".to_string(),
                details: format!("{}", e),
            })?;

        Ok(Self { secret, ttl_secs })
    }
}

/// Claims embedded in a bearer credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiration (unix seconds)
    pub exp: i64,
}

/// Issues and verifies bearer credentials.
#[derive(Clone)]
pub struct SessionIssuer {
    secret: String,
    ttl: Duration,
}

impl SessionIssuer {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            secret: config.secret.clone(),
            ttl: Duration::seconds(config.ttl_secs),
        }
    }

    /// Issue a credential for the given identity.
    ///
    /// Pure computation: issuing twice yields two independent,
    /// both-valid credentials.
    pub fn issue(&self, user: &User) -> IdentityResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        let header = Header {
            alg: Algorithm::HS256,
            ..Default::default()
        };

        encode(
            &header,
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| IdentityError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Verify a credential's signature and expiry; returns the claims.
    ///
    /// No store lookup happens here.
    pub fn verify(&self, token: &str) -> IdentityResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => IdentityError::CredentialExpired,
            _ => IdentityError::CredentialInvalid,
        })
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer ").map(|s| s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer_with_ttl(ttl_secs: i64) -> SessionIssuer {
        SessionIssuer::new(&JwtConfig {
            secret: "test-secret".to_string(),
            ttl_secs,
        })
    }

    fn test_user() -> User {
        let mut user = User::new("alice@example.com".to_string(), "Alice".to_string());
        user.role = Role::Admin;
        user
    }

    #[test]
    fn test_verify_issue_round_trip() {
        let issuer = issuer_with_ttl(DEFAULT_SESSION_TTL_SECS);
        let user = test_user();

        let token = issuer.issue(&user).unwrap();
        let claims = issuer.verify(&token).unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.role, Role::Admin);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_issue_twice_yields_two_valid_credentials() {
        let issuer = issuer_with_ttl(DEFAULT_SESSION_TTL_SECS);
        let user = test_user();

        let first = issuer.issue(&user).unwrap();
        let second = issuer.issue(&user).unwrap();

        assert!(issuer.verify(&first).is_ok());
        assert!(issuer.verify(&second).is_ok());
    }

    #[test]
    fn test_expired_credential() {
        let issuer = issuer_with_ttl(-10);
        let token = issuer.issue(&test_user()).unwrap();

        let result = issuer.verify(&token);
        assert!(matches!(result, Err(IdentityError::CredentialExpired)));
    }

    #[test]
    fn test_tampered_credential_is_invalid() {
        let issuer = issuer_with_ttl(DEFAULT_SESSION_TTL_SECS);
        let token = issuer.issue(&test_user()).unwrap();

        let mut tampered = token.clone();
        tampered.push('x');
        assert!(matches!(
            issuer.verify(&tampered),
            Err(IdentityError::CredentialInvalid)
        ));
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let issuer = issuer_with_ttl(DEFAULT_SESSION_TTL_SECS);
        let token = issuer.issue(&test_user()).unwrap();

        let other = SessionIssuer::new(&JwtConfig {
            secret: "other-secret".to_string(),
            ttl_secs: DEFAULT_SESSION_TTL_SECS,
        });
        assert!(matches!(
            other.verify(&token),
            Err(IdentityError::CredentialInvalid)
        ));
    }

    #[test]
    fn test_garbage_token_is_invalid() {
        let issuer = issuer_with_ttl(DEFAULT_SESSION_TTL_SECS);
        assert!(matches!(
            issuer.verify("not-a-jwt"),
            Err(IdentityError::CredentialInvalid)
        ));
    }

    #[test]
    fn test_extract_bearer() {
        let mut headers = HeaderMap::new();
        assert!(extract_bearer(&headers).is_none());

        headers.insert("authorization", "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(extract_bearer(&headers).as_deref(), Some("abc.def.ghi"));

        headers.insert("authorization", "Basic dXNlcg==".parse().unwrap());
        assert!(extract_bearer(&headers).is_none());
    }

    #[test]
    fn test_jwt_config_defaults() {
        temp_env::with_vars(
            [("JWT_SECRET", None::<&str>), ("JWT_TTL_SECS", None::<&str>)],
            || {
                let config = JwtConfig::from_env().unwrap();
                assert_eq!(config.secret, "extbridge_development_secret");
                assert_eq!(config.ttl_secs, DEFAULT_SESSION_TTL_SECS);
            },
        );
    }

    #[test]
    fn test_jwt_config_invalid_ttl() {
        temp_env::with_var("JWT_TTL_SECS", Some("soon"), || {
            assert!(JwtConfig::from_env().is_err());
        });
    }
}
