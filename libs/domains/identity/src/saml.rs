//! Federated assertion verification.
//!
//! Accepts the base64-encoded SAML response posted back by the identity
//! provider, checks its structure, extracts the subject attributes and
//! resolves them to a local user record (create-if-absent).
//!
//! The check is structural only: the payload must decode and contain an
//! assertion with a subject section. Signature and trust-chain
//! verification are intentionally not performed; this mirrors the
//! contract of the system this service fronts, where the IdP connection
//! itself is trusted transport.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use core_config::{ConfigError, FromEnv, env_or_default, env_required};
use std::sync::Arc;

use crate::error::{IdentityError, IdentityResult};
use crate::models::User;
use crate::repository::UserRepository;

/// SAML endpoint configuration
#[derive(Clone, Debug)]
pub struct SamlConfig {
    /// The IdP's single-sign-on endpoint the login entry redirects to
    pub entry_point: String,
    pub issuer: String,
    pub callback_url: String,
}

impl FromEnv for SamlConfig {
    /// Reads `SAML_ENTRY_POINT` (required), `SAML_ISSUER` and
    /// `SAML_CALLBACK_URL` (defaulted).
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            entry_point: env_required("SAML_ENTRY_POINT")?,
            issuer: env_or_default("SAML_ISSUER", "extbridge"),
            callback_url: env_or_default(
                "SAML_CALLBACK_URL",
                "http://localhost:3000/auth/saml/callback",
            ),
        })
    }
}

/// Identity attributes extracted from a decoded assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAssertion {
    pub name_id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub department: Option<String>,
}

/// Text content of the first `<{tag}...>text</{tag}>` element.
fn tag_text<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);

    let start = xml.find(&open)?;
    let content_start = xml[start..].find('>')? + start + 1;
    let content_end = xml[content_start..].find(&close)? + content_start;
    let text = xml[content_start..content_end].trim();
    (!text.is_empty()).then_some(text)
}

/// Value of the first `<saml:Attribute Name="{name}">` element.
fn attribute_value<'a>(xml: &'a str, name: &str) -> Option<&'a str> {
    let marker = format!("Name=\"{}\"", name);
    let at = xml.find(&marker)?;
    tag_text(&xml[at..], "saml:AttributeValue")
}

/// Decode and structurally validate a base64 SAML response payload.
///
/// - absent payload → `AssertionMissing`
/// - undecodable payload, or one without an assertion-and-subject
///   section → `AssertionMalformed`
pub fn decode_assertion(payload: Option<&str>) -> IdentityResult<DecodedAssertion> {
    let payload = match payload {
        Some(p) if !p.trim().is_empty() => p,
        _ => return Err(IdentityError::AssertionMissing),
    };

    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|_| IdentityError::AssertionMalformed)?;
    let xml = String::from_utf8(bytes).map_err(|_| IdentityError::AssertionMalformed)?;

    if !xml.contains("<saml:Assertion") || !xml.contains("<saml:Subject") {
        return Err(IdentityError::AssertionMalformed);
    }

    let name_id = tag_text(&xml, "saml:NameID")
        .ok_or(IdentityError::AssertionMalformed)?
        .to_string();

    // NameID format is emailAddress for this IdP; fall back to the email
    // attribute for subjects carrying an opaque identifier.
    let email = if name_id.contains('@') {
        name_id.clone()
    } else {
        attribute_value(&xml, "email")
            .map(|s| s.to_string())
            .ok_or(IdentityError::AssertionMalformed)?
    };

    Ok(DecodedAssertion {
        name_id,
        email,
        first_name: attribute_value(&xml, "firstName").map(|s| s.to_string()),
        last_name: attribute_value(&xml, "lastName").map(|s| s.to_string()),
        department: attribute_value(&xml, "department").map(|s| s.to_string()),
    })
}

/// Verifies inbound assertions and resolves them to user records.
pub struct AssertionVerifier<R> {
    repository: Arc<R>,
    config: SamlConfig,
}

impl<R> Clone for AssertionVerifier<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            config: self.config.clone(),
        }
    }
}

impl<R: UserRepository> AssertionVerifier<R> {
    pub fn new(repository: Arc<R>, config: SamlConfig) -> Self {
        Self { repository, config }
    }

    pub fn config(&self) -> &SamlConfig {
        &self.config
    }

    /// Verify an assertion payload and resolve it to a user record.
    ///
    /// Unknown email → a new user is created with role `user` and the
    /// extracted attributes. Known email → only the federated subject
    /// identifier and last-login advance; profile attributes are
    /// insert-only and never overwritten on repeat login.
    ///
    /// At most one store write per call. Failures are surfaced to the
    /// caller as authentication failures and never retried here.
    pub async fn resolve(&self, payload: Option<&str>) -> IdentityResult<User> {
        let assertion = decode_assertion(payload)?;
        let now = Utc::now();

        match self.repository.get_by_email(&assertion.email).await? {
            Some(mut user) => {
                user.saml_id = Some(assertion.name_id);
                user.last_login_at = Some(now);
                user.updated_at = now;

                let user = self.repository.update(user).await?;
                tracing::info!(email = %user.email, "Existing user logged in via SSO");
                Ok(user)
            }
            None => {
                let name = match (&assertion.first_name, &assertion.last_name) {
                    (Some(first), Some(last)) => format!("{} {}", first, last),
                    (Some(first), None) => first.clone(),
                    (None, Some(last)) => last.clone(),
                    (None, None) => assertion
                        .email
                        .split('@')
                        .next()
                        .unwrap_or(&assertion.email)
                        .to_string(),
                };

                let mut user = User::new(assertion.email.clone(), name);
                user.display_name = match (&assertion.first_name, &assertion.last_name) {
                    (None, None) => None,
                    _ => Some(user.name.clone()),
                };
                user.saml_id = Some(assertion.name_id);
                user.department = assertion.department;
                user.last_login_at = Some(now);

                let user = self.repository.create(user).await?;
                tracing::info!(email = %user.email, "Created user from SSO login");
                Ok(user)
            }
        }
    }
}
