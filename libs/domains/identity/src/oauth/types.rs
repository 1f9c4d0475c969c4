use serde::{Deserialize, Serialize};

/// Credentials returned by an authorization-code exchange.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Lifetime in seconds, when the provider reports one
    pub expires_in: Option<u64>,
}

/// Slack workspace attached to a remote account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTeam {
    pub id: String,
    pub name: Option<String>,
}

/// The remote service's answer to "who am I".
#[derive(Debug, Clone)]
pub struct RemoteAccount {
    pub service_user_id: String,
    /// Email on the remote service; the account matching key
    pub email: String,
    pub display_name: Option<String>,
    pub team: Option<RemoteTeam>,
}

/// Query parameters on the provider redirect back to us.
///
/// `code`/`state` are absent when the user denied the authorization
/// request; the provider sends `error` instead.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    /// Correlation value carried through the round trip (the initiating
    /// user's id)
    pub state: Option<String>,
    pub error: Option<String>,
}
