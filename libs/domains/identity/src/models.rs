use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// User roles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// The closed set of external services a user can link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Github,
    Figma,
    Slack,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 3] = [ServiceKind::Github, ServiceKind::Figma, ServiceKind::Slack];
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceKind::Github => write!(f, "github"),
            ServiceKind::Figma => write!(f, "figma"),
            ServiceKind::Slack => write!(f, "slack"),
        }
    }
}

impl std::str::FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "github" => Ok(ServiceKind::Github),
            "figma" => Ok(ServiceKind::Figma),
            "slack" => Ok(ServiceKind::Slack),
            _ => Err(format!("Unknown service: {}", s)),
        }
    }
}

/// One linked external service account, embedded on the user record.
///
/// At most one entry per service kind; linking again replaces the entry
/// in place (see [`User::upsert_connection`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConnection {
    pub service: ServiceKind,
    /// Account identifier on the remote service
    pub service_user_id: String,
    /// Access credential (never exposed in API responses)
    #[serde(skip_serializing, default)]
    pub access_token: String,
    #[serde(skip_serializing, default)]
    pub refresh_token: Option<String>,
    /// When the access credential expires, if the service bounds it
    pub token_expiry: Option<DateTime<Utc>>,
    /// Permission scopes granted at link time
    pub scopes: Vec<String>,
    pub connected_at: DateTime<Utc>,
    /// Slack workspace identifier (absent for other services)
    pub team_id: Option<String>,
    pub team_name: Option<String>,
}

impl ServiceConnection {
    /// Whether the stored access credential is past its expiry.
    ///
    /// Connections without an expiry (GitHub) never expire here.
    pub fn is_token_expired(&self, now: DateTime<Utc>) -> bool {
        self.token_expiry.is_some_and(|expiry| expiry <= now)
    }
}

/// User entity: one record per distinct federated subject.
///
/// Email is the canonical join key between the federated identity and the
/// local record; at most one user per email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Primary email (unique, compared case-insensitively)
    pub email: String,
    pub name: String,
    pub display_name: Option<String>,
    /// Federated subject identifier; absent for synthetic/legacy accounts
    pub saml_id: Option<String>,
    pub role: Role,
    pub department: Option<String>,
    /// Linked external services, at most one entry per kind
    pub connected_services: Vec<ServiceConnection>,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with role `user` and no linked services.
    pub fn new(email: String, name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            email,
            name,
            display_name: None,
            saml_id: None,
            role: Role::User,
            department: None,
            connected_services: Vec::new(),
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this user has a connection of the given kind.
    pub fn is_connected_to(&self, kind: ServiceKind) -> bool {
        self.connected_services.iter().any(|c| c.service == kind)
    }

    /// The connection entry for the given kind, if linked.
    pub fn service_connection(&self, kind: ServiceKind) -> Option<&ServiceConnection> {
        self.connected_services.iter().find(|c| c.service == kind)
    }

    /// Keyed upsert: replace the existing entry for the connection's
    /// service kind in place, or append if none exists. Never duplicates.
    pub fn upsert_connection(&mut self, connection: ServiceConnection) {
        match self
            .connected_services
            .iter()
            .position(|c| c.service == connection.service)
        {
            Some(index) => self.connected_services[index] = connection,
            None => self.connected_services.push(connection),
        }
    }

    /// Remove the entry for the given kind. Returns whether an entry was
    /// removed; removing an absent entry is a no-op, not an error.
    pub fn remove_connection(&mut self, kind: ServiceKind) -> bool {
        let before = self.connected_services.len();
        self.connected_services.retain(|c| c.service != kind);
        self.connected_services.len() != before
    }
}

/// Connection summary exposed by the API (no credentials).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConnectionResponse {
    pub service: ServiceKind,
    pub service_user_id: String,
    pub scopes: Vec<String>,
    pub connected_at: DateTime<Utc>,
    pub token_expiry: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
}

impl From<&ServiceConnection> for ConnectionResponse {
    fn from(connection: &ServiceConnection) -> Self {
        Self {
            service: connection.service,
            service_user_id: connection.service_user_id.clone(),
            scopes: connection.scopes.clone(),
            connected_at: connection.connected_at,
            token_expiry: connection.token_expiry,
            team_id: connection.team_id.clone(),
            team_name: connection.team_name.clone(),
        }
    }
}

/// User profile exposed by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub department: Option<String>,
    pub connected_services: Vec<ConnectionResponse>,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            display_name: user.display_name,
            role: user.role,
            department: user.department,
            connected_services: user.connected_services.iter().map(|c| c.into()).collect(),
            is_active: user.is_active,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

/// Query filters for the admin user listing
#[derive(Debug, Clone, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct UserFilter {
    /// Substring match on email
    pub email: Option<String>,
    /// Only users with this service linked
    pub service: Option<ServiceKind>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

impl Default for UserFilter {
    fn default() -> Self {
        Self {
            email: None,
            service: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

fn default_limit() -> usize {
    50
}
