//! Identity & Connection Domain
//!
//! Everything between the identity provider and the linked services:
//! federated login, bearer sessions, per-service OAuth2 linking and the
//! access gate in front of protected operations.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐   ┌──────────────────┐
//! │ auth_handlers  │   │ service_handlers │  ← HTTP endpoints
//! └───────┬────────┘   └───────┬──────────┘
//!         │                    │
//! ┌───────▼───────┐   ┌────────▼─────────┐
//! │ saml, session │   │ oauth (linkers,  │  ← login + linking protocol
//! │               │   │ providers)       │
//! └───────┬───────┘   └────────┬─────────┘
//!         │                    │
//!         └────────┬───────────┘
//!                  │
//!         ┌────────▼────────┐
//!         │   repository    │  ← credential store (trait + in-memory)
//!         └────────┬────────┘
//!                  │
//!         ┌────────▼────────┐
//!         │     models      │  ← users, connections, DTOs
//!         └─────────────────┘
//! ```
//!
//! The [`middleware`] module is the access gate: session verification,
//! role check and service-linkage check as composable layers, applied in
//! that fixed order.

pub mod auth_handlers;
pub mod clients;
pub mod error;
pub mod middleware;
pub mod models;
pub mod oauth;
pub mod repository;
pub mod saml;
pub mod service_handlers;
pub mod session;

// Re-export commonly used types
pub use auth_handlers::{AuthState, auth_router, users_router};
pub use error::{IdentityError, IdentityResult};
pub use middleware::AccessGate;
pub use models::{ConnectionResponse, Role, ServiceConnection, ServiceKind, User, UserResponse};
pub use oauth::{FigmaProvider, GithubProvider, ServiceLinker, SlackProvider};
pub use repository::{InMemoryUserRepository, UserRepository};
pub use saml::{AssertionVerifier, SamlConfig};
pub use service_handlers::{ServicesState, services_router};
pub use session::{Claims, JwtConfig, SessionIssuer};
