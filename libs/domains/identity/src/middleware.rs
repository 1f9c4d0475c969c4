//! The access gate: the ordered session → role → service-linkage
//! pipeline every protected operation passes through.
//!
//! Each stage is an independent layer an endpoint opts into; the
//! pipeline short-circuits on the first failing stage, so a request
//! with a bad credential always fails with the session stage's error
//! even when it would also fail later stages.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::error::{IdentityError, IdentityResult};
use crate::models::{Role, ServiceKind};
use crate::repository::UserRepository;
use crate::session::{Claims, SessionIssuer, extract_bearer};

/// Shared state for the gate stages.
pub struct AccessGate<R> {
    issuer: SessionIssuer,
    repository: Arc<R>,
}

impl<R> Clone for AccessGate<R> {
    fn clone(&self) -> Self {
        Self {
            issuer: self.issuer.clone(),
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R> AccessGate<R> {
    pub fn new(issuer: SessionIssuer, repository: Arc<R>) -> Self {
        Self { issuer, repository }
    }

    pub fn issuer(&self) -> &SessionIssuer {
        &self.issuer
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }
}

/// Stage 1: extract and verify the bearer credential.
///
/// No credential → 401; invalid or expired → 403. On success the
/// verified claims are inserted into request extensions for the later
/// stages and the handler.
pub async fn authenticate<R: UserRepository>(
    State(gate): State<AccessGate<R>>,
    mut request: Request,
    next: Next,
) -> Result<Response, IdentityError> {
    let token =
        extract_bearer(request.headers()).ok_or(IdentityError::CredentialMissing)?;

    let claims = gate.issuer.verify(&token)?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Stage 2: the verified role must be in the declared set; `admin`
/// implicitly satisfies any set. Requires stage 1 to have run.
pub async fn check_role(
    allowed: &'static [Role],
    request: Request,
    next: Next,
) -> Result<Response, IdentityError> {
    let claims = request
        .extensions()
        .get::<Claims>()
        .ok_or(IdentityError::CredentialMissing)?;

    if claims.role == Role::Admin || allowed.contains(&claims.role) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(email = %claims.email, role = %claims.role, "Access denied: insufficient role");
        Err(IdentityError::Forbidden)
    }
}

/// Stage 3: the full user record must carry a connection of the
/// required kind. Presence only; token freshness is checked at call
/// time by the operation using the token.
///
/// The loaded record is inserted into request extensions so handlers
/// don't re-read the store.
pub async fn check_connection<R: UserRepository>(
    State(gate): State<AccessGate<R>>,
    kind: ServiceKind,
    mut request: Request,
    next: Next,
) -> Result<Response, IdentityError> {
    let claims = request
        .extensions()
        .get::<Claims>()
        .cloned()
        .ok_or(IdentityError::CredentialMissing)?;

    let user = gate
        .repository
        .get_by_id(claims.sub)
        .await?
        .ok_or(IdentityError::NotFound(claims.sub))?;

    if !user.is_connected_to(kind) {
        return Err(IdentityError::NotLinked(kind));
    }

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Load the full user record for verified claims (used by handlers that
/// need more than the embedded claims but aren't scoped to a service).
pub async fn load_user<R: UserRepository>(
    gate: &AccessGate<R>,
    claims: &Claims,
) -> IdentityResult<crate::models::User> {
    gate.repository
        .get_by_id(claims.sub)
        .await?
        .ok_or(IdentityError::NotFound(claims.sub))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use crate::repository::MockUserRepository;
    use crate::session::JwtConfig;
    use axum::{Router, body::Body, http::StatusCode, middleware, routing::get};
    use tower::ServiceExt;

    fn issuer() -> SessionIssuer {
        SessionIssuer::new(&JwtConfig {
            secret: "gate-test-secret".to_string(),
            ttl_secs: 3600,
        })
    }

    fn gate_with(repo: MockUserRepository) -> AccessGate<MockUserRepository> {
        AccessGate::new(issuer(), Arc::new(repo))
    }

    async fn ok_handler() -> &'static str {
        "ok"
    }

    fn request(token: Option<&str>) -> axum::http::Request<Body> {
        let mut builder = axum::http::Request::builder().uri("/protected");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn session_router(gate: AccessGate<MockUserRepository>) -> Router {
        Router::new()
            .route("/protected", get(ok_handler))
            .route_layer(middleware::from_fn_with_state(
                gate,
                authenticate::<MockUserRepository>,
            ))
    }

    #[tokio::test]
    async fn test_missing_credential_is_401() {
        let app = session_router(gate_with(MockUserRepository::new()));
        let response = app.oneshot(request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_invalid_credential_is_403() {
        let app = session_router(gate_with(MockUserRepository::new()));
        let response = app.oneshot(request(Some("garbage"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_valid_credential_passes() {
        let gate = gate_with(MockUserRepository::new());
        let token = gate
            .issuer()
            .issue(&User::new("a@example.com".to_string(), "A".to_string()))
            .unwrap();

        let app = session_router(gate);
        let response = app.oneshot(request(Some(&token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    fn admin_router(gate: AccessGate<MockUserRepository>) -> Router {
        Router::new()
            .route("/protected", get(ok_handler))
            .route_layer(middleware::from_fn(|request: Request, next: Next| {
                check_role(&[Role::Admin], request, next)
            }))
            .route_layer(middleware::from_fn_with_state(
                gate,
                authenticate::<MockUserRepository>,
            ))
    }

    #[tokio::test]
    async fn test_role_stage_rejects_plain_user() {
        let gate = gate_with(MockUserRepository::new());
        let token = gate
            .issuer()
            .issue(&User::new("a@example.com".to_string(), "A".to_string()))
            .unwrap();

        let app = admin_router(gate);
        let response = app.oneshot(request(Some(&token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_role_stage_admits_admin() {
        let gate = gate_with(MockUserRepository::new());
        let mut admin = User::new("root@example.com".to_string(), "Root".to_string());
        admin.role = Role::Admin;
        let token = gate.issuer().issue(&admin).unwrap();

        let app = admin_router(gate);
        let response = app.oneshot(request(Some(&token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_credential_fails_at_session_stage_not_role_stage() {
        // Invalid token + a route that would also fail the role stage:
        // the session stage's message must win.
        let app = admin_router(gate_with(MockUserRepository::new()));
        let response = app.oneshot(request(Some("garbage"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "Invalid or expired token");
    }

    fn connection_router(
        gate: AccessGate<MockUserRepository>,
        kind: ServiceKind,
    ) -> Router {
        Router::new()
            .route("/protected", get(ok_handler))
            .route_layer(middleware::from_fn_with_state(
                gate.clone(),
                move |state: State<AccessGate<MockUserRepository>>, request: Request, next: Next| {
                    check_connection(state, kind, request, next)
                },
            ))
            .route_layer(middleware::from_fn_with_state(
                gate,
                authenticate::<MockUserRepository>,
            ))
    }

    #[tokio::test]
    async fn test_connection_stage_rejects_unlinked_user() {
        let user = User::new("a@example.com".to_string(), "A".to_string());
        let user_id = user.id;
        let fetched = user.clone();

        let mut repo = MockUserRepository::new();
        repo.expect_get_by_id()
            .withf(move |id| *id == user_id)
            .returning(move |_| Ok(Some(fetched.clone())));

        let gate = gate_with(repo);
        let token = gate.issuer().issue(&user).unwrap();

        let app = connection_router(gate, ServiceKind::Github);
        let response = app.oneshot(request(Some(&token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(
            json["message"].as_str().unwrap().contains("github"),
            "service stage message should name the service"
        );
    }

    #[tokio::test]
    async fn test_connection_stage_admits_linked_user() {
        let mut user = User::new("a@example.com".to_string(), "A".to_string());
        user.upsert_connection(crate::models::ServiceConnection {
            service: ServiceKind::Github,
            service_user_id: "gh-1".to_string(),
            access_token: "t".to_string(),
            refresh_token: None,
            token_expiry: None,
            scopes: vec![],
            connected_at: chrono::Utc::now(),
            team_id: None,
            team_name: None,
        });
        let fetched = user.clone();

        let mut repo = MockUserRepository::new();
        repo.expect_get_by_id()
            .returning(move |_| Ok(Some(fetched.clone())));

        let gate = gate_with(repo);
        let token = gate.issuer().issue(&user).unwrap();

        let app = connection_router(gate, ServiceKind::Github);
        let response = app.oneshot(request(Some(&token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
