//! Federated login endpoints and session introspection.

use axum::{
    Extension, Router,
    extract::{Form, Query, State},
    middleware,
    response::Redirect,
    routing::{get, post},
};
use axum_helpers::ApiResponse;
use serde::Deserialize;

use crate::error::IdentityResult;
use crate::middleware::{AccessGate, authenticate, check_role, load_user};
use crate::models::{Role, UserFilter, UserResponse};
use crate::repository::UserRepository;
use crate::saml::AssertionVerifier;
use crate::session::{Claims, SessionIssuer};

/// State for the auth endpoints.
pub struct AuthState<R> {
    pub verifier: AssertionVerifier<R>,
    pub issuer: SessionIssuer,
    pub gate: AccessGate<R>,
    /// Where the browser lands after login, with the token attached
    pub dashboard_url: String,
}

impl<R> Clone for AuthState<R> {
    fn clone(&self) -> Self {
        Self {
            verifier: self.verifier.clone(),
            issuer: self.issuer.clone(),
            gate: self.gate.clone(),
            dashboard_url: self.dashboard_url.clone(),
        }
    }
}

/// The IdP posts the assertion back as a form field.
#[derive(Debug, Deserialize)]
struct SamlCallbackForm {
    #[serde(rename = "SAMLResponse")]
    saml_response: Option<String>,
}

/// Start SP-initiated login: redirect the user agent to the IdP.
///
/// GET /auth/saml
async fn initiate_login<R: UserRepository>(State(state): State<AuthState<R>>) -> Redirect {
    tracing::info!("Starting SSO login");
    Redirect::to(&state.verifier.config().entry_point)
}

/// IdP callback: verify the assertion, resolve the user, issue a bearer
/// credential and hand it to the dashboard. Linking flows never pass
/// through here; this is the only place credentials are issued.
///
/// POST /auth/saml/callback
async fn saml_callback<R: UserRepository>(
    State(state): State<AuthState<R>>,
    Form(form): Form<SamlCallbackForm>,
) -> IdentityResult<Redirect> {
    let user = state.verifier.resolve(form.saml_response.as_deref()).await?;
    let token = state.issuer.issue(&user)?;

    tracing::info!(email = %user.email, "User authenticated");
    Ok(Redirect::to(&format!(
        "{}?token={}",
        state.dashboard_url,
        urlencoding::encode(&token)
    )))
}

/// Echo the verified claims.
///
/// GET /auth/verify
async fn verify_session(Extension(claims): Extension<Claims>) -> ApiResponse {
    ApiResponse::success_with_message(
        "Authenticated",
        serde_json::json!({
            "id": claims.sub,
            "email": claims.email,
            "role": claims.role,
        }),
    )
}

/// The full profile behind the claims, with connection summaries.
///
/// GET /auth/me
async fn me<R: UserRepository>(
    State(state): State<AuthState<R>>,
    Extension(claims): Extension<Claims>,
) -> IdentityResult<ApiResponse<UserResponse>> {
    let user = load_user(&state.gate, &claims).await?;
    Ok(ApiResponse::success(user.into()))
}

/// Admin-only user listing.
///
/// GET /users
async fn list_users<R: UserRepository>(
    State(state): State<AuthState<R>>,
    Query(filter): Query<UserFilter>,
) -> IdentityResult<ApiResponse<Vec<UserResponse>>> {
    let users = state.gate.repository().list(filter).await?;
    Ok(ApiResponse::success(
        users.into_iter().map(UserResponse::from).collect(),
    ))
}

/// Auth router: login entry and callback are open, introspection is
/// session-gated.
pub fn auth_router<R: UserRepository + 'static>(state: AuthState<R>) -> Router {
    let open = Router::new()
        .route("/saml", get(initiate_login::<R>))
        .route("/saml/callback", post(saml_callback::<R>))
        .with_state(state.clone());

    let protected = Router::new()
        .route("/verify", get(verify_session))
        .route("/me", get(me::<R>))
        .route_layer(middleware::from_fn_with_state(
            state.gate.clone(),
            authenticate::<R>,
        ))
        .with_state(state);

    open.merge(protected)
}

/// Admin router (session stage, then role stage).
pub fn users_router<R: UserRepository + 'static>(state: AuthState<R>) -> Router {
    Router::new()
        .route("/", get(list_users::<R>))
        .route_layer(middleware::from_fn(
            |request: axum::extract::Request, next: middleware::Next| {
                check_role(&[Role::Admin], request, next)
            },
        ))
        .route_layer(middleware::from_fn_with_state(
            state.gate.clone(),
            authenticate::<R>,
        ))
        .with_state(state)
}
