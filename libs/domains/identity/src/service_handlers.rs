//! Per-service link endpoints and resource pass-throughs.
//!
//! Connect and disconnect require a valid session. Callbacks are not
//! bearer-authenticated: the provider redirect carries the initiating
//! user's id in `state`, and the linker ties the result back to that
//! user. Resource endpoints run the full gate (session stage, then
//! service-linkage stage) plus a token-freshness check at call time.

use axum::{
    Extension, Router,
    extract::{Path, Query, Request, State},
    middleware::{self, Next},
    response::Redirect,
    routing::{get, post},
};
use axum_helpers::{ApiResponse, ValidatedJson};
use serde::Deserialize;
use std::collections::HashMap;
use validator::Validate;

use crate::clients::{FigmaClient, GithubClient, SlackClient};
use crate::error::{IdentityError, IdentityResult};
use crate::middleware::{AccessGate, authenticate, check_connection};
use crate::models::{ServiceConnection, ServiceKind, User};
use crate::oauth::{CallbackQuery, ServiceLinker, ensure_fresh};
use crate::repository::UserRepository;
use crate::session::Claims;

/// State for the service endpoints.
pub struct ServicesState<R> {
    pub linkers: HashMap<ServiceKind, ServiceLinker<R>>,
    pub gate: AccessGate<R>,
    pub dashboard_url: String,
}

impl<R> Clone for ServicesState<R> {
    fn clone(&self) -> Self {
        Self {
            linkers: self.linkers.clone(),
            gate: self.gate.clone(),
            dashboard_url: self.dashboard_url.clone(),
        }
    }
}

impl<R> ServicesState<R> {
    fn linker(&self, kind: ServiceKind) -> IdentityResult<&ServiceLinker<R>> {
        self.linkers
            .get(&kind)
            .ok_or_else(|| IdentityError::Internal(format!("No linker configured for {}", kind)))
    }
}

/// The stored connection for this service, verified fresh.
fn fresh_connection(user: &User, kind: ServiceKind) -> IdentityResult<&ServiceConnection> {
    let connection = user
        .service_connection(kind)
        .ok_or(IdentityError::NotLinked(kind))?;
    ensure_fresh(connection)?;
    Ok(connection)
}

/// Redirect the user agent to the provider's authorization endpoint.
///
/// GET /services/{service}/connect
async fn connect<R: UserRepository>(
    State(state): State<ServicesState<R>>,
    Path(kind): Path<ServiceKind>,
    Extension(claims): Extension<Claims>,
) -> IdentityResult<Redirect> {
    let url = state.linker(kind)?.authorize_redirect(claims.sub)?;
    tracing::info!(service = %kind, email = %claims.email, "Starting link flow");
    Ok(Redirect::to(&url))
}

/// Provider redirect target. Always answers with a redirect: the user
/// agent is mid-navigation, not making an API call. Linking never
/// touches the login session.
///
/// GET /services/{service}/callback
async fn callback<R: UserRepository>(
    State(state): State<ServicesState<R>>,
    Path(kind): Path<ServiceKind>,
    Query(query): Query<CallbackQuery>,
) -> Redirect {
    let dashboard = &state.dashboard_url;

    let (code, correlation) = match (query.code, query.state) {
        (Some(code), Some(correlation)) => (code, correlation),
        _ => {
            tracing::warn!(
                service = %kind,
                error = query.error.as_deref().unwrap_or("missing code or state"),
                "Authorization denied or malformed callback"
            );
            return Redirect::to(&format!("{}?error={}_auth_failed", dashboard, kind));
        }
    };

    let linker = match state.linker(kind) {
        Ok(linker) => linker,
        Err(e) => {
            tracing::error!(service = %kind, "Callback for unconfigured service: {}", e);
            return Redirect::to(&format!("{}?error={}_auth_failed", dashboard, kind));
        }
    };

    match linker.complete(&correlation, &code).await {
        Ok(user) => {
            tracing::info!(service = %kind, email = %user.email, "Link flow completed");
            Redirect::to(&format!("{}?message={}_connected", dashboard, kind))
        }
        Err(IdentityError::NoMatchingLocalAccount { service, email }) => {
            tracing::warn!(service = %service, email = %email, "Link refused: no matching local account");
            Redirect::to(&format!("{}?error={}_no_user", dashboard, kind))
        }
        Err(e) => {
            tracing::error!(service = %kind, "Link flow failed: {}", e);
            Redirect::to(&format!("{}?error={}_auth_failed", dashboard, kind))
        }
    }
}

/// Remove the service connection. Idempotent.
///
/// POST /services/{service}/disconnect
async fn disconnect<R: UserRepository>(
    State(state): State<ServicesState<R>>,
    Path(kind): Path<ServiceKind>,
    Extension(claims): Extension<Claims>,
) -> IdentityResult<ApiResponse> {
    state.linker(kind)?.disconnect(claims.sub).await?;
    Ok(ApiResponse::message(format!("{} disconnected", kind)))
}

// GitHub resources

/// GET /services/github/repositories
async fn github_repositories(Extension(user): Extension<User>) -> IdentityResult<ApiResponse> {
    let connection = fresh_connection(&user, ServiceKind::Github)?;
    let client = GithubClient::new(&connection.access_token)?;

    let repositories = client.repositories().await?;
    Ok(ApiResponse::success(
        serde_json::json!({ "repositories": repositories }),
    ))
}

/// GET /services/github/repositories/{owner}/{repo}
async fn github_repository_details(
    Extension(user): Extension<User>,
    Path((owner, repo)): Path<(String, String)>,
) -> IdentityResult<ApiResponse> {
    let connection = fresh_connection(&user, ServiceKind::Github)?;
    let client = GithubClient::new(&connection.access_token)?;

    let repository = client.repository(&owner, &repo).await?;
    let commits = client.commits(&owner, &repo).await?;
    let issues = client.issues(&owner, &repo).await?;

    Ok(ApiResponse::success(serde_json::json!({
        "repository": repository,
        "commits": commits,
        "issues": issues,
    })))
}

// Figma resources

#[derive(Debug, Deserialize)]
struct FigmaProjectsQuery {
    team_id: String,
}

/// GET /services/figma/projects?team_id=...
async fn figma_projects(
    Extension(user): Extension<User>,
    Query(query): Query<FigmaProjectsQuery>,
) -> IdentityResult<ApiResponse> {
    let connection = fresh_connection(&user, ServiceKind::Figma)?;
    let client = FigmaClient::new(&connection.access_token)?;

    let body = client.team_projects(&query.team_id).await?;
    Ok(ApiResponse::success(serde_json::json!({
        "projects": body.get("projects").cloned().unwrap_or_default(),
    })))
}

/// GET /services/figma/projects/{project_id}/files
async fn figma_project_files(
    Extension(user): Extension<User>,
    Path(project_id): Path<String>,
) -> IdentityResult<ApiResponse> {
    let connection = fresh_connection(&user, ServiceKind::Figma)?;
    let client = FigmaClient::new(&connection.access_token)?;

    let body = client.project_files(&project_id).await?;
    Ok(ApiResponse::success(serde_json::json!({
        "files": body.get("files").cloned().unwrap_or_default(),
    })))
}

/// GET /services/figma/files/{file_key}
async fn figma_file_details(
    Extension(user): Extension<User>,
    Path(file_key): Path<String>,
) -> IdentityResult<ApiResponse> {
    let connection = fresh_connection(&user, ServiceKind::Figma)?;
    let client = FigmaClient::new(&connection.access_token)?;

    let file = client.file(&file_key).await?;
    Ok(ApiResponse::success(serde_json::json!({ "file": file })))
}

// Slack resources

/// GET /services/slack/channels
async fn slack_channels(Extension(user): Extension<User>) -> IdentityResult<ApiResponse> {
    let connection = fresh_connection(&user, ServiceKind::Slack)?;
    let client = SlackClient::new(&connection.access_token)?;

    let body = client.channels().await?;
    Ok(ApiResponse::success(serde_json::json!({
        "channels": body.get("channels").cloned().unwrap_or_default(),
    })))
}

/// GET /services/slack/channels/{channel_id}/history
async fn slack_channel_history(
    Extension(user): Extension<User>,
    Path(channel_id): Path<String>,
) -> IdentityResult<ApiResponse> {
    let connection = fresh_connection(&user, ServiceKind::Slack)?;
    let client = SlackClient::new(&connection.access_token)?;

    let body = client.channel_history(&channel_id).await?;
    Ok(ApiResponse::success(serde_json::json!({
        "messages": body.get("messages").cloned().unwrap_or_default(),
    })))
}

#[derive(Debug, Deserialize, Validate)]
struct SendMessageRequest {
    #[validate(length(min = 1))]
    channel_id: String,
    #[validate(length(min = 1))]
    text: String,
    thread_ts: Option<String>,
}

/// POST /services/slack/messages
async fn slack_send_message(
    Extension(user): Extension<User>,
    ValidatedJson(input): ValidatedJson<SendMessageRequest>,
) -> IdentityResult<ApiResponse> {
    let connection = fresh_connection(&user, ServiceKind::Slack)?;
    let client = SlackClient::new(&connection.access_token)?;

    let result = client
        .post_message(&input.channel_id, &input.text, input.thread_ts.as_deref())
        .await?;
    Ok(ApiResponse::success(result))
}

/// GET /services/slack/team
async fn slack_team_info(Extension(user): Extension<User>) -> IdentityResult<ApiResponse> {
    let connection = fresh_connection(&user, ServiceKind::Slack)?;
    let client = SlackClient::new(&connection.access_token)?;

    let body = client.team_info().await?;
    Ok(ApiResponse::success(serde_json::json!({
        "team": body.get("team").cloned().unwrap_or_default(),
    })))
}

/// Routes for one service's resources, behind session + connection
/// stages. Layers run outermost-last: `authenticate` first, then
/// `check_connection`, then the handler.
fn resource_router<R: UserRepository + 'static>(
    gate: AccessGate<R>,
    kind: ServiceKind,
    routes: Router,
) -> Router {
    routes
        .route_layer(middleware::from_fn_with_state(
            gate.clone(),
            move |state: State<AccessGate<R>>, request: Request, next: Next| {
                check_connection(state, kind, request, next)
            },
        ))
        .route_layer(middleware::from_fn_with_state(gate, authenticate::<R>))
}

/// All service endpoints: generic link flow plus per-service resources.
pub fn services_router<R: UserRepository + 'static>(state: ServicesState<R>) -> Router {
    let link = Router::new()
        .route("/{service}/connect", get(connect::<R>))
        .route("/{service}/disconnect", post(disconnect::<R>))
        .route_layer(middleware::from_fn_with_state(
            state.gate.clone(),
            authenticate::<R>,
        ))
        .with_state(state.clone());

    // Not bearer-gated: identity is recovered from the correlation value
    let callbacks = Router::new()
        .route("/{service}/callback", get(callback::<R>).post(callback::<R>))
        .with_state(state.clone());

    let github = resource_router(
        state.gate.clone(),
        ServiceKind::Github,
        Router::new()
            .route("/github/repositories", get(github_repositories))
            .route(
                "/github/repositories/{owner}/{repo}",
                get(github_repository_details),
            ),
    );

    let figma = resource_router(
        state.gate.clone(),
        ServiceKind::Figma,
        Router::new()
            .route("/figma/projects", get(figma_projects))
            .route("/figma/projects/{project_id}/files", get(figma_project_files))
            .route("/figma/files/{file_key}", get(figma_file_details)),
    );

    let slack = resource_router(
        state.gate.clone(),
        ServiceKind::Slack,
        Router::new()
            .route("/slack/channels", get(slack_channels))
            .route("/slack/channels/{channel_id}/history", get(slack_channel_history))
            .route("/slack/messages", post(slack_send_message))
            .route("/slack/team", get(slack_team_info)),
    );

    link.merge(callbacks).merge(github).merge(figma).merge(slack)
}
