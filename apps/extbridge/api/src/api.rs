//! Router assembly: domain routers, documentation, and cross-cutting
//! middleware.

use axum::Router;
use axum::http::{HeaderValue, Method};
use axum_helpers::{health_router, not_found};
use domain_identity::{
    AccessGate, AssertionVerifier, AuthState, FigmaProvider, GithubProvider, InMemoryUserRepository,
    ServiceKind, ServiceLinker, ServicesState, SessionIssuer, SlackProvider, auth_router,
    services_router, users_router,
};
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::openapi::ApiDoc;

fn linker(
    provider: Arc<dyn domain_identity::oauth::ServiceProvider>,
    repository: &Arc<InMemoryUserRepository>,
    callback_url: &str,
) -> ServiceLinker<InMemoryUserRepository> {
    ServiceLinker::new(provider, Arc::clone(repository), callback_url.to_string())
}

/// Build the full application router.
pub fn routes(config: &Config, repository: Arc<InMemoryUserRepository>) -> io::Result<Router> {
    let issuer = SessionIssuer::new(&config.jwt);
    let gate = AccessGate::new(issuer.clone(), Arc::clone(&repository));

    let auth_state = AuthState {
        verifier: AssertionVerifier::new(Arc::clone(&repository), config.saml.clone()),
        issuer,
        gate: gate.clone(),
        dashboard_url: config.dashboard_url.clone(),
    };

    let providers = &config.providers;
    let mut linkers = HashMap::new();
    linkers.insert(
        ServiceKind::Github,
        linker(
            Arc::new(GithubProvider::new(
                providers.github.client_id.clone(),
                providers.github.client_secret.clone(),
            )),
            &repository,
            &providers.github.callback_url,
        ),
    );
    linkers.insert(
        ServiceKind::Figma,
        linker(
            Arc::new(FigmaProvider::new(
                providers.figma.client_id.clone(),
                providers.figma.client_secret.clone(),
            )),
            &repository,
            &providers.figma.callback_url,
        ),
    );
    linkers.insert(
        ServiceKind::Slack,
        linker(
            Arc::new(SlackProvider::new(
                providers.slack.client_id.clone(),
                providers.slack.client_secret.clone(),
            )),
            &repository,
            &providers.slack.callback_url,
        ),
    );

    let services_state = ServicesState {
        linkers,
        gate,
        dashboard_url: config.dashboard_url.clone(),
    };

    let router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/auth", auth_router(auth_state.clone()))
        .nest("/services", services_router(services_state))
        .nest("/users", users_router(auth_state))
        .merge(health_router(config.app))
        .fallback(not_found)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(cors_layer()?);

    Ok(router)
}

/// CORS from `CORS_ALLOWED_ORIGIN` (comma-separated; defaults to the
/// local dashboard origin).
fn cors_layer() -> io::Result<CorsLayer> {
    let origins_str =
        core_config::env_or_default("CORS_ALLOWED_ORIGIN", "http://localhost:3000");

    let origins: Vec<HeaderValue> = origins_str
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Invalid CORS_ALLOWED_ORIGIN value: {}", e),
            )
        })?;

    info!("CORS configured with allowed origins: {}", origins_str);

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        .max_age(Duration::from_secs(3600)))
}
