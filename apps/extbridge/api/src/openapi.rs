use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ExtBridge API",
        description = "SSO login and external service linking for GitHub, Figma and Slack"
    ),
    components(schemas(
        domain_identity::Role,
        domain_identity::ServiceKind,
        domain_identity::UserResponse,
        domain_identity::ConnectionResponse,
    ))
)]
pub struct ApiDoc;
