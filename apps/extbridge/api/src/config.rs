use core_config::{AppInfo, ConfigError, FromEnv, app_info, env_or_default, env_required, server::ServerConfig};
use domain_identity::{JwtConfig, SamlConfig, ServiceKind};

// Re-export Environment for use in other modules
pub use core_config::Environment;

/// OAuth client credentials for one external service.
#[derive(Clone, Debug)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
}

impl ProviderCredentials {
    /// Reads `{PREFIX}_CLIENT_ID`, `{PREFIX}_CLIENT_SECRET` (required)
    /// and `{PREFIX}_CALLBACK_URL` (defaulted per service).
    fn from_env(kind: ServiceKind) -> Result<Self, ConfigError> {
        let prefix = kind.to_string().to_uppercase();
        let default_callback = format!("http://localhost:3000/services/{}/callback", kind);

        Ok(Self {
            client_id: env_required(&format!("{}_CLIENT_ID", prefix))?,
            client_secret: env_required(&format!("{}_CLIENT_SECRET", prefix))?,
            callback_url: env_or_default(&format!("{}_CALLBACK_URL", prefix), &default_callback),
        })
    }
}

/// Per-service OAuth credentials, injected explicitly into each linker.
#[derive(Clone, Debug)]
pub struct ProvidersConfig {
    pub github: ProviderCredentials,
    pub figma: ProviderCredentials,
    pub slack: ProviderCredentials,
}

impl FromEnv for ProvidersConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            github: ProviderCredentials::from_env(ServiceKind::Github)?,
            figma: ProviderCredentials::from_env(ServiceKind::Figma)?,
            slack: ProviderCredentials::from_env(ServiceKind::Slack)?,
        })
    }
}

/// Application configuration, composed from shared config components.
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub server: ServerConfig,
    pub environment: Environment,
    pub jwt: JwtConfig,
    pub saml: SamlConfig,
    pub providers: ProvidersConfig,
    /// Where browser flows land after login/linking
    pub dashboard_url: String,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let server = ServerConfig::from_env()?;
        let jwt = JwtConfig::from_env()?;
        let saml = SamlConfig::from_env()?;
        let providers = ProvidersConfig::from_env()?;
        let dashboard_url = env_or_default("DASHBOARD_URL", "http://localhost:3000/dashboard");

        Ok(Self {
            app: app_info!(),
            server,
            environment,
            jwt,
            saml,
            providers,
            dashboard_url,
        })
    }
}
