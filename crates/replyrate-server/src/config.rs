use anyhow::{Context, anyhow, bail};
use replyrate_egress::{Credentials, HasuraConfig, HttpClientConfig};
use replyrate_ui::{DashboardConfig, UiConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub ui: UiConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How requests to the aggregation backend are authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    AccessToken,
    AdminSecret,
    EmailPassword,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Explicit GraphQL endpoint; otherwise derived from `subdomain` + `region`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graphql_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Inferred from the secrets present in the environment when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<AuthMethod>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// 0 disables caching
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    // Secrets are only ever taken from the environment
    #[serde(skip)]
    pub access_token: Option<String>,

    #[serde(skip)]
    pub admin_secret: Option<String>,

    #[serde(skip)]
    pub password: Option<String>,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |s: &Option<String>| s.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("BackendConfig")
            .field("graphql_url", &self.graphql_url)
            .field("auth_url", &self.auth_url)
            .field("subdomain", &self.subdomain)
            .field("region", &self.region)
            .field("auth_method", &self.auth_method)
            .field("email", &self.email)
            .field("timeout_secs", &self.timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("access_token", &redact(&self.access_token))
            .field("admin_secret", &redact(&self.admin_secret))
            .field("password", &redact(&self.password))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of plain text
    #[serde(default)]
    pub json: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            graphql_url: None,
            auth_url: None,
            subdomain: None,
            region: None,
            auth_method: None,
            email: None,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_retries: default_max_retries(),
            cache_ttl_secs: default_cache_ttl_secs(),
            access_token: None,
            admin_secret: None,
            password: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl BackendConfig {
    pub fn effective_auth_method(&self) -> AuthMethod {
        if let Some(method) = self.auth_method {
            return method;
        }
        if self.admin_secret.is_some() {
            AuthMethod::AdminSecret
        } else if self.access_token.is_some() {
            AuthMethod::AccessToken
        } else if self.email.is_some() && self.password.is_some() {
            AuthMethod::EmailPassword
        } else {
            AuthMethod::None
        }
    }

    pub fn credentials(&self) -> anyhow::Result<Credentials> {
        let credentials = match self.effective_auth_method() {
            AuthMethod::None => Credentials::Anonymous,
            AuthMethod::AccessToken => Credentials::AccessToken(
                self.access_token
                    .clone()
                    .ok_or_else(|| anyhow!("REPLYRATE_ACCESS_TOKEN is not set"))?,
            ),
            AuthMethod::AdminSecret => Credentials::AdminSecret(
                self.admin_secret
                    .clone()
                    .ok_or_else(|| anyhow!("REPLYRATE_ADMIN_SECRET is not set"))?,
            ),
            AuthMethod::EmailPassword => Credentials::EmailPassword {
                email: self
                    .email
                    .clone()
                    .ok_or_else(|| anyhow!("backend.email (or REPLYRATE_EMAIL) is not set"))?,
                password: self
                    .password
                    .clone()
                    .ok_or_else(|| anyhow!("REPLYRATE_PASSWORD is not set"))?,
            },
        };
        Ok(credentials)
    }

    pub fn hasura_config(&self) -> anyhow::Result<HasuraConfig> {
        let credentials = self.credentials()?;
        let config = match (&self.graphql_url, &self.subdomain, &self.region) {
            (Some(url), _, _) => HasuraConfig::new(url.clone(), credentials),
            (None, Some(subdomain), Some(region)) => {
                HasuraConfig::nhost(subdomain, region, credentials)
            }
            _ => bail!("backend.graphql_url or backend.subdomain + backend.region must be set"),
        };
        let config = match &self.auth_url {
            Some(auth_url) => config.with_auth_url(auth_url.clone()),
            None => config,
        };

        Ok(config.with_client_config(HttpClientConfig {
            timeout_secs: self.timeout_secs,
            connect_timeout_secs: self.connect_timeout_secs,
            max_retries: self.max_retries,
            ..Default::default()
        }))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl ServerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents)
                .with_context(|| format!("invalid TOML in {}", path.display()))?
        } else {
            // Default to YAML
            serde_yaml::from_str(&contents)
                .with_context(|| format!("invalid YAML in {}", path.display()))?
        };

        Ok(config)
    }

    /// Merge environment variables into config (env vars take precedence)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("REPLYRATE_HOST") {
            self.ui.host = val;
        }

        if let Ok(val) = std::env::var("REPLYRATE_PORT") {
            match val.parse::<u16>() {
                Ok(port) => self.ui.port = port,
                Err(_) => eprintln!("Warning: Invalid REPLYRATE_PORT '{}', ignoring", val),
            }
        }

        if let Ok(val) = std::env::var("REPLYRATE_LOG_LEVEL") {
            self.logging.level = val;
        }

        if let Ok(val) = std::env::var("REPLYRATE_LOG_JSON")
            && let Ok(json) = val.parse::<bool>()
        {
            self.logging.json = json;
        }

        if let Ok(val) = std::env::var("REPLYRATE_GRAPHQL_URL") {
            self.backend.graphql_url = Some(val);
        }

        if let Ok(val) = std::env::var("REPLYRATE_AUTH_URL") {
            self.backend.auth_url = Some(val);
        }

        if let Ok(val) = std::env::var("REPLYRATE_EMAIL") {
            self.backend.email = Some(val);
        }

        // Secrets
        if let Ok(val) = std::env::var("REPLYRATE_ACCESS_TOKEN") {
            self.backend.access_token = Some(val);
        }

        if let Ok(val) = std::env::var("REPLYRATE_ADMIN_SECRET") {
            self.backend.admin_secret = Some(val);
        }

        if let Ok(val) = std::env::var("REPLYRATE_PASSWORD") {
            self.backend.password = Some(val);
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}
