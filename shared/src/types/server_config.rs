use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    /// Base address of the external payroll API, without a trailing slash.
    ///
    /// The `BACKEND_URL` environment variable takes priority over this field.
    #[serde(default = "default_backend_url")]
    pub base_url: String,
    /// Deadline applied to every outbound call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra attempts for GET requests that fail at the transport level.
    /// Non-GET requests are never retried.
    #[serde(default = "default_get_retries")]
    pub get_retries: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    pub web_dir: String,
    #[serde(default = "default_login_page")]
    pub login_page: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Name of the cookie that mirrors the bearer token for page navigation.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_protected_prefixes")]
    pub protected_prefixes: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    pub paths: PathsConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

impl ServerConfig {
    /// Full bind address, e.g. `"127.0.0.1:3000"`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl BackendConfig {
    /// Resolve the backend base URL with `BACKEND_URL` taking priority over
    /// the config file field. Trailing slashes are stripped so path templates
    /// can be appended directly.
    pub fn resolved_base_url(&self) -> String {
        self.base_url_with(std::env::var("BACKEND_URL").ok())
    }

    /// `override_url` wins when present and non-empty.
    pub fn base_url_with(&self, override_url: Option<String>) -> String {
        override_url
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.base_url.clone())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SessionConfig {
    /// True when `path` falls under one of the protected page groups.
    ///
    /// `/payroll` protects `/payroll` and `/payroll/...` but not `/payrolls`.
    pub fn is_protected(&self, path: &str) -> bool {
        self.protected_prefixes.iter().any(|prefix| {
            path == prefix
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            timeout_secs: default_timeout_secs(),
            get_retries: default_get_retries(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            protected_prefixes: default_protected_prefixes(),
        }
    }
}

// ---------------------------------------------------------------------------
// Serde defaults
// ---------------------------------------------------------------------------

pub fn default_bind() -> String {
    "127.0.0.1".to_string()
}

pub fn default_port() -> u16 {
    3000
}

pub fn default_max_connections() -> usize {
    1000
}

pub fn default_backend_url() -> String {
    "http://localhost:5000".to_string()
}

pub fn default_timeout_secs() -> u64 {
    30
}

pub fn default_get_retries() -> u32 {
    1
}

pub fn default_login_page() -> String {
    "/login".to_string()
}

pub fn default_cookie_name() -> String {
    "token".to_string()
}

pub fn default_protected_prefixes() -> Vec<String> {
    ["/dashboard", "/employees", "/payroll", "/payslips", "/analytics"]
        .iter()
        .map(|p| p.to_string())
        .collect()
}
