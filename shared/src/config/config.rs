use std::fs;
use std::path::Path;

use tracing::{debug, error, info};

use crate::types::server_config::{AppConfig, ConfigError};

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    info!("Loading configuration from: {}", path.display());

    let contents = fs::read_to_string(path)?;
    debug!("Processing file: {}", path.display());

    parse_config(&contents)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    if contents.trim().is_empty() {
        error!("Configuration file is empty");
        return Err(ConfigError::InvalidConfig("empty file".into()));
    }

    let config: AppConfig = toml::from_str(contents)?;

    info!("Configuration loaded successfully");
    debug!("Config: {:?}", config);

    validate_config(&config)?;

    info!("Config validated");

    Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.paths.web_dir.is_empty() {
        return Err(ConfigError::InvalidConfig("web_dir cannot be empty".into()));
    }

    if !config.paths.login_page.starts_with('/') {
        return Err(ConfigError::InvalidConfig(
            "login_page must be an absolute path".into(),
        ));
    }

    check_backend_url(&config.backend.resolved_base_url())?;

    if config.backend.timeout_secs == 0 {
        return Err(ConfigError::InvalidConfig(
            "backend.timeout_secs must be greater than 0".into(),
        ));
    }

    if config.server.max_connections == 0 {
        return Err(ConfigError::InvalidConfig(
            "max_connections must be greater than 0".into(),
        ));
    }

    if config.session.cookie_name.is_empty() {
        return Err(ConfigError::InvalidConfig(
            "session.cookie_name cannot be empty".into(),
        ));
    }

    Ok(())
}

/// The outbound connector speaks plain HTTP only. Checked on the URL the
/// proxy will actually use, so a `BACKEND_URL` override is covered too.
fn check_backend_url(url: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") {
        return Err(ConfigError::InvalidConfig(format!(
            "backend URL {url:?} must start with http:// (backend.base_url or BACKEND_URL)"
        )));
    }
    Ok(())
}
