use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gateway::{AppState, serve};
use shared::config::{LiveConfig, load_config};

/// Payroll gateway: serves the admin pages and proxies `/api` to the
/// payroll backend.
#[derive(Debug, Parser)]
#[command(name = "payroll-gateway", version)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, env = "PAYROLL_CONFIG", default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    let addr = config.server.addr();
    info!("Backend: {}", config.backend.resolved_base_url());

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let state = AppState::new(LiveConfig::new(config));

    #[cfg(unix)]
    tokio::spawn(reload_on_hangup(cli.config.clone(), state.config.clone()));

    tokio::select! {
        result = serve(listener, state) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }

    info!("Gateway stopped");
    Ok(())
}

/// Re-read the config file on SIGHUP. Backend, session and path settings
/// apply to the next request; the bind address and connection limit do not
/// change until restart.
#[cfg(unix)]
async fn reload_on_hangup(path: PathBuf, config: LiveConfig) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangups = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Config reload on SIGHUP unavailable: {}", e);
            return;
        }
    };

    while hangups.recv().await.is_some() {
        match load_config(&path) {
            Ok(new) => {
                config.reload(new).await;
                info!("Configuration reloaded from {}", path.display());
            }
            Err(e) => warn!("Keeping current configuration, reload failed: {}", e),
        }
    }
}
