//! Browser-facing payroll gateway: page guard plus a thin proxy to the
//! payroll backend.

use std::sync::Arc;

use anyhow::{Context, Result};
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tower::ServiceBuilder;
use tracing::{debug, error, info, warn};

use shared::config::LiveConfig;

pub mod handlers;
pub mod proxy;
pub mod tower_middle;

use handlers::http::routes::build_api_router;
use handlers::http::utils::fallback_internal_error;
use proxy::BackendClient;
use tower_middle::{Metrics, RequestLogLayer};

/// Shared by every connection task. All fields are cheap to clone.
#[derive(Clone, Debug)]
pub struct AppState {
    pub config: LiveConfig,
    pub backend: BackendClient,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: LiveConfig) -> Self {
        Self {
            config,
            backend: BackendClient::new(),
            metrics: Metrics::new(),
        }
    }
}

/// Accept connections until the listener fails. One task per connection,
/// at most `server.max_connections` at a time.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let router = Arc::new(build_api_router());
    let max_connections = state.config.read().await.server.max_connections;
    let permits = Arc::new(Semaphore::new(max_connections));

    info!(
        "Gateway listening on http://{} ({} routes, max {} connections)",
        listener.local_addr().context("Listener has no local address")?,
        router.len(),
        max_connections
    );

    loop {
        let permit = Arc::clone(&permits)
            .acquire_owned()
            .await
            .context("Connection semaphore closed")?;

        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                continue;
            }
        };
        debug!("Accepted connection from {}", peer);

        let io = TokioIo::new(stream);
        let state = state.clone();
        let router = Arc::clone(&router);

        tokio::task::spawn(async move {
            let _permit = permit;
            let metrics = state.metrics.clone();

            let dispatch = tower::service_fn(move |req| {
                let state = state.clone();
                let router = Arc::clone(&router);
                async move {
                    let response = match router.route(req, state).await {
                        Ok(response) => response,
                        Err(e) => {
                            error!("Handler error: {:#}", e);
                            fallback_internal_error()
                        }
                    };
                    Ok::<_, std::convert::Infallible>(response)
                }
            });

            let service = ServiceBuilder::new()
                .layer(RequestLogLayer::new(metrics))
                .service(dispatch);

            if let Err(err) = http1::Builder::new()
                .timer(TokioTimer::new())
                .serve_connection(io, TowerToHyperService::new(service))
                .await
            {
                debug!("Error serving connection from {}: {:?}", peer, err);
            }
        });
    }
}
