use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use hyper::{Method, Request, StatusCode, Uri};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid backend uri: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),

    #[error("failed to build backend request: {0}")]
    Request(#[from] http::Error),

    #[error("backend unreachable: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("failed to read backend body: {0}")]
    Body(#[from] hyper::Error),

    #[error("backend did not answer within {0:?}")]
    Timeout(Duration),
}

impl ProxyError {
    /// Failures where the backend may never have seen the request.
    fn is_retryable(&self) -> bool {
        matches!(self, ProxyError::Transport(_) | ProxyError::Timeout(_))
    }
}

/// A request ready to leave for the backend. Only `Authorization` is
/// carried over from the inbound request.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    /// Path plus optional re-encoded query, e.g. `/api/payroll/runs?month=5`.
    pub path_and_query: String,
    pub authorization: Option<HeaderValue>,
    pub body: Option<Bytes>,
}

/// Fully buffered backend answer.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Where and how outbound calls are made. Copied out of the live config per
/// request so no lock is held across the network call.
#[derive(Debug, Clone)]
pub struct BackendTarget {
    pub base_url: String,
    pub timeout: Duration,
    pub get_retries: u32,
}

/// Pooled HTTP/1 client for the payroll backend. Cheap to clone.
#[derive(Clone, Debug)]
pub struct BackendClient {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl BackendClient {
    pub fn new() -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }

    /// Send `req`, retrying only GETs that failed before any response
    /// arrived. Every other method goes out exactly once.
    pub async fn send(
        &self,
        target: &BackendTarget,
        req: &OutboundRequest,
    ) -> Result<BackendResponse, ProxyError> {
        let attempts = if req.method == Method::GET {
            1 + target.get_retries
        } else {
            1
        };

        let mut attempt = 1;
        loop {
            match self.send_once(target, req).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < attempts && e.is_retryable() => {
                    warn!(
                        "Backend {} {} failed (attempt {}/{}): {}",
                        req.method, req.path_and_query, attempt, attempts, e
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(
        &self,
        target: &BackendTarget,
        req: &OutboundRequest,
    ) -> Result<BackendResponse, ProxyError> {
        let uri: Uri = format!("{}{}", target.base_url, req.path_and_query).parse()?;

        let mut builder = Request::builder()
            .method(req.method.clone())
            .uri(uri)
            .header(CONTENT_TYPE, "application/json");
        if let Some(auth) = &req.authorization {
            builder = builder.header(AUTHORIZATION, auth.clone());
        }
        let request = builder.body(Full::new(req.body.clone().unwrap_or_default()))?;

        debug!("Calling backend: {} {}", req.method, req.path_and_query);

        let exchange = async {
            let response = self.client.request(request).await?;
            let (parts, body) = response.into_parts();
            let body = body.collect().await?.to_bytes();
            Ok::<_, ProxyError>(BackendResponse {
                status: parts.status,
                headers: parts.headers,
                body,
            })
        };

        let response = tokio::time::timeout(target.timeout, exchange)
            .await
            .map_err(|_| ProxyError::Timeout(target.timeout))??;

        debug!(
            "Backend answered {} for {} {} ({} bytes)",
            response.status,
            req.method,
            req.path_and_query,
            response.body.len()
        );

        Ok(response)
    }
}

impl Default for BackendClient {
    fn default() -> Self {
        Self::new()
    }
}
