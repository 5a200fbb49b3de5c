use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use hyper::{Request, Response, StatusCode};
use tower::{Layer, Service};
use tracing::info;

use crate::tower_middle::metrics::Metrics;

/// Logs method, path, status and latency for every request and feeds the
/// shared counters.
#[derive(Clone)]
pub struct RequestLogLayer {
    metrics: Metrics,
}

impl RequestLogLayer {
    pub fn new(metrics: Metrics) -> Self {
        Self { metrics }
    }
}

impl<S> Layer<S> for RequestLogLayer {
    type Service = RequestLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogService {
            inner,
            metrics: self.metrics.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RequestLogService<S> {
    inner: S,
    metrics: Metrics,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestLogService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let metrics = self.metrics.clone();
        let mut inner = self.inner.clone();

        // Query strings can carry search terms; log the path only.
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let in_flight = metrics.request_start();
        let start = Instant::now();

        Box::pin(async move {
            let result = inner.call(req).await;
            let elapsed = start.elapsed();
            drop(in_flight);
            metrics.record_latency(elapsed).await;

            match &result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() {
                        metrics.record_server_error();
                    }
                    if status == StatusCode::UNAUTHORIZED {
                        metrics.record_unauthorized();
                    }
                    info!(
                        "{} {} -> {} ({:.1} ms)",
                        method,
                        path,
                        status.as_u16(),
                        elapsed.as_secs_f64() * 1000.0
                    );
                }
                Err(_) => {
                    metrics.record_server_error();
                    info!("{} {} -> failed", method, path);
                }
            }

            result
        })
    }
}
