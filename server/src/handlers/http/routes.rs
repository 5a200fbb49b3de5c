use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::header::HeaderValue;
use hyper::{Method, Request, Response, StatusCode};
use tracing::warn;

use crate::AppState;
use crate::handlers::http::{auth, guard, utils::*};
use crate::proxy::{Upstream, forward};

// ---------------------------------------------------------------------------
// Path parameters
// ---------------------------------------------------------------------------

/// Values captured from `:name` segments of the matched route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// Handler type aliases
// ---------------------------------------------------------------------------
//
// Two tiers:
//
//   OpenHandler    no credential.  Receives (req, state, params).
//                  Use for: login, register, logout, /health.
//
//   BearerHandler  the router has checked that `Authorization` is present
//                  and non-blank.  Receives (req, state, params, header).
//                  The header is never decoded here; the backend judges it.

type HandlerFuture =
    Pin<Box<dyn Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send>>;

type OpenHandler =
    Box<dyn Fn(Request<hyper::body::Incoming>, AppState, PathParams) -> HandlerFuture + Send + Sync>;

type BearerHandler = Box<
    dyn Fn(Request<hyper::body::Incoming>, AppState, PathParams, HeaderValue) -> HandlerFuture
        + Send
        + Sync,
>;

enum RouteKind {
    Open(OpenHandler),
    Bearer(BearerHandler),
}

struct Route {
    method: Method,
    path: String,
    kind: RouteKind,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// First match wins, so register literal segments before `:param` ones
/// that would also match them.
pub struct Router {
    routes: Vec<Route>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes_count", &self.routes.len())
            .finish()
    }
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn open<F, Fut>(mut self, method: Method, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState, PathParams) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            kind: RouteKind::Open(Box::new(move |req, state, params| {
                Box::pin(handler(req, state, params))
            })),
        });
        self
    }

    pub fn bearer<F, Fut>(mut self, method: Method, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState, PathParams, HeaderValue) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            kind: RouteKind::Bearer(Box::new(move |req, state, params, auth| {
                Box::pin(handler(req, state, params, auth))
            })),
        });
        self
    }

    /// Forward `method path` to the backend. Requires `Authorization`.
    pub fn proxy(self, method: Method, path: &str, upstream: Upstream) -> Self {
        self.bearer(method, path, move |req, state, params, auth| {
            let upstream = upstream.clone();
            async move { forward(req, state, params, Some(auth), &upstream).await }
        })
    }

    /// Forward without requiring a credential. Any `Authorization` the
    /// caller did send is still copied.
    pub fn proxy_open(self, method: Method, path: &str, upstream: Upstream) -> Self {
        self.open(method, path, move |req, state, params| {
            let upstream = upstream.clone();
            async move {
                let auth = get_authorization(req.headers());
                forward(req, state, params, auth, &upstream).await
            }
        })
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    pub async fn route(
        &self,
        req: Request<hyper::body::Incoming>,
        state: AppState,
    ) -> Result<Response<BoxBody<Bytes, Infallible>>> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        for route in &self.routes {
            if route.method != method {
                continue;
            }
            let Some(params) = Self::match_path(&route.path, &path) else {
                continue;
            };

            return match &route.kind {
                RouteKind::Open(h) => h(req, state, params).await,

                RouteKind::Bearer(h) => match get_authorization(req.headers()) {
                    Some(auth) => h(req, state, params, auth).await,
                    None => {
                        warn!("Rejected {} {}: no Authorization header", method, path);
                        unauthorized()
                    }
                },
            };
        }

        // Pages and static assets.
        if (method == Method::GET || method == Method::HEAD) && !path.starts_with("/api/") {
            return guard::serve_page(req, state)
                .await
                .context("Failed to serve page");
        }

        deliver_error_json("NOT_FOUND", "Endpoint not found", StatusCode::NOT_FOUND)
            .context("Failed to deliver 404 response")
    }

    // ── Path matching ─────────────────────────────────────────────────────────

    /// Segment-wise match where `:name` captures one segment.
    /// e.g.  "/api/employees/:id"  matches  "/api/employees/42"
    pub fn match_path(route_path: &str, request_path: &str) -> Option<PathParams> {
        // Strip query string from incoming request path before comparing.
        let clean = request_path.split('?').next().unwrap_or(request_path);

        if route_path == clean {
            return Some(PathParams::default());
        }

        let route_segs: Vec<&str> = route_path.split('/').collect();
        let path_segs: Vec<&str> = clean.split('/').collect();

        if route_segs.len() != path_segs.len() {
            return None;
        }

        let mut params = Vec::new();
        for (r, p) in route_segs.iter().zip(path_segs.iter()) {
            match r.strip_prefix(':') {
                Some(name) if !p.is_empty() => params.push((name.to_string(), p.to_string())),
                Some(_) => return None,
                None if r == p => {}
                None => return None,
            }
        }
        Some(PathParams(params))
    }

    pub fn path_matches(route_path: &str, request_path: &str) -> bool {
        Self::match_path(route_path, request_path).is_some()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Gateway routes
//
// Upstream paths mirror the inbound ones. Every `proxy(..)` route is
// Bearer-tier: a request without `Authorization` gets a 401 from the router
// and the backend is never contacted.
// ---------------------------------------------------------------------------

pub fn build_api_router() -> Router {
    use Method as M;

    Router::new()
        .open(M::GET, "/health", |_req, state, _params| async move {
            let snapshot = state.metrics.snapshot().await;
            deliver_serialized_json(
                &serde_json::json!({ "status": "ok", "metrics": snapshot }),
                StatusCode::OK,
            )
        })
        // ── Auth ─────────────────────────────────────────────────────────────
        .open(M::POST, "/api/auth/login", |req, state, _params| async move {
            auth::handle_login(req, state).await.context("Login failed")
        })
        .open(M::POST, "/api/auth/logout", |req, state, _params| async move {
            auth::handle_logout(req, state)
                .await
                .context("Logout failed")
        })
        .proxy_open(M::POST, "/api/auth/register", Upstream::json("/api/auth/register"))
        .proxy(M::GET, "/api/auth/me", Upstream::json("/api/auth/me"))
        // ── Employees ────────────────────────────────────────────────────────
        .proxy(M::GET, "/api/employees", Upstream::json("/api/employees"))
        .proxy(M::POST, "/api/employees", Upstream::json("/api/employees"))
        .proxy(
            M::GET,
            "/api/employees/options",
            Upstream::json("/api/employees/options"),
        )
        .proxy(M::GET, "/api/employees/:id", Upstream::json("/api/employees/:id"))
        .proxy(M::PUT, "/api/employees/:id", Upstream::json("/api/employees/:id"))
        .proxy(
            M::DELETE,
            "/api/employees/:id",
            Upstream::json("/api/employees/:id"),
        )
        // ── Payroll ──────────────────────────────────────────────────────────
        .proxy(M::GET, "/api/payroll/runs", Upstream::json("/api/payroll/runs"))
        .proxy(M::POST, "/api/payroll/runs", Upstream::json("/api/payroll/runs"))
        .proxy(
            M::POST,
            "/api/payroll/runs/bulk",
            Upstream::json("/api/payroll/runs/bulk"),
        )
        .proxy(
            M::PUT,
            "/api/payroll/runs/:id",
            Upstream::json("/api/payroll/runs/:id"),
        )
        .proxy(
            M::POST,
            "/api/payroll/runs/:id/process",
            Upstream::json("/api/payroll/runs/:id/process"),
        )
        .proxy(
            M::GET,
            "/api/payroll/employees",
            Upstream::json("/api/payroll/employees"),
        )
        // ── Payslips ─────────────────────────────────────────────────────────
        .proxy(M::GET, "/api/payslips", Upstream::json("/api/payslips"))
        .proxy(
            M::GET,
            "/api/payslips/:id/pdf",
            Upstream::pdf("/api/payslips/:id/pdf", "payslip"),
        )
        // ── Analytics ────────────────────────────────────────────────────────
        .proxy(
            M::GET,
            "/api/analytics/summary",
            Upstream::json("/api/analytics/summary"),
        )
        .proxy(
            M::GET,
            "/api/analytics/department-distribution",
            Upstream::json("/api/analytics/department-distribution"),
        )
        .proxy(
            M::GET,
            "/api/analytics/monthly-trend",
            Upstream::json("/api/analytics/monthly-trend"),
        )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
