use std::convert::Infallible;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::header::HeaderMap;
use hyper::{Request, Response, StatusCode};
use tracing::{debug, info, warn};

use shared::types::SessionConfig;

use crate::AppState;
use crate::handlers::http::utils::*;

/// Outcome of the page guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

/// Protected pages need the session cookie to be present. Its value is
/// never decoded and the role is not checked here.
///
/// Both the raw path and the page it resolves to are checked, so
/// `/employees.html` and `//employees` are guarded like `/employees`.
pub fn guard(
    path: &str,
    headers: &HeaderMap,
    session: &SessionConfig,
    login_page: &str,
) -> GuardDecision {
    let by_page = page_name(path).is_some_and(|page| session.is_protected(&format!("/{page}")));
    if !session.is_protected(path) && !by_page {
        return GuardDecision::Allow;
    }

    match get_cookie(headers, &session.cookie_name) {
        Some(value) if !value.is_empty() => GuardDecision::Allow,
        _ => {
            info!("No session cookie for {}, redirecting to {}", path, login_page);
            GuardDecision::Redirect(login_page.to_string())
        }
    }
}

/// File under `web_dir` that serves `path`, or `None` when the path cannot
/// name a page or asset.
///
/// `/` is `index.html`, `/static/..` maps 1:1, and any other path is served
/// by the HTML file named after its first segment (`/employees/12` →
/// `employees.html`).
pub fn resolve_page(web_dir: &Path, path: &str) -> Option<(PathBuf, CacheStrategy)> {
    if path == "/" || path == "/index.html" {
        return Some((web_dir.join("index.html"), CacheStrategy::Explicit));
    }

    if let Some(asset) = path.strip_prefix("/static/") {
        let safe = !asset.is_empty()
            && asset
                .split('/')
                .all(|seg| !seg.is_empty() && seg != "." && seg != "..");
        return safe.then(|| (web_dir.join("static").join(asset), CacheStrategy::Yes));
    }

    let page = page_name(path)?;
    Some((web_dir.join(format!("{page}.html")), CacheStrategy::Explicit))
}

/// Name of the HTML page that serves `path`: its first non-empty segment
/// without a `.html` suffix. `None` for `/static/..` and for names that are
/// not plain `[A-Za-z0-9_-]`.
fn page_name(path: &str) -> Option<&str> {
    if path.trim_start_matches('/').starts_with("static/") {
        return None;
    }
    let page = path.trim_start_matches('/').split('/').next()?;
    let page = page.strip_suffix(".html").unwrap_or(page);
    let valid = !page.is_empty()
        && page
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then_some(page)
}

/// Guard, then serve the page or asset from disk.
pub async fn serve_page(
    req: Request<hyper::body::Incoming>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let path = req.uri().path().to_string();

    let (web_dir, login_page, session) = {
        let cfg = state.config.read().await;
        (
            cfg.paths.web_dir.clone(),
            cfg.paths.login_page.clone(),
            cfg.session.clone(),
        )
    };

    if let GuardDecision::Redirect(location) = guard(&path, req.headers(), &session, &login_page) {
        return deliver_redirect(&location);
    }

    let Some((file, cache)) = resolve_page(Path::new(&web_dir), &path) else {
        return page_not_found(&path);
    };

    if !tokio::fs::try_exists(&file).await.unwrap_or(false) {
        return page_not_found(&path);
    }

    debug!("Serving {} from {}", path, file.display());
    deliver_page_with_status(&file, StatusCode::OK, cache)
        .await
        .context("Failed to deliver page")
}

fn page_not_found(path: &str) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    warn!("No page for {}", path);
    deliver_error_json("NOT_FOUND", "Page not found", StatusCode::NOT_FOUND)
}
