use std::fmt;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, combinators::BoxBody};
use hyper::{Response, StatusCode, header};
use std::convert::Infallible;
use tracing::{debug, info};

use crate::handlers::http::utils::headers;

#[derive(Debug, Clone, Copy)]
pub enum CacheStrategy {
    /// Static assets, cached for a year.
    Yes,
    /// Pages: never cached, so the guard runs on every visit.
    Explicit,
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheStrategy::Yes => write!(f, "Yes (1 year)"),
            CacheStrategy::Explicit => write!(f, "Explicit (no-cache)"),
        }
    }
}

/// Deliver a file from disk with caching headers
pub async fn deliver_page_with_status<P: AsRef<Path>>(
    file_path: P,
    status: StatusCode,
    cache: CacheStrategy,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let path = file_path.as_ref();

    debug!("Reading file from: {} (cache: {})", path.display(), cache);

    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    let mime_type = get_mime_type(path);

    let response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, mime_type)
        .body(full(content))
        .map_err(|e| anyhow!("Failed to build response: {}", e))?;

    Ok(match cache {
        CacheStrategy::Yes => headers::add_cache_headers_with_max_age(response, None),
        CacheStrategy::Explicit => headers::add_no_cache_headers(response),
    })
}

/// Helper function to determine MIME type from file extension
fn get_mime_type(path: &Path) -> &'static str {
    match path.extension().and_then(|s| s.to_str()) {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") | Some("mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json",

        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",

        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",

        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",

        _ => "application/octet-stream",
    }
}

/// Delivers a redirect response
pub fn deliver_redirect(location: &str) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    info!("Delivering redirect to: {}", location);

    Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, location)
        .body(full(Bytes::new()))
        .map_err(|e: http::Error| anyhow!("Failed to build redirect response: {}", e))
}

/// Helper function to create a full body from various types
pub fn full<T: Into<Bytes>>(chunk: T) -> BoxBody<Bytes, Infallible> {
    Full::new(chunk.into()).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_types_by_extension() {
        assert_eq!(get_mime_type(Path::new("a/login.html")), "text/html; charset=utf-8");
        assert_eq!(get_mime_type(Path::new("app.js")), "application/javascript; charset=utf-8");
        assert_eq!(get_mime_type(Path::new("blob")), "application/octet-stream");
    }

    #[test]
    fn redirect_sets_location() {
        let resp = deliver_redirect("/login").unwrap();
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let result = deliver_page_with_status(
            "/definitely/not/here.html",
            StatusCode::OK,
            CacheStrategy::Explicit,
        )
        .await;
        assert!(result.is_err());
    }
}
