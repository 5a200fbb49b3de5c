use anyhow::{Result, anyhow};
use hyper::header::{HeaderMap, HeaderValue};
use std::time::Duration;
use tracing::debug;

/// Extract a header value as a string
pub fn get_header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(|s| {
        debug!("Retrieved header: {}", name);
        s.to_string()
    })
}

/// Extract cookie value by name
pub fn get_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all("cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|cookie| {
            let (name, value) = cookie.trim().split_once('=')?;
            (name.trim() == cookie_name).then(|| value.trim().to_string())
        })
}

/// Set a cookie with options
pub fn set_cookie(
    name: &str,
    value: &str,
    max_age: Option<Duration>,
    path: Option<&str>,
    http_only: bool,
    secure: bool,
) -> Result<HeaderValue> {
    let mut cookie = format!("{}={}", name, value);

    if let Some(age) = max_age {
        cookie.push_str(&format!("; Max-Age={}", age.as_secs()));
    }

    if let Some(p) = path {
        cookie.push_str(&format!("; Path={}", p));
    }

    if http_only {
        cookie.push_str("; HttpOnly");
    }

    if secure {
        cookie.push_str("; Secure");
    }

    cookie.push_str("; SameSite=Lax");

    debug!("Setting cookie: {}", name);

    HeaderValue::from_str(&cookie).map_err(|e| anyhow!("Invalid cookie value for {}: {}", name, e))
}

/// Create a session cookie (expires when browser closes)
pub fn create_session_cookie(name: &str, value: &str, secure: bool) -> Result<HeaderValue> {
    set_cookie(name, value, None, Some("/"), true, secure)
}

/// Delete a cookie by setting it to expire
pub fn delete_cookie(name: &str) -> Result<HeaderValue> {
    debug!("Deleting cookie: {}", name);
    set_cookie(
        name,
        "",
        Some(Duration::from_secs(0)),
        Some("/"),
        true,
        false,
    )
}

/// The inbound `Authorization` header, untouched, when it is present and
/// non-blank. The value is forwarded verbatim; the backend judges it.
pub fn get_authorization(headers: &HeaderMap) -> Option<HeaderValue> {
    headers
        .get(hyper::header::AUTHORIZATION)
        .filter(|v| v.to_str().map(|s| !s.trim().is_empty()).unwrap_or(false))
        .cloned()
}

/// Returns true only when the request arrived over a secure connection.
///
/// Checks `X-Forwarded-Proto: https`, then `X-Forwarded-Ssl: on`, then the
/// request URI scheme. Plain HTTP dev servers get `false`.
pub fn is_https<B>(req: &hyper::Request<B>) -> bool {
    if get_header_value(req.headers(), "x-forwarded-proto")
        .is_some_and(|v| v.eq_ignore_ascii_case("https"))
    {
        return true;
    }

    if get_header_value(req.headers(), "x-forwarded-ssl")
        .is_some_and(|v| v.eq_ignore_ascii_case("on"))
    {
        return true;
    }

    req.uri()
        .scheme()
        .map(|s| s.as_str() == "https")
        .unwrap_or(false)
}

/// Add no-cache headers for pages
pub fn add_no_cache_headers<T>(mut res: hyper::Response<T>) -> hyper::Response<T> {
    let headers = res.headers_mut();

    headers.insert(
        "cache-control",
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert("pragma", HeaderValue::from_static("no-cache"));
    headers.insert("expires", HeaderValue::from_static("0"));
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );

    res
}

/// Add custom cache headers with specified max-age
pub fn add_cache_headers_with_max_age<T>(
    mut res: hyper::Response<T>,
    max_age_seconds: Option<u64>,
) -> hyper::Response<T> {
    let headers = res.headers_mut();
    let time = max_age_seconds.unwrap_or(31536000);

    let cache_control = format!("public, max-age={}", time);
    headers.insert(
        "cache-control",
        HeaderValue::from_str(&cache_control)
            .unwrap_or_else(|_| HeaderValue::from_static("public, max-age=3600")),
    );
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );

    debug!("Added cache headers with max-age: {} seconds", time);
    res
}
