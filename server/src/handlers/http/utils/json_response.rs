use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{Response, StatusCode, header};
use serde::Serialize;
use std::convert::Infallible;
use tracing::{debug, warn};

use shared::types::ErrorResponse;

use crate::handlers::http::utils::deliver_page::full;

/// Serialize any `Serialize` type and deliver it as a JSON response.
pub fn deliver_serialized_json<T: Serialize>(
    data: &T,
    status: StatusCode,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let json = serde_json::to_vec(data).context("Failed to serialize response")?;
    deliver_json(json, status)
}

/// Delivers the gateway's own JSON error body: `{"error": message, "code": code}`.
pub fn deliver_error_json(
    error_code: &str,
    message: &str,
    status: StatusCode,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    warn!(
        "Delivering error JSON: {} - {} ({})",
        status.as_u16(),
        error_code,
        message
    );

    deliver_serialized_json(&ErrorResponse::new(error_code, message), status)
}

/// Delivers a JSON response from raw pre-serialized bytes.
/// Used to relay backend bodies without re-encoding them.
pub fn deliver_json<T: Into<Bytes>>(
    json: T,
    status: StatusCode,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let bytes: Bytes = json.into();

    debug!("Delivering raw JSON response, size: {} bytes", bytes.len());

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(full(bytes))
        .map_err(|e: http::Error| anyhow!("Failed to build JSON response: {}", e))
}

pub fn unauthorized() -> Result<Response<BoxBody<Bytes, Infallible>>> {
    deliver_error_json(
        "UNAUTHORIZED",
        "Authorization header required",
        StatusCode::UNAUTHORIZED,
    )
}

pub fn internal_error() -> Result<Response<BoxBody<Bytes, Infallible>>> {
    deliver_error_json(
        "INTERNAL_ERROR",
        "Internal server error",
        StatusCode::INTERNAL_SERVER_ERROR,
    )
}

/// Last-resort 500 used when even the JSON helper fails. Never errors.
pub fn fallback_internal_error() -> Response<BoxBody<Bytes, Infallible>> {
    let mut response = Response::new(full(Bytes::from_static(
        br#"{"error":"Internal server error","code":"INTERNAL_ERROR"}"#,
    )));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}
