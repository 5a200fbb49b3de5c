use std::convert::Infallible;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::body::Incoming as IncomingBody;
use hyper::header::SET_COOKIE;
use hyper::{Request, Response, StatusCode};
use tracing::info;

use crate::AppState;
use crate::handlers::http::utils::*;

/// Clear the session cookie. The backend keeps no session to revoke, so it
/// is not contacted.
pub async fn handle_logout(
    _req: Request<IncomingBody>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    info!("User logged out");

    let cookie_name = state.config.read().await.session.cookie_name.clone();
    let clear_cookie = delete_cookie(&cookie_name).context("Failed to build clearing cookie")?;

    let mut response = deliver_serialized_json(
        &serde_json::json!({ "message": "Logged out successfully" }),
        StatusCode::OK,
    )
    .context("Failed to build logout response")?;
    response.headers_mut().insert(SET_COOKIE, clear_cookie);

    Ok(response)
}
