use std::convert::Infallible;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::header::SET_COOKIE;
use hyper::{Request, Response};
use tracing::{error, info, warn};

use shared::types::LoginResponse;

use crate::AppState;
use crate::handlers::http::routes::PathParams;
use crate::handlers::http::utils::*;
use crate::proxy::forward::{Upstream, build_outbound, exchange, reject_inbound, relay_json};

/// Forward the credentials to the backend and relay its answer. On success
/// the access token is also mirrored into the session cookie so the page
/// guard lets the browser through.
pub async fn handle_login(
    req: Request<hyper::body::Incoming>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let secure = is_https(&req);
    let authorization = get_authorization(req.headers());
    let upstream = Upstream::json("/api/auth/login");

    let outbound =
        match build_outbound(req, &upstream, &PathParams::default(), authorization).await {
            Ok(outbound) => outbound,
            Err(e) => return reject_inbound(e),
        };

    let response = match exchange(&state, &outbound).await {
        Ok(response) => response,
        Err(e) => {
            error!("Login proxy failure: {}", e);
            return internal_error();
        }
    };

    let session = response
        .status
        .is_success()
        .then(|| serde_json::from_slice::<LoginResponse>(&response.body).ok())
        .flatten();

    let mut relayed = relay_json(response)?;

    match session {
        Some(login) => {
            info!("Login succeeded for {}", login.user);
            let cookie_name = state.config.read().await.session.cookie_name.clone();
            let cookie = create_session_cookie(&cookie_name, &login.access_token, secure)
                .context("Failed to create session cookie")?;
            relayed.headers_mut().append(SET_COOKIE, cookie);
        }
        None => warn!("Login rejected with status {}", relayed.status()),
    }

    Ok(relayed)
}
