use std::convert::Infallible;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, combinators::BoxBody};
use hyper::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderValue};
use hyper::{Request, Response, StatusCode};
use tracing::{debug, error, info};

use crate::AppState;
use crate::handlers::http::routes::PathParams;
use crate::handlers::http::utils::{
    deliver_error_json, deliver_json, deliver_serialized_json, full, internal_error,
};
use crate::proxy::client::{BackendResponse, BackendTarget, OutboundRequest, ProxyError};

/// How the backend's answer is handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// Body must be JSON; relayed byte-for-byte with the backend status.
    Json,
    /// Successful bodies are opaque PDF bytes; error bodies are JSON.
    Pdf,
}

/// One backend resource: the upstream path template (`:name` segments are
/// filled from the inbound path) and the payload kind.
#[derive(Debug, Clone)]
pub struct Upstream {
    template: &'static str,
    payload: Payload,
    /// Prefix of the default download name for binary payloads.
    resource: &'static str,
}

impl Upstream {
    pub fn json(template: &'static str) -> Self {
        Self {
            template,
            payload: Payload::Json,
            resource: "",
        }
    }

    pub fn pdf(template: &'static str, resource: &'static str) -> Self {
        Self {
            template,
            payload: Payload::Pdf,
            resource,
        }
    }

    pub fn payload(&self) -> Payload {
        self.payload
    }

    /// Fill `:name` segments from `params`. Unknown names render empty.
    pub fn render(&self, params: &PathParams) -> String {
        self.template
            .split('/')
            .map(|seg| match seg.strip_prefix(':') {
                Some(name) => params.get(name).unwrap_or_default(),
                None => seg,
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// `attachment; filename="<resource>_<id>.pdf"`
    pub fn default_disposition(&self, params: &PathParams) -> String {
        format!(
            "attachment; filename=\"{}_{}.pdf\"",
            self.resource,
            params.get("id").unwrap_or("document")
        )
    }
}

/// Parse and re-serialize a raw query string so only well-formed
/// `key=value` pairs reach the backend.
pub fn reencode_query(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        serializer.append_pair(&key, &value);
    }
    let encoded = serializer.finish();
    (!encoded.is_empty()).then_some(encoded)
}

/// Why an inbound request could not be turned into an outbound one.
#[derive(Debug)]
pub enum InboundError {
    UnreadableBody,
    NotJson,
}

/// Build the outbound request: same method, rendered path, re-encoded
/// query, the JSON body as sent, and the caller's `Authorization`.
pub async fn build_outbound(
    req: Request<hyper::body::Incoming>,
    upstream: &Upstream,
    params: &PathParams,
    authorization: Option<HeaderValue>,
) -> std::result::Result<OutboundRequest, InboundError> {
    let method = req.method().clone();
    let mut path_and_query = upstream.render(params);
    if let Some(query) = reencode_query(req.uri().query()) {
        path_and_query.push('?');
        path_and_query.push_str(&query);
    }

    let body = req
        .into_body()
        .collect()
        .await
        .map_err(|_| InboundError::UnreadableBody)?
        .to_bytes();

    let body = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        serde_json::from_slice::<serde_json::Value>(&body).map_err(|_| InboundError::NotJson)?;
        Some(body)
    };

    Ok(OutboundRequest {
        method,
        path_and_query,
        authorization,
        body,
    })
}

/// Copy what the outbound call needs out of the live config.
pub async fn backend_target(state: &AppState) -> BackendTarget {
    let cfg = state.config.read().await;
    BackendTarget {
        base_url: cfg.backend.resolved_base_url(),
        timeout: cfg.backend.timeout(),
        get_retries: cfg.backend.get_retries,
    }
}

/// Send an already-built request to the backend and count it.
pub async fn exchange(
    state: &AppState,
    outbound: &OutboundRequest,
) -> std::result::Result<BackendResponse, ProxyError> {
    let target = backend_target(state).await;
    state.metrics.record_proxied();
    state.backend.send(&target, outbound).await
}

/// The generic forwarding handler behind every proxied route.
pub async fn forward(
    req: Request<hyper::body::Incoming>,
    state: AppState,
    params: PathParams,
    authorization: Option<HeaderValue>,
    upstream: &Upstream,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let outbound = match build_outbound(req, upstream, &params, authorization).await {
        Ok(outbound) => outbound,
        Err(e) => return reject_inbound(e),
    };

    info!("Proxying {} {}", outbound.method, outbound.path_and_query);

    match exchange(&state, &outbound).await {
        Ok(response) => match upstream.payload() {
            Payload::Json => relay_json(response),
            Payload::Pdf => relay_pdf(response, &upstream.default_disposition(&params)),
        },
        Err(e) => {
            error!(
                "Proxy failure for {} {}: {}",
                outbound.method, outbound.path_and_query, e
            );
            internal_error()
        }
    }
}

pub fn reject_inbound(e: InboundError) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    match e {
        InboundError::NotJson => deliver_error_json(
            "BAD_REQUEST",
            "Request body must be valid JSON",
            StatusCode::BAD_REQUEST,
        ),
        InboundError::UnreadableBody => internal_error(),
    }
}

/// Relay a JSON answer unchanged. A body that is not JSON is a local
/// failure (500), except for bodiless statuses such as 204.
pub fn relay_json(response: BackendResponse) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    if response.body.is_empty() && is_bodiless(response.status) {
        return Response::builder()
            .status(response.status)
            .body(full(Bytes::new()))
            .context("Failed to build empty relay response");
    }

    if serde_json::from_slice::<serde_json::Value>(&response.body).is_err() {
        error!(
            "Backend answered {} with a body that is not JSON ({} bytes)",
            response.status,
            response.body.len()
        );
        return internal_error();
    }

    deliver_json(response.body, response.status)
}

/// Relay a binary document. Success: opaque bytes as `application/pdf`
/// with the backend's `Content-Disposition` or `default_disposition`.
/// Failure: the backend's JSON error under its status, or a generic error
/// object when that body cannot be parsed.
pub fn relay_pdf(
    response: BackendResponse,
    default_disposition: &str,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    if !response.status.is_success() {
        return match serde_json::from_slice::<serde_json::Value>(&response.body) {
            Ok(_) => deliver_json(response.body, response.status),
            Err(_) => deliver_serialized_json(
                &serde_json::json!({ "error": "Failed to download document" }),
                response.status,
            ),
        };
    }

    let disposition = response
        .headers
        .get(CONTENT_DISPOSITION)
        .cloned()
        .map(Ok)
        .unwrap_or_else(|| HeaderValue::from_str(default_disposition))
        .context("Invalid Content-Disposition")?;

    debug!("Relaying {} byte document", response.body.len());

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/pdf")
        .header(CONTENT_DISPOSITION, disposition)
        .body(full(response.body))
        .context("Failed to build document response")
}

fn is_bodiless(status: StatusCode) -> bool {
    status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED
}
