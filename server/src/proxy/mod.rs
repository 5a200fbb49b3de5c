//! Forwarding of browser requests to the payroll backend.

pub mod client;
pub mod forward;

pub use client::{BackendClient, BackendResponse, BackendTarget, OutboundRequest, ProxyError};
pub use forward::{Payload, Upstream, forward};
