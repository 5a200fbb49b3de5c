/// Tower middleware wrapped around the request dispatcher.
pub mod metrics;
pub mod request_log;

pub use metrics::{InFlight, Metrics, MetricsSnapshot};
pub use request_log::{RequestLogLayer, RequestLogService};
