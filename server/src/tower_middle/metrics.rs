use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::RwLock;

/// Request counters shared by every connection task.
#[derive(Clone, Debug)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    total_requests: AtomicU64,
    active_requests: AtomicUsize,
    /// Responses with a 5xx status.
    server_errors: AtomicU64,
    /// Responses with a 401 status, local or relayed.
    unauthorized: AtomicU64,
    /// Calls made to the backend, retries excluded.
    proxied: AtomicU64,
    latencies: Arc<RwLock<LatencyTracker>>,
    start_time: Instant,
}

#[derive(Debug)]
struct LatencyTracker {
    buffer: Vec<Duration>,
    index: usize,
    capacity: usize,
}

impl LatencyTracker {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            index: 0,
            capacity,
        }
    }

    fn record(&mut self, duration: Duration) {
        if self.buffer.len() < self.capacity {
            self.buffer.push(duration);
        } else {
            self.buffer[self.index] = duration;
            self.index = (self.index + 1) % self.capacity;
        }
    }

    fn percentile(&self, p: f64) -> Option<Duration> {
        if self.buffer.is_empty() {
            return None;
        }

        let mut sorted = self.buffer.clone();
        sorted.sort();

        let index = ((p / 100.0) * sorted.len() as f64) as usize;
        sorted.get(index.min(sorted.len() - 1)).copied()
    }

    fn average(&self) -> Option<Duration> {
        if self.buffer.is_empty() {
            return None;
        }

        let sum: Duration = self.buffer.iter().sum();
        Some(sum / self.buffer.len() as u32)
    }
}

/// Point-in-time view served by `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub total_requests: u64,
    pub active_requests: usize,
    pub server_errors: u64,
    pub unauthorized: u64,
    pub proxied: u64,
    pub avg_latency_ms: Option<f64>,
    pub p95_latency_ms: Option<f64>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                total_requests: AtomicU64::new(0),
                active_requests: AtomicUsize::new(0),
                server_errors: AtomicU64::new(0),
                unauthorized: AtomicU64::new(0),
                proxied: AtomicU64::new(0),
                latencies: Arc::new(RwLock::new(LatencyTracker::new(1000))),
                start_time: Instant::now(),
            }),
        }
    }

    /// Count a new request. It stays active until the returned guard is
    /// dropped, including when the connection goes away mid-request.
    #[must_use]
    pub fn request_start(&self) -> InFlight {
        self.inner.total_requests.fetch_add(1, Ordering::Relaxed);
        self.inner.active_requests.fetch_add(1, Ordering::Relaxed);
        InFlight {
            inner: Arc::clone(&self.inner),
        }
    }

    pub async fn record_latency(&self, duration: Duration) {
        self.inner.latencies.write().await.record(duration);
    }

    pub fn record_server_error(&self) {
        self.inner.server_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unauthorized(&self) {
        self.inner.unauthorized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_proxied(&self) {
        self.inner.proxied.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        let latencies = self.inner.latencies.read().await;
        let ms = |d: Duration| d.as_secs_f64() * 1000.0;

        MetricsSnapshot {
            uptime_secs: self.inner.start_time.elapsed().as_secs(),
            total_requests: self.inner.total_requests.load(Ordering::Relaxed),
            active_requests: self.inner.active_requests.load(Ordering::Relaxed),
            server_errors: self.inner.server_errors.load(Ordering::Relaxed),
            unauthorized: self.inner.unauthorized.load(Ordering::Relaxed),
            proxied: self.inner.proxied.load(Ordering::Relaxed),
            avg_latency_ms: latencies.average().map(ms),
            p95_latency_ms: latencies.percentile(95.0).map(ms),
        }
    }
}

/// One active request. Dropping it ends the request.
#[derive(Debug)]
pub struct InFlight {
    inner: Arc<MetricsInner>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.inner.active_requests.fetch_sub(1, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
