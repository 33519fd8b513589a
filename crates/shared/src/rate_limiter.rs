//! Sliding-counter admission control for inbound requests, keyed by the /24
//! prefix of the client's IPv4 address.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

#[derive(prometheus_metric_storage::MetricStorage, Clone, Debug)]
#[metric(subsystem = "request_limiter")]
struct Metrics {
    /// Number of requests denied by the admission limiter.
    requests_denied: prometheus::IntCounter,
}

fn metrics() -> &'static Metrics {
    Metrics::instance(crate::metrics::get_metric_storage_registry())
        .expect("unexpected error getting metrics instance")
}

struct Bucket {
    count: usize,
    reset_at: Instant,
}

/// Counts requests per client prefix within a window. Buckets are created on
/// first admission and evicted by a periodic sweep once expired.
#[derive(Default)]
pub struct RequestLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
}

/// Collapses an IPv4 address to its /24 prefix. Addresses without a dot
/// separator are used as-is.
pub fn client_prefix(address: &str) -> &str {
    match address.rfind('.') {
        Some(index) if index > 0 => &address[..index],
        _ => address,
    }
}

impl RequestLimiter {
    /// Whether the client may proceed, counting this call against the limit.
    pub fn allow(&self, client: &str, limit: usize, window: Duration) -> bool {
        let prefix = client_prefix(client);
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap();
        match buckets.get_mut(prefix) {
            Some(bucket) if now < bucket.reset_at => {
                bucket.count += 1;
                let allowed = bucket.count <= limit;
                if !allowed {
                    metrics().requests_denied.inc();
                }
                allowed
            }
            _ => {
                buckets.insert(
                    prefix.to_string(),
                    Bucket {
                        count: 1,
                        reset_at: now + window,
                    },
                );
                true
            }
        }
    }

    /// Drops buckets whose window has passed.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.buckets
            .lock()
            .unwrap()
            .retain(|_, bucket| now < bucket.reset_at);
    }

    pub fn spawn_gc(self: &Arc<Self>, period: Duration) {
        let limiter = Arc::clone(self);
        tokio::task::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                limiter.sweep();
            }
        });
    }
}
