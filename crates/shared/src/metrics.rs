use once_cell::sync::Lazy;
use prometheus::{Encoder, Registry, TextEncoder};
use prometheus_metric_storage::StorageRegistry;

static REGISTRY: Lazy<StorageRegistry> = Lazy::new(|| StorageRegistry::new(Registry::new()));

/// The process wide metric registry every subsystem registers into.
pub fn get_metric_storage_registry() -> &'static StorageRegistry {
    &REGISTRY
}

/// Prometheus text exposition of everything registered so far.
pub fn encode() -> String {
    let mut buffer = Vec::new();
    if let Err(err) = TextEncoder::new().encode(&REGISTRY.registry().gather(), &mut buffer) {
        tracing::error!(?err, "failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}
