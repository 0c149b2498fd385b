//! Prometheus registry owned by the service.
//!
//! Components register their own collectors on the registry returned by
//! [`MetricsHandle::registry`]; there are no global metric statics.
//! Metric names follow `kg_<component>_<metric>_<unit>`.

use prometheus::{Encoder, Registry, TextEncoder};

use crate::TelemetryError;

/// Shared handle to the service registry.
#[derive(Clone)]
pub struct MetricsHandle {
    registry: Registry,
}

impl MetricsHandle {
    /// Fresh registry whose metrics all carry a `service` label.
    pub fn new(service_name: &str) -> Result<Self, TelemetryError> {
        let labels = std::iter::once(("service".to_string(), service_name.to_string())).collect();
        let registry = Registry::new_custom(None, Some(labels))
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
        Ok(Self { registry })
    }

    /// Registry components register their collectors on.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode all metrics as Prometheus text format.
    pub fn encode(&self) -> Result<String, TelemetryError> {
        encode_metrics(&self.registry)
    }
}

/// Encode all metrics of `registry` as Prometheus text format.
pub fn encode_metrics(registry: &Registry) -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
