//! # Keygraph Telemetry
//!
//! Structured logging and Prometheus metrics for Keygraph services.
//!
//! ## Components
//!
//! - **Logs**: `tracing` subscriber, JSON in containers, pretty in development
//! - **Metrics**: an owned Prometheus registry handed to each component
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kg_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let telemetry = init_telemetry(TelemetryConfig::from_env())?;
//!     let registry = telemetry.metrics().registry().clone();
//!     // hand `registry` to the action pipeline builder
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `KG_SERVICE_NAME` | `keygraph` | Service name in logs and metric labels |
//! | `KG_LOG_LEVEL` | `info` | Log level filter (`RUST_LOG` also honored) |
//! | `KG_LOG_FORMAT` | `pretty` (`json` in containers) | `json`, `pretty` or `off` |
//! | `KG_ENVIRONMENT` | `development` | Deployment environment |

mod config;
mod metrics;
mod tracing_setup;

pub use config::{LogFormat, TelemetryConfig};
pub use metrics::{encode_metrics, MetricsHandle};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Install logging and create the metrics registry.
///
/// The returned guard must be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = MetricsHandle::new(&config.service_name)?;
    tracing_setup::init_tracing(&config)?;

    Ok(TelemetryGuard {
        service_name: config.service_name,
        metrics,
    })
}

/// Keeps telemetry active. Logs a final line on drop.
pub struct TelemetryGuard {
    service_name: String,
    metrics: MetricsHandle,
}

impl TelemetryGuard {
    pub fn metrics(&self) -> &MetricsHandle {
        &self.metrics
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry...");
    }
}
