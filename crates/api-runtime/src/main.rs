//! # Keygraph API Runtime
//!
//! The service entry point. Wires the action pipeline to in-memory storage
//! and the notification bus, seeds a demo tenant and runs the post-commit
//! worker until Ctrl+C.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (structured logs, metrics registry)
//! 2. Load configuration from the environment
//! 3. Assemble the service container
//! 4. Seed the demo tenant
//! 5. Spawn the post-commit worker
//! 6. Signal ready

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info, warn};

use api_runtime::{RuntimeConfig, ServiceContainer};
use kg_telemetry::{init_telemetry, TelemetryConfig};

/// Owns the container and the shutdown signal of background tasks.
struct ApiRuntime {
    container: Arc<ServiceContainer>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ApiRuntime {
    fn new(config: RuntimeConfig, metrics: prometheus::Registry) -> Result<Self> {
        info!("Creating Keygraph API runtime");
        let container = Arc::new(ServiceContainer::new(config, Some(metrics))?);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            container,
            shutdown_tx,
            shutdown_rx,
        })
    }

    async fn start(&self) -> Result<()> {
        info!("===========================================");
        info!("  Keygraph API Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        let seeded = self.container.seed_demo()?;
        info!(
            org_id = %seeded.org_id,
            owner_id = %seeded.owner_id,
            "Demo tenant seeded"
        );

        let worker = self
            .container
            .take_worker()
            .context("Post-commit worker already started")?;
        let mut shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = worker.run() => {}
                _ = shutdown.changed() => {
                    info!("[kg-03] Shutdown signal received");
                }
            }
        });

        info!(
            actions = ?self.container.pipeline.registry().action_types(),
            "Action pipeline running"
        );
        Ok(())
    }

    async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }

        // Let in-flight post-commit work finish.
        tokio::time::sleep(Duration::from_millis(500)).await;

        let stats = self.container.pipeline.stats();
        info!(processed = stats.processed(), "Shutdown complete");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = init_telemetry(TelemetryConfig::from_env())?;

    let config = RuntimeConfig::from_env();
    if let Err(e) = config.validate_for_production() {
        warn!("{}", e);
    }

    let runtime = ApiRuntime::new(config, telemetry.metrics().registry().clone())?;
    runtime.start().await?;

    info!("API runtime is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    Ok(())
}
