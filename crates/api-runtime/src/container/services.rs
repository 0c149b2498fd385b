//! # Service Container
//!
//! Holds every long-lived service and wires them together.
//!
//! ```text
//! InMemoryGraphStorage ──┐
//! InMemoryNotificationBus┼──→ PipelineBuilder ──→ ActionPipeline
//! StaticAuthenticator ───┤                   └──→ PostCommitWorker
//! action_registry() ─────┘
//! ```
//!
//! The worker is handed out once so the runtime can spawn it under its
//! shutdown signal.

use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use prometheus::Registry;
use tracing::info;

use kg_01_graph_store::InMemoryGraphStorage;
use kg_03_action_pipeline::{ActionPipeline, PipelineBuilder, PostCommitWorker, StaticAuthenticator};
use shared_bus::InMemoryNotificationBus;
use shared_types::{AuthContext, Clock, SystemClock};

use crate::container::config::RuntimeConfig;
use crate::handlers::action_registry;
use crate::seed::{SeedBuilder, SeedConfig, SeededOrg};

pub struct ServiceContainer {
    pub config: RuntimeConfig,
    pub storage: Arc<InMemoryGraphStorage>,
    pub notifications: Arc<InMemoryNotificationBus>,
    pub authenticator: Arc<StaticAuthenticator>,
    pub clock: Arc<dyn Clock>,
    pub pipeline: ActionPipeline,
    worker: Mutex<Option<PostCommitWorker>>,
}

impl ServiceContainer {
    /// Wire every service with the system clock.
    pub fn new(config: RuntimeConfig, metrics: Option<Registry>) -> Result<Self> {
        Self::with_clock(config, metrics, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: RuntimeConfig,
        metrics: Option<Registry>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate().context("Invalid runtime configuration")?;

        let storage = Arc::new(InMemoryGraphStorage::with_lock_timeout(
            config.pipeline.lock_timeout(),
        ));
        let notifications = Arc::new(InMemoryNotificationBus::with_capacity(
            config.notification_capacity,
        ));
        let authenticator = Arc::new(StaticAuthenticator::new());
        let registry = action_registry().context("Failed to build action registry")?;

        let mut builder = PipelineBuilder::new()
            .storage(Arc::clone(&storage) as _)
            .notifications(Arc::clone(&notifications) as _)
            .authenticator(Arc::clone(&authenticator) as _)
            .clock(Arc::clone(&clock))
            .registry(registry)
            .config(config.pipeline.clone());
        if let Some(metrics) = metrics {
            builder = builder.metrics_registry(metrics);
        }
        let (pipeline, worker) = builder.build().context("Failed to assemble action pipeline")?;

        info!(
            actions = pipeline.registry().len(),
            notification_capacity = config.notification_capacity,
            "Service container initialized"
        );

        Ok(Self {
            config,
            storage,
            notifications,
            authenticator,
            clock,
            pipeline,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// The post-commit worker, on first call only.
    pub fn take_worker(&self) -> Option<PostCommitWorker> {
        self.worker.lock().take()
    }

    /// Seed the configured demo tenant and register the owner's token.
    pub fn seed_demo(&self) -> Result<SeededOrg> {
        let demo = &self.config.demo;
        let seeded = SeedBuilder::new(SeedConfig {
            org_id: demo.org_id.as_str().into(),
            org_name: demo.org_name.clone(),
            owner_email: demo.owner_email.clone(),
            ..SeedConfig::default()
        })
        .build(self.clock.now())
        .context("Failed to build demo tenant")?;

        seeded
            .write_to(&self.storage)
            .context("Failed to write demo tenant")?;
        self.authenticator.insert(
            demo.token.clone(),
            AuthContext::session(
                seeded.org_id.clone(),
                seeded.owner_id.clone(),
                seeded.owner_device_id.clone(),
            ),
        );
        Ok(seeded)
    }
}
