//! # kg-03-action-pipeline
//!
//! The transactional engine every tenant mutation flows through.
//!
//! ## Overview
//!
//! - **Registry**: explicit action-type table built at startup
//! - **Authorization Gate**: user graph view, pending trust check, plugin predicate
//! - **Transition Executor**: plugin `apply`, consumed only through its declared result
//! - **Garbage Collector**: expiry, trust pruning, orphaned locals
//! - **Reconciler**: encrypted key delete-set and re-encryption queue
//! - **Optimistic Concurrency**: stamp check at load and under the root lock
//! - **Bundle Builder**: one atomic set of storage operations per request
//! - **Bulk Composer**: ordered graph actions sharing one snapshot and transaction
//! - **Trust Anchor**: root pubkey replacement acknowledgement state machine
//!
//! ## Architecture
//!
//! ```text
//!                ┌──────────────────────────────────────────────┐
//! transport ───→ │ ActionPipeline::dispatch                     │
//!                │   registry → authenticate → scope load       │
//!                │   → authorize → apply → GC → reconcile       │
//!                │   → bundle → locking read → commit           │
//!                └──────────────┬───────────────────────────────┘
//!                               │ PostCommitTask
//!                               ▼
//!                ┌──────────────────────────────────────────────┐
//!                │ PostCommitWorker (background)                │
//!                │   notify → clear sockets → replicate         │
//!                │   → background statements → hooks → stats    │
//!                └──────────────────────────────────────────────┘
//! ```
//!
//! Storage is reached only through `kg_01_graph_store::GraphStorage` and
//! notifications only through `shared_bus::NotificationChannel`.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod post_commit;
pub mod registry;
pub mod service;

pub use config::PipelineConfig;
pub use domain::{
    Action, ActionRequest, ApiResponse, EnvParams, GraphActionSettings, GraphTransition, PatchOp,
    PostUpdateHook, RequestContext, ResponseBody, ResponseKind, TransitionOutcome,
};
pub use error::{PipelineError, PipelineResult, RegistryError, RegistryResult};
pub use metrics::PipelineMetrics;
pub use ports::{
    ActionApi, Authenticator, GraphAction, NonGraphAction, NonGraphContext, NonGraphOutcome,
    NoopReplication, ReplicationSink,
};
pub use post_commit::{PostCommitTask, PostCommitWorker, TenantStat, TenantStats};
pub use registry::{ActionDescriptor, ActionKind, ActionRegistry};
pub use service::{ActionPipeline, PipelineBuilder};

#[cfg(feature = "static-auth")]
pub use adapters::StaticAuthenticator;
#[cfg(feature = "trusted-root")]
pub use adapters::{UpdateTrustedRoot, UpdateTrustedRootPayload, UPDATE_TRUSTED_ROOT};
