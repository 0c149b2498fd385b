//! # Pipeline Metrics
//!
//! Prometheus metrics registered on an injected [`Registry`].
//!
//! ## Metrics Exported
//!
//! - `kg_actions_processed_total{action_type, outcome}` - Requests by outcome
//! - `kg_stale_graph_rejections_total` - Version-stamp mismatches
//! - `kg_transaction_items_committed_total` - Storage operations committed
//! - `kg_post_commit_failures_total{stage}` - Best-effort steps that failed
//! - `kg_commit_duration_seconds` - Locking read through commit

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

#[derive(Clone)]
pub struct PipelineMetrics {
    pub actions_processed: IntCounterVec,
    pub stale_rejections: IntCounter,
    pub transaction_items_committed: IntCounter,
    pub post_commit_failures: IntCounterVec,
    pub commit_duration: Histogram,
}

impl PipelineMetrics {
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let metrics = Self::unregistered()?;
        registry.register(Box::new(metrics.actions_processed.clone()))?;
        registry.register(Box::new(metrics.stale_rejections.clone()))?;
        registry.register(Box::new(metrics.transaction_items_committed.clone()))?;
        registry.register(Box::new(metrics.post_commit_failures.clone()))?;
        registry.register(Box::new(metrics.commit_duration.clone()))?;
        Ok(metrics)
    }

    /// Metrics that are recorded but never exported.
    pub fn unregistered() -> Result<Self, prometheus::Error> {
        Ok(Self {
            actions_processed: IntCounterVec::new(
                Opts::new("kg_actions_processed_total", "Action requests processed"),
                &["action_type", "outcome"],
            )?,
            stale_rejections: IntCounter::new(
                "kg_stale_graph_rejections_total",
                "Requests rejected for a stale graph version stamp",
            )?,
            transaction_items_committed: IntCounter::new(
                "kg_transaction_items_committed_total",
                "Storage operations committed",
            )?,
            post_commit_failures: IntCounterVec::new(
                Opts::new("kg_post_commit_failures_total", "Failed post-commit steps"),
                &["stage"],
            )?,
            commit_duration: Histogram::with_opts(
                HistogramOpts::new("kg_commit_duration_seconds", "Locking read through commit")
                    .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            )?,
        })
    }

    pub fn record_outcome(&self, action_type: &str, outcome: &str) {
        self.actions_processed
            .with_label_values(&[action_type, outcome])
            .inc();
    }

    pub fn record_post_commit_failure(&self, stage: &str) {
        self.post_commit_failures.with_label_values(&[stage]).inc();
    }
}
