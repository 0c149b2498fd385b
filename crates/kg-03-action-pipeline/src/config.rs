//! Pipeline configuration.

use std::env;
use std::time::Duration;

/// Action pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// How long a request may wait for the tenant root lock.
    pub lock_timeout_ms: u64,
    /// Post-commit tasks buffered before `dispatch` waits on the worker.
    pub post_commit_queue_capacity: usize,
    /// Disable only for replay/import tooling.
    pub verify_graph_timestamps: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 10_000,
            post_commit_queue_capacity: 1024,
            verify_graph_timestamps: true,
        }
    }
}

impl PipelineConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            lock_timeout_ms: env::var("KG_LOCK_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.lock_timeout_ms),
            post_commit_queue_capacity: env::var("KG_POST_COMMIT_QUEUE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|capacity: &usize| *capacity > 0)
                .unwrap_or(defaults.post_commit_queue_capacity),
            verify_graph_timestamps: env::var("KG_VERIFY_GRAPH_TIMESTAMPS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.verify_graph_timestamps),
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}
