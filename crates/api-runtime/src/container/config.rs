//! # Runtime Configuration
//!
//! Everything the service container needs, loaded from defaults and then
//! overridden from the environment.

use kg_03_action_pipeline::PipelineConfig;
use std::env;
use thiserror::Error;

/// Token seeded for the demo owner when none is configured.
pub const DEFAULT_DEMO_TOKEN: &str = "keygraph-dev-token";

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Action pipeline settings.
    pub pipeline: PipelineConfig,
    /// Demo tenant seeded at startup.
    pub demo: DemoConfig,
    /// Socket events buffered per subscriber.
    pub notification_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            demo: DemoConfig::default(),
            notification_capacity: 1024,
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `KG_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            pipeline: PipelineConfig::from_env(),
            demo: DemoConfig::from_env(),
            notification_capacity: env::var("KG_NOTIFICATION_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.notification_capacity),
        }
    }

    /// Refuse settings that are only acceptable on a developer machine.
    pub fn validate_for_production(&self) -> Result<(), ConfigError> {
        if self.demo.token == DEFAULT_DEMO_TOKEN {
            return Err(ConfigError::InsecureDemoToken);
        }
        self.validate()
    }

    /// Structural checks applied in every environment.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notification_capacity == 0 {
            return Err(ConfigError::Invalid(
                "notification capacity must be positive".into(),
            ));
        }
        if self.pipeline.post_commit_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "post-commit queue capacity must be positive".into(),
            ));
        }
        if self.demo.org_id.trim().is_empty() {
            return Err(ConfigError::Invalid("demo org id is empty".into()));
        }
        Ok(())
    }
}

/// Demo tenant seeded into the in-memory store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoConfig {
    pub org_id: String,
    pub org_name: String,
    pub owner_email: String,
    /// Session token mapped to the owner's device.
    pub token: String,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            org_id: "demo-org".to_string(),
            org_name: "Demo Org".to_string(),
            owner_email: "owner@example.com".to_string(),
            token: DEFAULT_DEMO_TOKEN.to_string(),
        }
    }
}

impl DemoConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            org_id: env::var("KG_DEMO_ORG_ID").unwrap_or(defaults.org_id),
            org_name: env::var("KG_DEMO_ORG_NAME").unwrap_or(defaults.org_name),
            owner_email: env::var("KG_DEMO_OWNER_EMAIL").unwrap_or(defaults.owner_email),
            token: env::var("KG_DEMO_TOKEN").unwrap_or(defaults.token),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "SECURITY VIOLATION: demo session token is the built-in default. \
         Set KG_DEMO_TOKEN."
    )]
    InsecureDemoToken,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
