//! # Service Container
//!
//! Central container holding the storage, notification channel,
//! authenticator and action pipeline with their wiring.

pub mod config;
pub mod services;

pub use config::{ConfigError, DemoConfig, RuntimeConfig, DEFAULT_DEMO_TOKEN};
pub use services::ServiceContainer;
