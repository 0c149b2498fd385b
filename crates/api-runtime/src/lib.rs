//! # API Runtime Library
//!
//! This library exposes the internal modules of the API runtime for testing.
//! The main entry point is the `main.rs` binary.
//!
//! ## Modular Structure
//!
//! - `container/` - Configuration and service wiring
//! - `seed/` - Tenant bootstrap for the in-memory store
//! - `handlers/` - Business actions registered with the pipeline

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod container;
pub mod handlers;
pub mod seed;

pub use container::{ConfigError, RuntimeConfig, ServiceContainer};
pub use handlers::action_registry;
pub use seed::{SeedBuilder, SeedConfig, SeedError, SeededOrg};
