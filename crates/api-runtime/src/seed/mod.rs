//! # Seed Module
//!
//! Tenant bootstrap for the in-memory store.
//!
//! A seeded tenant holds:
//!
//! - the tenant root with its version stamp set to the seed time
//! - an owner org role carrying every org permission, and a basic role
//! - one environment role per configured name, applied to all apps and blocks
//! - the owner user and one approved device
//!
//! Seeding writes rows directly and bypasses the action pipeline.

pub mod builder;

pub use builder::{SeedBuilder, SeedConfig, SeedError, SeededOrg};
