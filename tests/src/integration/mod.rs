//! Cross-crate flows, one module per scenario family.

pub mod bulk;
pub mod concurrency;
pub mod create_app;
pub mod revocation;
pub mod trust;
