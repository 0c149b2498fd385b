//! Storage adapters.

#[cfg(feature = "in-memory")]
pub mod memory;

#[cfg(feature = "in-memory")]
pub use memory::{InMemoryGraphStorage, DEFAULT_LOCK_TIMEOUT};
