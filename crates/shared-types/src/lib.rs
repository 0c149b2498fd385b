//! # Shared Types Crate
//!
//! Domain entities and cross-crate types for the Keygraph action pipeline.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every graph object variant, identifier and
//!   error kind used by more than one crate is defined here.
//! - **Logical Deletion**: graph objects carry an optional `deleted_at`; they
//!   stay addressable inside a request until the diff turns them into soft
//!   deletes.
//! - **Opaque Crypto**: keys, signatures and ciphertexts are carried as opaque
//!   strings. Nothing in the pipeline interprets them.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod auth;
pub mod crypto;
pub mod entities;
pub mod errors;
pub mod rbac;
pub mod time;

pub use auth::{AuthContext, AuthType, Credentials};
pub use crypto::{EncryptedData, Pubkey, SignedData};
pub use entities::*;
pub use errors::{ApiError, ApiResult};
pub use rbac::{EnvParentPermission, EnvironmentPermission, OrgPermission};
pub use time::{Clock, FixedClock, SystemClock, Timestamp};
