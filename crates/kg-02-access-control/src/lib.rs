//! # kg-02-access-control
//!
//! Everything the pipeline derives from the graph's access-control
//! relationships.
//!
//! ## Overview
//!
//! - **Scope Resolver**: staged scope predicates → minimal graph load
//! - **RBAC**: org, env-parent and environment permissions of a principal
//! - **User Graph**: injectable evaluator for what a principal may see
//! - **Encrypted Key Set**: projection of who should hold which encrypted key
//!
//! ## Architecture
//!
//! ```text
//! Action Pipeline (kg-03)
//!     │
//!     ├── resolve_scopes(predicates) ──→ Graph Store (kg-01)
//!     │
//!     ├── UserGraphEvaluator::user_graph(org_graph, auth)
//!     │
//!     └── KeySet::compute(before) − KeySet::compute(after) ──→ keys to purge
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use domain::{
    blocks_for_app, can_keep_locals, can_read_locals, env_parent_permissions,
    environment_permissions, has_org_permission, live_principal, org_permissions, KeySet,
    OrgAccessScope, ScopeFilter, CLI_DEVICE_ID,
};
pub use ports::outbound::UserGraphEvaluator;
pub use service::{base_scopes, resolve_scopes, ResolvedScope, ScopePredicate};

#[cfg(feature = "rbac-evaluator")]
pub use adapters::RbacUserGraphEvaluator;
