//! # Outbound Ports
//!
//! The user graph is computed by an injectable evaluator so deployments can
//! swap in their own visibility rules.
//!
//! Default: `RbacUserGraphEvaluator` (adapters/rbac_user_graph.rs).

use kg_01_graph_store::Graph;
use shared_types::{AuthContext, Timestamp};

/// Computes the subset of the org graph a principal may see.
///
/// Implementations must be pure: the same inputs always yield the same view,
/// and the org graph is never modified.
pub trait UserGraphEvaluator: Send + Sync {
    fn user_graph(&self, org_graph: &Graph, auth: &AuthContext, now: Timestamp) -> Graph;
}
