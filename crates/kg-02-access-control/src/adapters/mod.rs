//! Access-control adapters.

#[cfg(feature = "rbac-evaluator")]
pub mod rbac_user_graph;

#[cfg(feature = "rbac-evaluator")]
pub use rbac_user_graph::RbacUserGraphEvaluator;
