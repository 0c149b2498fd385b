//! Pipeline domain: request model, transition contract, cleanup passes,
//! reconciliation, concurrency checks, bundle building and the trust-anchor
//! state machine. Everything here is synchronous except the reconciler's
//! joined projections and the locked stamp check.

pub mod action;
pub mod builder;
pub mod concurrency;
pub mod gc;
pub mod reconciler;
pub mod response;
pub mod transition;
pub mod trust;

pub use action::{Action, ActionRequest, EnvParams, RequestContext};
pub use builder::{build_bundle, next_stamp, Bundle, BundleInput};
pub use concurrency::{check_stamp, verify_locked_stamp};
pub use gc::{collect_garbage, device_like_count, GcOutcome};
pub use reconciler::{plan_reencryption, reconcile, Reconciliation, ReencryptionTarget};
pub use response::{graph_patch, ApiResponse, PatchOp, ResponseBody, SessionBundle, UserGraphSnapshot};
pub use transition::{
    GraphActionSettings, GraphTransition, PostUpdateHook, ResponseKind, TransitionOutcome,
};
pub use trust::{acknowledge, ensure_no_pending_replacement, prune_replacements, trust_state, TrustState};
