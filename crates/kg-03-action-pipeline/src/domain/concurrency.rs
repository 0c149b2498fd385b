//! # Optimistic Concurrency
//!
//! Two checkpoints guard the version stamp:
//!
//! 1. at scope-load time, against the snapshot just loaded
//! 2. right before commit, against a locking read of the tenant root row
//!
//! The locking read serializes writers on one tenant: the second writer
//! waits, then sees the stamp the first one committed and fails.

use crate::domain::action::Action;
use kg_01_graph_store::{GraphStorage, TransactionHandle};
use shared_types::{ApiError, ApiResult, Timestamp};
use tracing::warn;

/// Compare the stamp an action presents with `current`.
pub fn check_stamp(action: &Action, current: Timestamp) -> ApiResult<()> {
    if action.skip_graph_updated_at_check {
        return Ok(());
    }
    match action.graph_updated_at {
        Some(presented) if presented == current => Ok(()),
        presented => Err(ApiError::StaleGraph { presented, current }),
    }
}

/// Lock the tenant root and re-check every sub-action's stamp against it.
pub async fn verify_locked_stamp<S>(
    storage: &S,
    txn: &TransactionHandle,
    actions: &[Action],
) -> ApiResult<Timestamp>
where
    S: GraphStorage + ?Sized,
{
    let root = storage.locking_read(txn).await?;
    let current = root
        .as_org()
        .map(|org| org.graph_updated_at)
        .ok_or_else(|| ApiError::Internal(format!("tenant root {} is not an org", root.id)))?;

    for action in actions {
        if let Err(err) = check_stamp(action, current) {
            warn!(
                org_id = %txn.org_id,
                action_type = %action.action_type,
                current,
                "[kg-03] Graph changed before commit"
            );
            return Err(err);
        }
    }
    Ok(current)
}
