//! # Trust-Anchor Replacement
//!
//! ```text
//!            acknowledge (last pending entry)
//! Pending ─────────────────────────────────→ FullyAcknowledged ──→ Deleted
//!    │  acknowledge (others pending)              (soft delete,
//!    └──────────────↺                              same request)
//! ```
//!
//! Entries for principals that are gone or deactivated are pruned rather
//! than left pending. A principal with a pending replacement in its own user
//! graph may not submit graph mutations.

use kg_01_graph_store::Graph;
use shared_types::{
    ApiError, ApiResult, AuthContext, GraphObject, ObjectId, ObjectType, RootPubkeyReplacement,
    Timestamp,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustState {
    Pending,
    FullyAcknowledged,
    Deleted,
}

pub fn trust_state(object: &GraphObject) -> Option<TrustState> {
    let replacement = object.as_root_pubkey_replacement()?;
    Some(if object.is_deleted() {
        TrustState::Deleted
    } else if replacement.is_fully_processed() {
        TrustState::FullyAcknowledged
    } else {
        TrustState::Pending
    })
}

/// Record `keyable_id`'s acknowledgement of `replacement_id`.
///
/// The record is soft-deleted in the returned graph once every entry is
/// acknowledged.
pub fn acknowledge(
    graph: &Graph,
    replacement_id: &ObjectId,
    keyable_id: &ObjectId,
    now: Timestamp,
) -> ApiResult<Graph> {
    let object = graph
        .get(replacement_id)
        .filter(|object| object.object_type() == ObjectType::RootPubkeyReplacement)
        .ok_or_else(|| ApiError::NotFound(format!("root pubkey replacement {replacement_id}")))?;

    if object.is_deleted() {
        return Err(ApiError::Validation(format!(
            "root pubkey replacement {replacement_id} already deleted"
        )));
    }
    let pending = object
        .as_root_pubkey_replacement()
        .map_or(false, |replacement| replacement.is_pending_for(keyable_id));
    if !pending {
        return Err(ApiError::Validation(format!(
            "root pubkey replacement {replacement_id} is not pending for {keyable_id}"
        )));
    }

    let mut fully_processed = false;
    let next = graph.with_updated(replacement_id, |object| {
        object.updated_at = now;
        if let Some(replacement) = object.as_root_pubkey_replacement_mut() {
            replacement
                .processed_at_by_id
                .insert(keyable_id.clone(), Some(now));
            fully_processed = replacement.is_fully_processed();
        }
    })?;

    Ok(if fully_processed {
        next.with_soft_deleted([replacement_id], now)
    } else {
        next
    })
}

/// Reject callers that still owe an acknowledgement.
pub fn ensure_no_pending_replacement(user_graph: &Graph, auth: &AuthContext) -> ApiResult<()> {
    let pending = user_graph
        .by_type(ObjectType::RootPubkeyReplacement)
        .filter_map(GraphObject::as_root_pubkey_replacement)
        .any(|replacement| replacement.is_pending_for(auth.keyable_id()));
    if pending {
        Err(ApiError::TrustReplacementPending)
    } else {
        Ok(())
    }
}

/// Whether `id` still names a live object. Pending invites and device grants
/// hold entries too, so the object type is not checked.
fn keyable_exists(graph: &Graph, id: &ObjectId) -> bool {
    graph.get(id).map_or(false, GraphObject::is_live)
}

fn prune(replacement: &mut RootPubkeyReplacement, graph: &Graph) -> bool {
    let before = replacement.processed_at_by_id.len();
    replacement
        .processed_at_by_id
        .retain(|id, _| keyable_exists(graph, id));
    replacement.processed_at_by_id.len() != before
}

/// Prune entries for vanished principals and delete fully processed records.
/// Returns the new graph and the ids that were soft-deleted.
pub fn prune_replacements(graph: &Graph, now: Timestamp) -> ApiResult<(Graph, Vec<ObjectId>)> {
    let mut next = graph.clone();
    let mut deleted = Vec::new();

    let ids: Vec<ObjectId> = graph
        .by_type(ObjectType::RootPubkeyReplacement)
        .map(|object| object.id.clone())
        .collect();

    for id in ids {
        let needs_prune = graph
            .get(&id)
            .and_then(GraphObject::as_root_pubkey_replacement)
            .map_or(false, |replacement| {
                replacement
                    .processed_at_by_id
                    .keys()
                    .any(|entry| !keyable_exists(graph, entry))
            });

        if needs_prune {
            next = next.with_updated(&id, |object| {
                if let Some(replacement) = object.as_root_pubkey_replacement_mut() {
                    if prune(replacement, graph) {
                        object.updated_at = now;
                    }
                }
            })?;
        }

        let fully_processed = next
            .get(&id)
            .and_then(GraphObject::as_root_pubkey_replacement)
            .map_or(false, RootPubkeyReplacement::is_fully_processed);
        if fully_processed {
            next = next.with_soft_deleted([&id], now);
            deleted.push(id);
        }
    }

    Ok((next, deleted))
}
