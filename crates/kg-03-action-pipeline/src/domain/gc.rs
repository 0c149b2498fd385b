//! # Post-Transition Garbage Collector
//!
//! Deterministic cleanup applied to a transition's output graph when the
//! whole tenant graph was loaded. Passes, in order:
//!
//! 1. expired invites, device grants, recovery keys and trust replacements
//! 2. trust replacement entries for vanished principals, fully processed records
//! 3. (opt-in, tenant-scoped actions) locals of users who may no longer keep them
//!
//! Every pass is idempotent: running the collector on its own output
//! changes nothing.

use crate::domain::trust::prune_replacements;
use kg_01_graph_store::{
    locals_environment_id, BlobType, EncryptedBlobParams, Graph, TransactionItems,
};
use kg_02_access_control::can_keep_locals;
use shared_types::{ApiResult, GraphObject, ObjectBody, ObjectId, ObjectType, Timestamp};
use std::collections::BTreeMap;
use tracing::debug;

/// Collector output.
#[derive(Debug, Clone)]
pub struct GcOutcome {
    pub graph: Graph,
    /// Blob deletes for removed locals.
    pub transaction_items: TransactionItems,
    pub deleted_ids: Vec<ObjectId>,
}

/// Run every pass over `graph`.
pub fn collect_garbage(graph: &Graph, now: Timestamp, clear_orphaned_locals: bool) -> ApiResult<GcOutcome> {
    let expired = expired_auth_objects(graph, now);
    let mut next = graph.with_soft_deleted(expired.iter(), now);
    let mut deleted_ids = expired;

    let (pruned, deleted_replacements) = prune_replacements(&next, now)?;
    next = pruned;
    deleted_ids.extend(deleted_replacements);

    let mut transaction_items = TransactionItems::default();
    if clear_orphaned_locals {
        let (cleared, items) = clear_orphaned_locals_pass(&next, now)?;
        next = cleared;
        transaction_items = items;
    }

    if !deleted_ids.is_empty() || !transaction_items.is_empty() {
        debug!(
            deleted = deleted_ids.len(),
            blob_deletes = transaction_items.len(),
            "[kg-03] Garbage collected"
        );
    }

    Ok(GcOutcome {
        graph: next,
        transaction_items,
        deleted_ids,
    })
}

/// Unaccepted invite or device grant past its expiry: `(grantee, expires_at)`.
fn expired_grant(object: &GraphObject, now: Timestamp) -> Option<(&ObjectId, Timestamp)> {
    match &object.body {
        ObjectBody::Invite(invite) if invite.accepted_at.is_none() && now >= invite.expires_at => {
            Some((&invite.invitee_id, invite.expires_at))
        }
        ObjectBody::DeviceGrant(grant) if grant.accepted_at.is_none() && now >= grant.expires_at => {
            Some((&grant.grantee_id, grant.expires_at))
        }
        _ => None,
    }
}

fn expired_auth_objects(graph: &Graph, now: Timestamp) -> Vec<ObjectId> {
    let mut deleted = Vec::new();

    // Per grantee and kind, the most recently expired object stays visible.
    for object_type in [ObjectType::Invite, ObjectType::DeviceGrant] {
        let mut by_grantee: BTreeMap<&ObjectId, Vec<(Timestamp, &ObjectId)>> = BTreeMap::new();
        for object in graph.by_type(object_type) {
            if let Some((grantee, expires_at)) = expired_grant(object, now) {
                by_grantee
                    .entry(grantee)
                    .or_default()
                    .push((expires_at, &object.id));
            }
        }
        for mut expired in by_grantee.into_values() {
            expired.sort();
            expired.pop();
            deleted.extend(expired.into_iter().map(|(_, id)| id.clone()));
        }
    }

    for object in graph.by_type(ObjectType::RecoveryKey) {
        if let Some(key) = object.as_recovery_key() {
            if key.redeemed_at.is_none() && key.expires_at.map_or(false, |at| now >= at) {
                deleted.push(object.id.clone());
            }
        }
    }

    for object in graph.by_type(ObjectType::RootPubkeyReplacement) {
        if let Some(replacement) = object.as_root_pubkey_replacement() {
            if replacement.expires_at.map_or(false, |at| now >= at) {
                deleted.push(object.id.clone());
            }
        }
    }

    deleted
}

fn clear_orphaned_locals_pass(graph: &Graph, now: Timestamp) -> ApiResult<(Graph, TransactionItems)> {
    let mut next = graph.clone();
    let mut items = TransactionItems::default();

    let orphaned: Vec<(ObjectId, Vec<ObjectId>)> = graph
        .iter()
        .filter(|object| {
            !object.is_deleted()
                && matches!(object.object_type(), ObjectType::App | ObjectType::Block)
        })
        .filter_map(|object| {
            let parent = object.as_env_parent()?;
            let users: Vec<ObjectId> = parent
                .locals_updated_at_by_user_id
                .keys()
                .filter(|user_id| !can_keep_locals(graph, user_id, &object.id))
                .cloned()
                .collect();
            (!users.is_empty()).then(|| (object.id.clone(), users))
        })
        .collect();

    for (env_parent_id, users) in orphaned {
        next = next.with_updated(&env_parent_id, |object| {
            object.updated_at = now;
            if let Some(parent) = object.as_env_parent_mut() {
                for user_id in &users {
                    parent.locals_updated_at_by_user_id.remove(user_id);
                    parent.locals_encrypted_by.remove(user_id);
                    parent.locals_reencryption_required_at.remove(user_id);
                }
            }
        })?;

        for user_id in &users {
            let environment_id = locals_environment_id(&env_parent_id, user_id);
            for blob_type in [BlobType::Env, BlobType::Changeset] {
                items
                    .hard_delete_encrypted_blob_params
                    .push(EncryptedBlobParams {
                        env_parent_id: env_parent_id.clone(),
                        blob_type,
                        environment_id: Some(environment_id.clone()),
                    });
            }
        }
    }

    Ok((next, items))
}

/// Devices, CLI users and pending invites/device grants.
pub fn device_like_count(graph: &Graph, now: Timestamp) -> u32 {
    let count = graph
        .iter()
        .filter(|object| match &object.body {
            ObjectBody::OrgUserDevice(_) | ObjectBody::CliUser(_) => object.is_live(),
            ObjectBody::Invite(invite) => {
                !object.is_deleted() && invite.accepted_at.is_none() && now < invite.expires_at
            }
            ObjectBody::DeviceGrant(grant) => {
                !object.is_deleted() && grant.accepted_at.is_none() && now < grant.expires_at
            }
            _ => false,
        })
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}
