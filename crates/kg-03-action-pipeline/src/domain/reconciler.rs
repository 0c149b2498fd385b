//! # Encrypted Key Scope Reconciler
//!
//! ```text
//! KeySet(before, scope) ─┐
//!                        ├─→ delete-set = before − after ─→ hard deletes
//! KeySet(after,  scope) ─┘          │
//!                                   └─→ owners still present ─→ re-encryption queue
//! ```
//!
//! Both projections are computed on the blocking pool and joined before
//! anything depends on them.

use kg_01_graph_store::{EncryptedKeyPath, Graph, TransactionItems, UserKeyTarget};
use kg_02_access_control::{live_principal, KeySet, OrgAccessScope};
use shared_types::{ApiError, ApiResult, ObjectId, ObjectType, Timestamp};
use std::collections::BTreeSet;
use tracing::debug;

/// Secret material that must be re-encrypted for its remaining holders.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReencryptionTarget {
    Environment(ObjectId),
    Locals {
        env_parent_id: ObjectId,
        user_id: ObjectId,
    },
    Envkey(ObjectId),
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// Graph with re-encryption markers applied.
    pub graph: Graph,
    pub delete_keys: KeySet,
    pub reencryption_queue: BTreeSet<ReencryptionTarget>,
    /// Envkeys whose payload must be refreshed.
    pub queued_envkey_ids: BTreeSet<ObjectId>,
}

impl Reconciliation {
    /// Encrypted-key hard deletes for the bundle.
    pub fn transaction_items(&self) -> TransactionItems {
        TransactionItems {
            hard_delete_encrypted_key_params: self.delete_keys.iter().cloned().collect(),
            ..TransactionItems::default()
        }
    }
}

/// Compute the delete-set for `scope` and mark what must be re-encrypted.
pub async fn reconcile(
    before: &Graph,
    after: &Graph,
    scope: &OrgAccessScope,
    now: Timestamp,
) -> ApiResult<Reconciliation> {
    let join = |graph: Graph, scope: OrgAccessScope| {
        tokio::task::spawn_blocking(move || KeySet::compute(&graph, &scope))
    };
    let (previous, next) = tokio::try_join!(
        join(before.clone(), scope.clone()),
        join(after.clone(), scope.clone())
    )
    .map_err(|e| ApiError::Internal(format!("encrypted key projection: {e}")))?;

    let delete_keys = previous.difference(&next);
    debug!(
        before = previous.len(),
        after = next.len(),
        deleted = delete_keys.len(),
        "[kg-03] Reconciled encrypted keys"
    );
    plan_reencryption(after, delete_keys, now)
}

/// Mark re-encryption for every deleted key whose owner is still present.
pub fn plan_reencryption(
    graph: &Graph,
    delete_keys: KeySet,
    now: Timestamp,
) -> ApiResult<Reconciliation> {
    let mut queue = BTreeSet::new();

    for path in delete_keys.iter() {
        match path {
            EncryptedKeyPath::User {
                target: UserKeyTarget::Environment(environment_id),
                ..
            } => {
                if graph.get_active(environment_id).is_some() {
                    queue.insert(ReencryptionTarget::Environment(environment_id.clone()));
                }
            }
            EncryptedKeyPath::User {
                env_parent_id,
                target: UserKeyTarget::Locals(user_id),
                ..
            } => {
                if graph.get_active(env_parent_id).is_some()
                    && live_principal(graph, user_id).is_some()
                {
                    queue.insert(ReencryptionTarget::Locals {
                        env_parent_id: env_parent_id.clone(),
                        user_id: user_id.clone(),
                    });
                }
            }
            EncryptedKeyPath::Envkey {
                generated_envkey_id,
                ..
            } => {
                let live = graph
                    .get_active(generated_envkey_id)
                    .map_or(false, |object| object.object_type() == ObjectType::GeneratedEnvkey);
                if live {
                    queue.insert(ReencryptionTarget::Envkey(generated_envkey_id.clone()));
                }
            }
        }
    }

    let mut next = graph.clone();
    let mut queued_envkey_ids = BTreeSet::new();
    for target in &queue {
        match target {
            ReencryptionTarget::Environment(id) => {
                next = next.with_updated(id, |object| {
                    if let Some(environment) = object.as_environment_mut() {
                        environment.reencryption_required_at = Some(now);
                        object.updated_at = now;
                    }
                })?;
            }
            ReencryptionTarget::Locals {
                env_parent_id,
                user_id,
            } => {
                next = next.with_updated(env_parent_id, |object| {
                    if let Some(parent) = object.as_env_parent_mut() {
                        parent
                            .locals_reencryption_required_at
                            .insert(user_id.clone(), now);
                        object.updated_at = now;
                    }
                })?;
            }
            ReencryptionTarget::Envkey(id) => {
                queued_envkey_ids.insert(id.clone());
            }
        }
    }

    Ok(Reconciliation {
        graph: next,
        delete_keys,
        reencryption_queue: queue,
        queued_envkey_ids,
    })
}
