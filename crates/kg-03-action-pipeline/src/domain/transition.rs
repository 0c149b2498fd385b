//! # Transition Contract
//!
//! What a graph action hands back to the pipeline. The pipeline consumes
//! only these declarations and never looks inside the plugin.
//!
//! | Field | Consumed by |
//! |-------|-------------|
//! | `graph` | GC, reconciler, diff |
//! | `transaction_items` | bundle builder (first) |
//! | `background_items` | post-commit worker, fresh transaction |
//! | `encrypted_keys_scope` | reconciler |
//! | `clear_user_sockets`, `clear_envkey_sockets` | post-commit worker |
//! | `updated_generated_envkey_ids` | `blobs_updated_at` bump, envkey events |
//! | `post_update_actions` | post-commit worker |

use crate::domain::response::ResponseBody;
use kg_01_graph_store::{Graph, TransactionItems};
use kg_02_access_control::OrgAccessScope;
use shared_types::ObjectId;
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Shape of the response a graph action produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseKind {
    /// Patch diff of the caller's user graph.
    #[default]
    Diffs,
    /// Full user graph snapshot.
    Graph,
    /// Plain success.
    Ok,
}

/// Static settings declared by a graph action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphActionSettings {
    /// Tenant-scoped action.
    pub org_action: bool,
    /// Opt-in for the orphaned-locals GC pass (tenant-scoped actions only).
    pub should_clear_orphaned_locals: bool,
    /// Also bump `rbac_updated_at` on the tenant root.
    pub rbac_update: bool,
    pub response_kind: ResponseKind,
}

impl GraphActionSettings {
    pub fn org_action() -> Self {
        Self {
            org_action: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn clearing_orphaned_locals(mut self) -> Self {
        self.should_clear_orphaned_locals = true;
        self
    }

    #[must_use]
    pub fn rbac(mut self) -> Self {
        self.rbac_update = true;
        self
    }

    #[must_use]
    pub fn responding_with(mut self, response_kind: ResponseKind) -> Self {
        self.response_kind = response_kind;
        self
    }
}

/// Best-effort async work run after commit.
pub type PostUpdateHook = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// Graph-mutating transition result.
pub struct GraphTransition {
    pub graph: Graph,
    pub transaction_items: TransactionItems,
    pub background_items: TransactionItems,
    pub encrypted_keys_scope: Option<OrgAccessScope>,
    pub clear_user_sockets: BTreeSet<ObjectId>,
    pub clear_envkey_sockets: BTreeSet<ObjectId>,
    /// Declared envkey refreshes; `None` lets the pipeline infer them.
    pub updated_generated_envkey_ids: Option<BTreeSet<ObjectId>>,
    pub post_update_actions: Vec<PostUpdateHook>,
    pub log_target_ids: BTreeSet<ObjectId>,
}

impl GraphTransition {
    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            transaction_items: TransactionItems::default(),
            background_items: TransactionItems::default(),
            encrypted_keys_scope: None,
            clear_user_sockets: BTreeSet::new(),
            clear_envkey_sockets: BTreeSet::new(),
            updated_generated_envkey_ids: None,
            post_update_actions: Vec::new(),
            log_target_ids: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_transaction_items(mut self, items: TransactionItems) -> Self {
        self.transaction_items.merge(items);
        self
    }

    #[must_use]
    pub fn with_background_items(mut self, items: TransactionItems) -> Self {
        self.background_items.merge(items);
        self
    }

    #[must_use]
    pub fn with_encrypted_keys_scope(mut self, scope: OrgAccessScope) -> Self {
        self.encrypted_keys_scope = Some(scope);
        self
    }

    #[must_use]
    pub fn clearing_user_sockets(mut self, user_ids: impl IntoIterator<Item = ObjectId>) -> Self {
        self.clear_user_sockets.extend(user_ids);
        self
    }

    #[must_use]
    pub fn clearing_envkey_sockets(
        mut self,
        generated_envkey_ids: impl IntoIterator<Item = ObjectId>,
    ) -> Self {
        self.clear_envkey_sockets.extend(generated_envkey_ids);
        self
    }

    #[must_use]
    pub fn with_updated_generated_envkey_ids(
        mut self,
        ids: impl IntoIterator<Item = ObjectId>,
    ) -> Self {
        self.updated_generated_envkey_ids = Some(ids.into_iter().collect());
        self
    }

    #[must_use]
    pub fn with_post_update(mut self, hook: PostUpdateHook) -> Self {
        self.post_update_actions.push(hook);
        self
    }

    #[must_use]
    pub fn with_log_targets(mut self, ids: impl IntoIterator<Item = ObjectId>) -> Self {
        self.log_target_ids.extend(ids);
        self
    }
}

impl fmt::Debug for GraphTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphTransition")
            .field("objects", &self.graph.len())
            .field("transaction_items", &self.transaction_items.len())
            .field("background_items", &self.background_items.len())
            .field("encrypted_keys_scope", &self.encrypted_keys_scope)
            .field("clear_user_sockets", &self.clear_user_sockets)
            .field("clear_envkey_sockets", &self.clear_envkey_sockets)
            .field("updated_generated_envkey_ids", &self.updated_generated_envkey_ids)
            .field("post_update_actions", &self.post_update_actions.len())
            .finish()
    }
}

/// Either a terminal response or a new graph.
#[derive(Debug)]
pub enum TransitionOutcome {
    Response(ResponseBody),
    Graph(GraphTransition),
}

impl From<GraphTransition> for TransitionOutcome {
    fn from(transition: GraphTransition) -> Self {
        TransitionOutcome::Graph(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kg_01_graph_store::DbKey;

    #[test]
    fn test_settings_builders() {
        let settings = GraphActionSettings::org_action()
            .clearing_orphaned_locals()
            .rbac()
            .responding_with(ResponseKind::Ok);
        assert!(settings.org_action);
        assert!(settings.should_clear_orphaned_locals);
        assert!(settings.rbac_update);
        assert_eq!(settings.response_kind, ResponseKind::Ok);
        assert_eq!(GraphActionSettings::default().response_kind, ResponseKind::Diffs);
    }

    #[test]
    fn test_transition_items_accumulate() {
        let items = TransactionItems {
            hard_delete_keys: vec![DbKey::new("p", "s")],
            ..TransactionItems::default()
        };
        let transition = GraphTransition::new(Graph::new())
            .with_transaction_items(items.clone())
            .with_transaction_items(items)
            .clearing_user_sockets(["u1".into()]);
        assert_eq!(transition.transaction_items.len(), 2);
        assert!(transition.updated_generated_envkey_ids.is_none());
        assert!(transition.clear_user_sockets.contains(&"u1".into()));
    }
}
