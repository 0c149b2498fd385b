//! # Plugin Contracts
//!
//! Business actions plug into the pipeline through one of two traits.
//!
//! | Trait | Runs inside | Sees |
//! |-------|-------------|------|
//! | [`GraphAction`] | scope load → authorize → apply → GC → reconcile → commit | org graph, user graph, identity |
//! | [`NonGraphAction`] | its own transaction, no stamp check | storage port, identity |
//!
//! Graph actions are pure functions of their inputs: anything they create,
//! including fresh ids, must be captured in the returned graph.

use crate::domain::{Action, GraphActionSettings, ResponseBody, TransitionOutcome};
use async_trait::async_trait;
use kg_01_graph_store::{Graph, GraphStorage, TransactionHandle, TransactionItems};
use kg_02_access_control::ScopePredicate;
use shared_types::{ApiResult, AuthContext, ObjectId, Timestamp};
use std::collections::BTreeSet;

/// A graph-mutating business action.
pub trait GraphAction: Send + Sync {
    fn settings(&self) -> GraphActionSettings {
        GraphActionSettings::default()
    }

    /// Staged scope predicates. `None` loads the whole tenant graph.
    fn scope_predicates(&self, _auth: &AuthContext, _action: &Action) -> Option<Vec<ScopePredicate>> {
        None
    }

    fn authorize(
        &self,
        action: &Action,
        org_graph: &Graph,
        user_graph: &Graph,
        auth: &AuthContext,
    ) -> bool;

    fn apply(
        &self,
        action: &Action,
        org_graph: &Graph,
        auth: &AuthContext,
        now: Timestamp,
    ) -> ApiResult<TransitionOutcome>;

    /// Objects the audit log should attribute this action to.
    fn log_target_ids(&self, _action: &Action, _transition_graph: &Graph) -> BTreeSet<ObjectId> {
        BTreeSet::new()
    }
}

/// Borrowed access a non-graph handler gets to the open transaction.
pub struct NonGraphContext<'a> {
    pub storage: &'a dyn GraphStorage,
    pub txn: &'a TransactionHandle,
    pub auth: Option<&'a AuthContext>,
    pub now: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NonGraphOutcome {
    pub body: ResponseBody,
    /// Committed in the handler's transaction when non-empty.
    pub transaction_items: TransactionItems,
}

impl NonGraphOutcome {
    pub fn success() -> Self {
        Self {
            body: ResponseBody::Success,
            transaction_items: TransactionItems::default(),
        }
    }

    #[must_use]
    pub fn with_transaction_items(mut self, items: TransactionItems) -> Self {
        self.transaction_items.merge(items);
        self
    }
}

/// An action handled outside the graph transition machinery.
#[async_trait]
pub trait NonGraphAction: Send + Sync {
    fn authorize(&self, action: &Action, auth: Option<&AuthContext>) -> bool;

    async fn handle(&self, action: &Action, ctx: NonGraphContext<'_>) -> ApiResult<NonGraphOutcome>;
}
