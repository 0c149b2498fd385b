//! # Scope Resolver
//!
//! Loads the smallest slice of the tenant graph an action (or a batch of
//! actions) needs.
//!
//! ```text
//! base scopes ──load──→ G0
//!   step 0: predicates[0] of every action (G0) ──load new keys──→ G1 = G0 ∪ slice
//!   step 1: predicates[1] of every action (G1) ──load new keys──→ G2 = G1 ∪ slice
//!   ...
//! ```
//!
//! Any action without predicates forces a full load, and a full load is
//! what enables the post-transition garbage collector.

use kg_01_graph_store::{load_org_graph, Graph, GraphStorage, ScopeKey, StorageResult, TransactionHandle};
use shared_types::ObjectType;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Given the graph loaded so far, the scope keys an action needs next.
pub type ScopePredicate = Box<dyn Fn(&Graph) -> BTreeSet<ScopeKey> + Send + Sync>;

/// Object types every scoped load includes: the tenant root, principals and
/// roles needed for authorization, and trust replacements for the pending
/// check.
pub const BASE_SCOPE_TYPES: [ObjectType; 7] = [
    ObjectType::OrgUser,
    ObjectType::CliUser,
    ObjectType::OrgUserDevice,
    ObjectType::OrgRole,
    ObjectType::AppRole,
    ObjectType::EnvironmentRole,
    ObjectType::RootPubkeyReplacement,
];

pub fn base_scopes() -> BTreeSet<ScopeKey> {
    std::iter::once(ScopeKey::org())
        .chain(BASE_SCOPE_TYPES.iter().map(|t| ScopeKey::for_type(*t)))
        .collect()
}

/// Result of scope resolution.
#[derive(Clone)]
pub struct ResolvedScope {
    pub graph: Graph,
    /// `None` when the whole tenant graph was loaded.
    pub scopes: Option<BTreeSet<ScopeKey>>,
}

impl ResolvedScope {
    pub fn is_full(&self) -> bool {
        self.scopes.is_none()
    }
}

impl fmt::Debug for ResolvedScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedScope")
            .field("objects", &self.graph.len())
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Resolve and load the scopes of one or more actions.
///
/// `predicate_sets` holds one entry per action. Predicates at the same index
/// across actions are evaluated together against the graph accumulated by
/// every earlier step.
pub async fn resolve_scopes<S>(
    storage: &S,
    txn: &TransactionHandle,
    predicate_sets: &[Option<Vec<ScopePredicate>>],
) -> StorageResult<ResolvedScope>
where
    S: GraphStorage + ?Sized,
{
    if predicate_sets.is_empty() || predicate_sets.iter().any(Option::is_none) {
        let graph = load_org_graph(storage, txn, None).await?;
        return Ok(ResolvedScope {
            graph,
            scopes: None,
        });
    }

    let mut scopes = base_scopes();
    let initial: Vec<ScopeKey> = scopes.iter().cloned().collect();
    let mut graph = load_org_graph(storage, txn, Some(&initial)).await?;

    let depth = predicate_sets
        .iter()
        .flatten()
        .map(Vec::len)
        .max()
        .unwrap_or(0);

    for step in 0..depth {
        let mut wanted = BTreeSet::new();
        for predicates in predicate_sets.iter().flatten() {
            if let Some(predicate) = predicates.get(step) {
                wanted.extend(predicate(&graph));
            }
        }

        let fresh: Vec<ScopeKey> = wanted
            .into_iter()
            .filter(|key| !scopes.contains(key))
            .collect();
        if fresh.is_empty() {
            continue;
        }

        let slice = load_org_graph(storage, txn, Some(&fresh)).await?;
        debug!(
            org_id = %txn.org_id,
            step,
            new_scopes = fresh.len(),
            loaded = slice.len(),
            "[kg-02] Widened scoped graph"
        );
        graph = graph.merged(&slice);
        scopes.extend(fresh);
    }

    Ok(ResolvedScope {
        graph,
        scopes: Some(scopes),
    })
}
