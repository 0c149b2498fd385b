//! # Graph Loading
//!
//! Reads a tenant graph (or a scoped slice of it) through the storage port.

use crate::domain::errors::StorageResult;
use crate::domain::graph::Graph;
use crate::domain::keys::ScopeKey;
use crate::domain::records::StoredRecord;
use crate::ports::outbound::{GraphStorage, StorageQuery, TransactionHandle};
use tracing::debug;

/// Load the live objects of the transaction's tenant.
///
/// `None` loads the whole graph; otherwise only objects whose skey matches
/// one of `scopes`.
pub async fn load_org_graph<S>(
    storage: &S,
    txn: &TransactionHandle,
    scopes: Option<&[ScopeKey]>,
) -> StorageResult<Graph>
where
    S: GraphStorage + ?Sized,
{
    let query = match scopes {
        None => StorageQuery::graph(&txn.org_id),
        Some(scopes) => StorageQuery::graph_scoped(&txn.org_id, scopes.to_vec()),
    };
    let records = storage.query(&query, txn).await?;

    let graph: Graph = records
        .into_iter()
        .filter_map(|record| match record {
            StoredRecord::Graph(object) if !object.is_deleted() => Some(object),
            _ => None,
        })
        .collect();

    debug!(
        org_id = %txn.org_id,
        scoped = scopes.is_some(),
        objects = graph.len(),
        "[kg-01] Loaded org graph"
    );
    Ok(graph)
}
