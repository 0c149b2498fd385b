//! # Diff & Transaction Builder
//!
//! Merges one request's storage operations into a single bundle, in order:
//!
//! | # | Source |
//! |---|--------|
//! | 1 | plugin-declared items (and GC blob deletes) |
//! | 2 | reconciler encrypted-key deletes |
//! | 3 | graph diff, tenant root excluded |
//! | 4 | tenant root update with the bumped version stamp |
//! | 5 | secret-value puts from env params |
//!
//! When 1, 2, 3 and 5 are empty and the root itself is unchanged, the bundle
//! is empty and the stamp does not move.

use crate::domain::gc::device_like_count;
use kg_01_graph_store::{diff, org_key, Graph, StoredRecord, TransactionItems};
use shared_types::{ApiResult, GraphObject, OrgId, Timestamp};

/// Everything the builder merges.
#[derive(Debug, Clone)]
pub struct BundleInput<'a> {
    pub org_id: &'a OrgId,
    pub initial: &'a Graph,
    pub final_graph: &'a Graph,
    pub plugin_items: TransactionItems,
    pub reconciler_items: TransactionItems,
    pub env_items: TransactionItems,
    pub rbac_update: bool,
    pub full_graph_loaded: bool,
    pub now: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub items: TransactionItems,
    /// Stamped tenant root, `None` for an empty bundle.
    pub org: Option<GraphObject>,
}

impl Bundle {
    pub fn is_empty(&self) -> bool {
        self.org.is_none()
    }

    /// Version stamp written by this bundle.
    pub fn graph_updated_at(&self) -> Option<Timestamp> {
        self.org
            .as_ref()
            .and_then(GraphObject::as_org)
            .map(|org| org.graph_updated_at)
    }
}

/// Next version stamp: wall-clock time, strictly greater than the previous.
pub fn next_stamp(previous: Timestamp, now: Timestamp) -> Timestamp {
    now.max(previous.saturating_add(1))
}

pub fn build_bundle(input: BundleInput<'_>) -> ApiResult<Bundle> {
    let BundleInput {
        org_id,
        initial,
        final_graph,
        plugin_items,
        reconciler_items,
        env_items,
        rbac_update,
        full_graph_loaded,
        now,
    } = input;

    let graph_items = diff(&initial.without(org_id), &final_graph.without(org_id), org_id);

    let initial_org = initial.org()?;
    let final_org = final_graph.org()?;
    let root_changed = initial_org != final_org;

    if plugin_items.is_empty()
        && reconciler_items.is_empty()
        && graph_items.is_empty()
        && env_items.is_empty()
        && !root_changed
    {
        return Ok(Bundle {
            items: TransactionItems::default(),
            org: None,
        });
    }

    let previous_stamp = initial.org_body()?.graph_updated_at;
    let mut org = final_org.clone();
    org.updated_at = now;
    if let Some(body) = org.as_org_mut() {
        body.graph_updated_at = next_stamp(previous_stamp, now);
        if rbac_update {
            body.rbac_updated_at = Some(now);
        }
        if full_graph_loaded {
            body.device_like_count = device_like_count(final_graph, now);
        }
    }

    let root_update = TransactionItems {
        updates: vec![(org_key(org_id), StoredRecord::Graph(org.clone()))],
        ..TransactionItems::default()
    };

    let items = plugin_items
        .merged(reconciler_items)
        .merged(graph_items)
        .merged(root_update)
        .merged(env_items);

    Ok(Bundle {
        items,
        org: Some(org),
    })
}
