//! # Graph Diff
//!
//! Pure, order-independent conversion of a `(previous, next)` graph pair into
//! storage operations:
//!
//! | previous | next | operation |
//! |----------|------|-----------|
//! | absent | live | put |
//! | live, different | live | put |
//! | live | soft-deleted | soft delete |
//! | live, different body | soft-deleted | soft delete + put |
//! | live | absent | hard delete |
//!
//! Unchanged entries (same allocation or equal contents) produce nothing, so
//! `diff(g, g)` is always empty.

use crate::domain::graph::Graph;
use crate::domain::keys::graph_key;
use crate::domain::records::StoredRecord;
use crate::domain::transaction::{SoftDelete, TransactionItems};
use shared_types::OrgId;
use std::sync::Arc;

pub fn diff(previous: &Graph, next: &Graph, org_id: &OrgId) -> TransactionItems {
    let mut items = TransactionItems::new();

    for (id, next_object) in next.entries() {
        let previous_object = previous.entry(id);

        if let Some(deleted_at) = next_object.deleted_at {
            if let Some(prev) = previous_object.filter(|prev| !prev.is_deleted()) {
                items.soft_delete_keys.push(SoftDelete {
                    target: graph_key(org_id, prev),
                    deleted_at,
                });
                // Changed in the same transition: the tombstone must carry the new fields.
                if prev.body != next_object.body {
                    items.puts.push(StoredRecord::Graph(next_object.as_ref().clone()));
                }
            }
            continue;
        }

        match previous_object {
            Some(prev) if Arc::ptr_eq(prev, next_object) || prev == next_object => {}
            Some(prev) => {
                let old_key = graph_key(org_id, prev);
                if old_key != graph_key(org_id, next_object) && !prev.is_deleted() {
                    items.hard_delete_keys.push(old_key);
                }
                items.puts.push(StoredRecord::Graph(next_object.as_ref().clone()));
            }
            None => items.puts.push(StoredRecord::Graph(next_object.as_ref().clone())),
        }
    }

    for (id, previous_object) in previous.entries() {
        if !next.contains(id) && !previous_object.is_deleted() {
            items.hard_delete_keys.push(graph_key(org_id, previous_object));
        }
    }

    items
}
