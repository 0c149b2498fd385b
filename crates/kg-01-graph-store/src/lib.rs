//! # kg-01-graph-store
//!
//! Tenant graph model and the transactional storage boundary.
//!
//! ## Overview
//!
//! This crate provides:
//! - **Graph**: copy-on-write id → object map with structural sharing
//! - **Keys**: partition/sort keys and scope-key prefix matching
//! - **Diff**: `(previous, next)` graph pair → storage operations
//! - **Transaction Items**: mergeable bundle flattened into ordered statements
//! - **Storage Port**: transactions, scoped reads, tenant root locking
//!
//! ## Architecture
//!
//! ```text
//! Action Pipeline (kg-03)
//!     │
//!     ├── load_org_graph(scopes) ──→ GraphStorage::query
//!     │
//!     ├── diff(prev, next) ──→ TransactionItems ──→ Vec<Statement>
//!     │
//!     └── locking_read ─→ execute_statements ─→ commit ─→ release
//! ```
//!
//! ## Storage Layout
//!
//! | Partition | Rows |
//! |-----------|------|
//! | `{org}` | graph objects, `g|<type>|<ids..>` |
//! | `encryptedKeys|{org}|..` | per-user and per-envkey encrypted keys |
//! | `encryptedBlobs|{org}` | encrypted env and changeset blobs |
//!
//! ## Example
//!
//! ```rust,ignore
//! use kg_01_graph_store::{load_org_graph, diff, GraphStorage, InMemoryGraphStorage};
//!
//! let storage = InMemoryGraphStorage::new();
//! let txn = storage.open_transaction(&org_id).await?;
//! let graph = load_org_graph(&storage, &txn, None).await?;
//! let items = diff(&graph, &next, &org_id);
//! storage.execute_statements(items.to_statements(&org_id), &txn).await?;
//! storage.commit(&txn).await?;
//! storage.release(&txn).await;
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use domain::{
    blob_pkey, diff, graph_key, locals_environment_id, org_key, BlobType, DbKey, DbScope,
    EncryptedBlobParams, EncryptedBlobRecord, EncryptedKeyPath, EncryptedKeyRecord, EnvPart,
    Graph, GraphError, GraphResult, ScopeKey, SoftDelete, Statement, StorageError, StorageResult,
    StoredRecord, TransactionItems, UserKeyTarget,
};
pub use ports::outbound::{GraphStorage, StorageQuery, TransactionHandle};
pub use service::load_org_graph;

#[cfg(feature = "in-memory")]
pub use adapters::InMemoryGraphStorage;
