//! # Outbound Ports (Driven Ports)
//!
//! The storage boundary. The pipeline never issues queries outside it.
//!
//! Production: a relational store with ACID transactions and row locks.
//! Testing: `InMemoryGraphStorage` (adapters/memory.rs).

use crate::domain::errors::StorageResult;
use crate::domain::keys::{DbKey, ScopeKey};
use crate::domain::records::StoredRecord;
use crate::domain::transaction::Statement;
use async_trait::async_trait;
use shared_types::{GraphObject, OrgId};
use uuid::Uuid;

/// An open storage transaction bound to one tenant.
///
/// Owned by exactly one request. Must be handed back through
/// [`GraphStorage::release`] on every path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionHandle {
    pub id: Uuid,
    pub org_id: OrgId,
}

/// Selection of rows in one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageQuery {
    pub pkey: String,
    /// `None` selects the whole partition.
    pub scopes: Option<Vec<ScopeKey>>,
    /// Explicit keys, unioned with `scopes` when both are set.
    pub keys: Vec<DbKey>,
    pub include_deleted: bool,
}

impl StorageQuery {
    /// Every live row of the tenant graph partition.
    pub fn graph(org_id: &OrgId) -> Self {
        Self {
            pkey: org_id.as_str().to_string(),
            scopes: None,
            keys: Vec::new(),
            include_deleted: false,
        }
    }

    /// Live graph rows matching any of `scopes`.
    pub fn graph_scoped(org_id: &OrgId, scopes: Vec<ScopeKey>) -> Self {
        Self {
            scopes: Some(scopes),
            ..Self::graph(org_id)
        }
    }

    /// Exactly these keys, deleted rows included.
    pub fn keys(keys: Vec<DbKey>) -> Self {
        Self {
            pkey: keys.first().map(|key| key.pkey.clone()).unwrap_or_default(),
            scopes: Some(Vec::new()),
            keys,
            include_deleted: true,
        }
    }

    pub fn matches(&self, key: &DbKey) -> bool {
        if self.keys.contains(key) {
            return true;
        }
        if key.pkey != self.pkey {
            return false;
        }
        match &self.scopes {
            None => true,
            Some(scopes) => scopes.iter().any(|scope| scope.matches(&key.skey)),
        }
    }
}

/// Transactional storage for tenant graphs and encrypted material.
#[async_trait]
pub trait GraphStorage: Send + Sync {
    /// Begin a transaction for `org_id`.
    async fn open_transaction(&self, org_id: &OrgId) -> StorageResult<TransactionHandle>;

    /// Read rows visible to the transaction.
    async fn query(
        &self,
        query: &StorageQuery,
        txn: &TransactionHandle,
    ) -> StorageResult<Vec<StoredRecord>>;

    /// Lock the tenant root row for the rest of the transaction and return
    /// its current contents. Blocks while another transaction holds it.
    async fn locking_read(&self, txn: &TransactionHandle) -> StorageResult<GraphObject>;

    /// Stage statements inside the transaction.
    async fn execute_statements(
        &self,
        statements: Vec<Statement>,
        txn: &TransactionHandle,
    ) -> StorageResult<()>;

    /// Atomically apply every staged statement.
    async fn commit(&self, txn: &TransactionHandle) -> StorageResult<()>;

    /// Discard staged statements.
    async fn rollback(&self, txn: &TransactionHandle) -> StorageResult<()>;

    /// Return the transaction's connection and drop any locks it holds.
    async fn release(&self, txn: &TransactionHandle);
}
