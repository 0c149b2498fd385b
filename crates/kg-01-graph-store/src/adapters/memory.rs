//! # In-Memory Graph Storage
//!
//! Test and single-node adapter for [`GraphStorage`].
//!
//! - Rows live in one ordered map keyed by [`DbKey`].
//! - Each tenant has an async mutex standing in for the row lock on its root
//!   record. A transaction acquires it in `locking_read` and keeps the owned
//!   guard until `release`.
//! - Statements are staged per transaction and applied to a copy of the rows
//!   on commit; the copy replaces the live map only if every statement
//!   succeeded.

use crate::domain::errors::{StorageError, StorageResult};
use crate::domain::keys::{org_key, DbKey};
use crate::domain::records::StoredRecord;
use crate::domain::transaction::Statement;
use crate::ports::outbound::{GraphStorage, StorageQuery, TransactionHandle};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_types::{GraphObject, OrgId, Timestamp};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};
use uuid::Uuid;

/// Default wait for the tenant lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxnState {
    Open,
    Committed,
    RolledBack,
}

struct OpenTransaction {
    org_id: OrgId,
    staged: Vec<Statement>,
    state: TxnState,
    lock: Option<OwnedMutexGuard<()>>,
}

type Rows = BTreeMap<DbKey, StoredRecord>;

pub struct InMemoryGraphStorage {
    rows: RwLock<Rows>,
    tenant_locks: Mutex<HashMap<OrgId, Arc<tokio::sync::Mutex<()>>>>,
    transactions: Mutex<HashMap<Uuid, OpenTransaction>>,
    lock_timeout: Duration,
    commits: AtomicU64,
    fail_next_commit: AtomicBool,
}

impl Default for InMemoryGraphStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGraphStorage {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            tenant_locks: Mutex::new(HashMap::new()),
            transactions: Mutex::new(HashMap::new()),
            lock_timeout,
            commits: AtomicU64::new(0),
            fail_next_commit: AtomicBool::new(false),
        }
    }

    /// Insert rows directly, bypassing transactions.
    pub fn seed(&self, org_id: &OrgId, records: impl IntoIterator<Item = StoredRecord>) {
        let mut rows = self.rows.write();
        for record in records {
            rows.insert(record.db_key(org_id), record);
        }
    }

    /// Committed rows whose partition key starts with `pkey_prefix`.
    pub fn snapshot(&self, pkey_prefix: &str) -> Vec<(DbKey, StoredRecord)> {
        self.rows
            .read()
            .iter()
            .filter(|(key, _)| key.pkey.starts_with(pkey_prefix))
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect()
    }

    pub fn get(&self, key: &DbKey) -> Option<StoredRecord> {
        self.rows.read().get(key).cloned()
    }

    /// Number of successful commits since construction.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Transactions not yet released.
    pub fn open_transaction_count(&self) -> usize {
        self.transactions.lock().len()
    }

    /// Make the next commit fail without applying anything.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    fn tenant_lock(&self, org_id: &OrgId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.tenant_locks.lock();
        Arc::clone(locks.entry(org_id.clone()).or_default())
    }

    fn ensure_open(&self, txn: &TransactionHandle) -> StorageResult<()> {
        let transactions = self.transactions.lock();
        match transactions.get(&txn.id) {
            None => Err(StorageError::TransactionNotFound(txn.id)),
            Some(open) if open.state != TxnState::Open => {
                Err(StorageError::TransactionClosed(txn.id))
            }
            Some(_) => Ok(()),
        }
    }
}

fn apply_statement(rows: &mut Rows, statement: Statement) -> StorageResult<()> {
    match statement {
        Statement::HardDeleteKey(key) => {
            rows.remove(&key);
        }
        Statement::HardDeleteScope(scope) => {
            rows.retain(|key, _| !scope.matches(key));
        }
        Statement::SoftDeleteKey { key, deleted_at } => soft_delete(rows, &key, deleted_at),
        Statement::SoftDeleteScope { scope, deleted_at } => {
            let keys: Vec<DbKey> = rows.keys().filter(|key| scope.matches(key)).cloned().collect();
            for key in keys {
                soft_delete(rows, &key, deleted_at);
            }
        }
        Statement::Put { key, record } => {
            rows.insert(key, record);
        }
        Statement::Update { key, record } => match rows.get_mut(&key) {
            Some(existing) => *existing = record,
            None => {
                return Err(StorageError::StatementFailed(format!(
                    "update of missing row {key}"
                )))
            }
        },
    }
    Ok(())
}

/// Graph rows keep a tombstone; other rows are removed outright.
fn soft_delete(rows: &mut Rows, key: &DbKey, deleted_at: Timestamp) {
    match rows.get_mut(key) {
        Some(StoredRecord::Graph(object)) => {
            if object.deleted_at.is_none() {
                object.deleted_at = Some(deleted_at);
                object.updated_at = deleted_at;
            }
        }
        Some(_) => {
            rows.remove(key);
        }
        None => {}
    }
}

#[async_trait]
impl GraphStorage for InMemoryGraphStorage {
    async fn open_transaction(&self, org_id: &OrgId) -> StorageResult<TransactionHandle> {
        if !self.rows.read().contains_key(&org_key(org_id)) {
            return Err(StorageError::TenantNotFound(org_id.clone()));
        }
        let handle = TransactionHandle {
            id: Uuid::new_v4(),
            org_id: org_id.clone(),
        };
        self.transactions.lock().insert(
            handle.id,
            OpenTransaction {
                org_id: org_id.clone(),
                staged: Vec::new(),
                state: TxnState::Open,
                lock: None,
            },
        );
        debug!(transaction_id = %handle.id, org_id = %org_id, "[kg-01] Transaction opened");
        Ok(handle)
    }

    async fn query(
        &self,
        query: &StorageQuery,
        txn: &TransactionHandle,
    ) -> StorageResult<Vec<StoredRecord>> {
        self.ensure_open(txn)?;
        let rows = self.rows.read();
        Ok(rows
            .iter()
            .filter(|(key, record)| {
                query.matches(key) && (query.include_deleted || !record.is_deleted())
            })
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn locking_read(&self, txn: &TransactionHandle) -> StorageResult<GraphObject> {
        self.ensure_open(txn)?;
        let already_held = self
            .transactions
            .lock()
            .get(&txn.id)
            .map_or(false, |open| open.lock.is_some());

        if !already_held {
            let lock = self.tenant_lock(&txn.org_id);
            let guard = tokio::time::timeout(self.lock_timeout, lock.lock_owned())
                .await
                .map_err(|_| {
                    warn!(
                        transaction_id = %txn.id,
                        org_id = %txn.org_id,
                        "[kg-01] Tenant lock wait timed out"
                    );
                    StorageError::LockTimeout {
                        org_id: txn.org_id.clone(),
                        waited_ms: u64::try_from(self.lock_timeout.as_millis()).unwrap_or(u64::MAX),
                    }
                })?;

            let mut transactions = self.transactions.lock();
            let open = transactions
                .get_mut(&txn.id)
                .ok_or(StorageError::TransactionNotFound(txn.id))?;
            open.lock = Some(guard);
        }

        match self.rows.read().get(&org_key(&txn.org_id)) {
            Some(StoredRecord::Graph(object)) => Ok(object.clone()),
            _ => Err(StorageError::TenantNotFound(txn.org_id.clone())),
        }
    }

    async fn execute_statements(
        &self,
        statements: Vec<Statement>,
        txn: &TransactionHandle,
    ) -> StorageResult<()> {
        let mut transactions = self.transactions.lock();
        let open = transactions
            .get_mut(&txn.id)
            .ok_or(StorageError::TransactionNotFound(txn.id))?;
        if open.state != TxnState::Open {
            return Err(StorageError::TransactionClosed(txn.id));
        }
        open.staged.extend(statements);
        Ok(())
    }

    async fn commit(&self, txn: &TransactionHandle) -> StorageResult<()> {
        let staged = {
            let mut transactions = self.transactions.lock();
            let open = transactions
                .get_mut(&txn.id)
                .ok_or(StorageError::TransactionNotFound(txn.id))?;
            if open.state != TxnState::Open {
                return Err(StorageError::TransactionClosed(txn.id));
            }
            std::mem::take(&mut open.staged)
        };

        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StorageError::Backend("injected commit failure".into()));
        }

        let statement_count = staged.len();
        {
            let mut rows = self.rows.write();
            let mut next = rows.clone();
            for statement in staged {
                apply_statement(&mut next, statement)?;
            }
            *rows = next;
        }

        if let Some(open) = self.transactions.lock().get_mut(&txn.id) {
            open.state = TxnState::Committed;
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        debug!(
            transaction_id = %txn.id,
            statements = statement_count,
            "[kg-01] Transaction committed"
        );
        Ok(())
    }

    async fn rollback(&self, txn: &TransactionHandle) -> StorageResult<()> {
        let mut transactions = self.transactions.lock();
        let open = transactions
            .get_mut(&txn.id)
            .ok_or(StorageError::TransactionNotFound(txn.id))?;
        if open.state == TxnState::Committed {
            return Err(StorageError::TransactionClosed(txn.id));
        }
        open.staged.clear();
        open.state = TxnState::RolledBack;
        debug!(transaction_id = %txn.id, "[kg-01] Transaction rolled back");
        Ok(())
    }

    async fn release(&self, txn: &TransactionHandle) {
        if let Some(open) = self.transactions.lock().remove(&txn.id) {
            if open.state == TxnState::Open && !open.staged.is_empty() {
                warn!(
                    transaction_id = %txn.id,
                    org_id = %open.org_id,
                    discarded = open.staged.len(),
                    "[kg-01] Released open transaction with staged statements"
                );
            }
        }
    }
}
