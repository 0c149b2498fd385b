//! # Transaction Item Bundle
//!
//! Mergeable collection of storage operations produced by one request.
//! Merging concatenates per kind. Statement order is fixed:
//!
//! 1. hard deletes (keys also being put are skipped)
//! 2. soft deletes
//! 3. puts
//! 4. updates

use crate::domain::keys::{DbKey, DbScope};
use crate::domain::records::{EncryptedBlobParams, EncryptedKeyPath, StoredRecord};
use serde::{Deserialize, Serialize};
use shared_types::{OrgId, Timestamp};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftDelete<T> {
    pub target: T,
    pub deleted_at: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionItems {
    #[serde(default)]
    pub puts: Vec<StoredRecord>,
    /// Whole-row replacement addressed by key.
    #[serde(default)]
    pub updates: Vec<(DbKey, StoredRecord)>,
    #[serde(default)]
    pub soft_delete_keys: Vec<SoftDelete<DbKey>>,
    #[serde(default)]
    pub soft_delete_scopes: Vec<SoftDelete<DbScope>>,
    #[serde(default)]
    pub hard_delete_keys: Vec<DbKey>,
    #[serde(default)]
    pub hard_delete_scopes: Vec<DbScope>,
    #[serde(default)]
    pub hard_delete_encrypted_key_params: Vec<EncryptedKeyPath>,
    #[serde(default)]
    pub hard_delete_encrypted_blob_params: Vec<EncryptedBlobParams>,
}

/// One executable storage operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    HardDeleteKey(DbKey),
    HardDeleteScope(DbScope),
    SoftDeleteKey { key: DbKey, deleted_at: Timestamp },
    SoftDeleteScope { scope: DbScope, deleted_at: Timestamp },
    Put { key: DbKey, record: StoredRecord },
    Update { key: DbKey, record: StoredRecord },
}

impl TransactionItems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.puts.is_empty()
            && self.updates.is_empty()
            && self.soft_delete_keys.is_empty()
            && self.soft_delete_scopes.is_empty()
            && self.hard_delete_keys.is_empty()
            && self.hard_delete_scopes.is_empty()
            && self.hard_delete_encrypted_key_params.is_empty()
            && self.hard_delete_encrypted_blob_params.is_empty()
    }

    /// Total number of items across every kind.
    pub fn len(&self) -> usize {
        self.puts.len()
            + self.updates.len()
            + self.soft_delete_keys.len()
            + self.soft_delete_scopes.len()
            + self.hard_delete_keys.len()
            + self.hard_delete_scopes.len()
            + self.hard_delete_encrypted_key_params.len()
            + self.hard_delete_encrypted_blob_params.len()
    }

    /// Append every item of `other`, preserving order.
    pub fn merge(&mut self, other: TransactionItems) {
        self.puts.extend(other.puts);
        self.updates.extend(other.updates);
        self.soft_delete_keys.extend(other.soft_delete_keys);
        self.soft_delete_scopes.extend(other.soft_delete_scopes);
        self.hard_delete_keys.extend(other.hard_delete_keys);
        self.hard_delete_scopes.extend(other.hard_delete_scopes);
        self.hard_delete_encrypted_key_params
            .extend(other.hard_delete_encrypted_key_params);
        self.hard_delete_encrypted_blob_params
            .extend(other.hard_delete_encrypted_blob_params);
    }

    #[must_use]
    pub fn merged(mut self, other: TransactionItems) -> Self {
        self.merge(other);
        self
    }

    /// Flatten into ordered statements for `org_id`.
    pub fn to_statements(&self, org_id: &OrgId) -> Vec<Statement> {
        let put_keys: HashSet<DbKey> = self
            .puts
            .iter()
            .map(|record| record.db_key(org_id))
            .collect();

        let mut statements = Vec::with_capacity(self.len());

        let hard_delete_keys = self.hard_delete_keys.iter().cloned().chain(
            self.hard_delete_encrypted_key_params
                .iter()
                .map(|path| path.db_key(org_id)),
        );
        let mut seen = HashSet::new();
        for key in hard_delete_keys {
            if put_keys.contains(&key) || !seen.insert(key.clone()) {
                continue;
            }
            statements.push(Statement::HardDeleteKey(key));
        }

        for scope in self.hard_delete_scopes.iter().cloned().chain(
            self.hard_delete_encrypted_blob_params
                .iter()
                .map(|params| params.db_scope(org_id)),
        ) {
            statements.push(Statement::HardDeleteScope(scope));
        }

        for soft in &self.soft_delete_keys {
            statements.push(Statement::SoftDeleteKey {
                key: soft.target.clone(),
                deleted_at: soft.deleted_at,
            });
        }
        for soft in &self.soft_delete_scopes {
            statements.push(Statement::SoftDeleteScope {
                scope: soft.target.clone(),
                deleted_at: soft.deleted_at,
            });
        }

        for record in &self.puts {
            statements.push(Statement::Put {
                key: record.db_key(org_id),
                record: record.clone(),
            });
        }

        for (key, record) in &self.updates {
            statements.push(Statement::Update {
                key: key.clone(),
                record: record.clone(),
            });
        }

        statements
    }
}
