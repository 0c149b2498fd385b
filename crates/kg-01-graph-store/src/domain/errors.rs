//! Error types for the graph store.

use shared_types::{ApiError, ObjectId, ObjectType, OrgId};
use thiserror::Error;
use uuid::Uuid;

/// Failures of copy-on-write graph operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Graph object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("Graph object {id} is not a {expected}")]
    TypeMismatch { id: ObjectId, expected: ObjectType },

    #[error("Graph has no tenant root object")]
    MissingOrg,
}

/// Failures at the storage boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Unknown tenant: {0}")]
    TenantNotFound(OrgId),

    #[error("Transaction {0} not found or already released")]
    TransactionNotFound(Uuid),

    #[error("Transaction {0} is no longer open")]
    TransactionClosed(Uuid),

    #[error("Timed out after {waited_ms}ms waiting for tenant lock on {org_id}")]
    LockTimeout { org_id: OrgId, waited_ms: u64 },

    #[error("Statement failed: {0}")]
    StatementFailed(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StorageResult<T> = Result<T, StorageError>;
pub type GraphResult<T> = Result<T, GraphError>;

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Storage(err.to_string())
    }
}

impl From<GraphError> for ApiError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::ObjectNotFound(id) => ApiError::NotFound(format!("graph object {id}")),
            other => ApiError::Validation(other.to_string()),
        }
    }
}
