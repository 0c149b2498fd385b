//! Graph store domain: the copy-on-write graph, storage keys, stored record
//! shapes, the transaction item bundle and the graph diff.

pub mod diff;
pub mod errors;
pub mod graph;
pub mod keys;
pub mod records;
pub mod transaction;

pub use diff::diff;
pub use errors::{GraphError, GraphResult, StorageError, StorageResult};
pub use graph::Graph;
pub use keys::{graph_key, org_key, DbKey, DbScope, ScopeKey};
pub use records::{
    blob_pkey, locals_environment_id, BlobType, EncryptedBlobParams, EncryptedBlobRecord,
    EncryptedKeyPath, EncryptedKeyRecord, EnvPart, StoredRecord, UserKeyTarget,
};
pub use transaction::{SoftDelete, Statement, TransactionItems};
