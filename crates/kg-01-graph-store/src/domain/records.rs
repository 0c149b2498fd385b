//! # Stored Records
//!
//! Rows the storage boundary knows about: graph objects plus the two kinds
//! of end-to-end encrypted material that hang off the graph.
//!
//! ```text
//! pkey                                   skey
//! {org}                                  g|<type>|<ids..>
//! encryptedKeys|{org}|{user}|{device}    {envParent}|environments|{env}|{part}
//!                                        {envParent}|locals|{localsUser}|{part}
//! encryptedKeys|{org}|{generatedEnvkey}  keyableParents|{keyableParent}|{part}
//!                                        blockKeyableParents|{block}|{keyableParent}|{part}
//! encryptedBlobs|{org}                   {blobType}|{envParent}|{environment}|{part}
//! ```

use crate::domain::keys::{graph_key, DbKey, DbScope};
use serde::{Deserialize, Serialize};
use shared_types::{EncryptedData, GraphObject, ObjectId, OrgId, Timestamp};
use std::fmt;

/// Which slice of an environment's secrets a key or blob covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnvPart {
    Env,
    Meta,
    Inherits,
    Changesets,
    InheritanceOverrides,
    SubEnv,
    LocalOverrides,
}

impl EnvPart {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvPart::Env => "env",
            EnvPart::Meta => "meta",
            EnvPart::Inherits => "inherits",
            EnvPart::Changesets => "changesets",
            EnvPart::InheritanceOverrides => "inheritanceOverrides",
            EnvPart::SubEnv => "subEnv",
            EnvPart::LocalOverrides => "localOverrides",
        }
    }
}

impl fmt::Display for EnvPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a user-held key decrypts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "id")]
pub enum UserKeyTarget {
    Environment(ObjectId),
    /// Personal overrides of the given user.
    Locals(ObjectId),
}

/// Address of one encrypted key in the Encrypted Key Set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum EncryptedKeyPath {
    /// Held by a user on one device.
    User {
        user_id: ObjectId,
        device_id: ObjectId,
        env_parent_id: ObjectId,
        target: UserKeyTarget,
        part: EnvPart,
    },
    /// Held by a generated envkey, optionally for a block connected to its app.
    Envkey {
        block_id: Option<ObjectId>,
        keyable_parent_id: ObjectId,
        generated_envkey_id: ObjectId,
        part: EnvPart,
    },
}

impl EncryptedKeyPath {
    pub fn db_key(&self, org_id: &OrgId) -> DbKey {
        match self {
            EncryptedKeyPath::User {
                user_id,
                device_id,
                env_parent_id,
                target,
                part,
            } => {
                let (segment, target_id) = match target {
                    UserKeyTarget::Environment(id) => ("environments", id),
                    UserKeyTarget::Locals(id) => ("locals", id),
                };
                DbKey::new(
                    format!("encryptedKeys|{org_id}|{user_id}|{device_id}"),
                    format!("{env_parent_id}|{segment}|{target_id}|{part}"),
                )
            }
            EncryptedKeyPath::Envkey {
                block_id,
                keyable_parent_id,
                generated_envkey_id,
                part,
            } => {
                let skey = match block_id {
                    Some(block_id) => {
                        format!("blockKeyableParents|{block_id}|{keyable_parent_id}|{part}")
                    }
                    None => format!("keyableParents|{keyable_parent_id}|{part}"),
                };
                DbKey::new(format!("encryptedKeys|{org_id}|{generated_envkey_id}"), skey)
            }
        }
    }

    pub fn generated_envkey_id(&self) -> Option<&ObjectId> {
        match self {
            EncryptedKeyPath::Envkey {
                generated_envkey_id,
                ..
            } => Some(generated_envkey_id),
            EncryptedKeyPath::User { .. } => None,
        }
    }
}

/// Stored encrypted key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedKeyRecord {
    pub path: EncryptedKeyPath,
    pub data: EncryptedData,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlobType {
    Env,
    Changeset,
}

impl BlobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlobType::Env => "env",
            BlobType::Changeset => "changeset",
        }
    }
}

/// Stored encrypted blob (secret values or history).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedBlobRecord {
    pub env_parent_id: ObjectId,
    pub blob_type: BlobType,
    /// Environment id, or `"{envParentId}|{userId}"` for locals.
    pub environment_id: String,
    pub part: EnvPart,
    pub data: EncryptedData,
    pub created_at: Timestamp,
}

impl EncryptedBlobRecord {
    pub fn db_key(&self, org_id: &OrgId) -> DbKey {
        DbKey::new(
            blob_pkey(org_id),
            format!(
                "{}|{}|{}|{}",
                self.blob_type.as_str(),
                self.env_parent_id,
                self.environment_id,
                self.part
            ),
        )
    }
}

pub fn blob_pkey(org_id: &OrgId) -> String {
    format!("encryptedBlobs|{org_id}")
}

/// Locals blobs are keyed under a composite environment id.
pub fn locals_environment_id(env_parent_id: &ObjectId, user_id: &ObjectId) -> String {
    format!("{env_parent_id}|{user_id}")
}

/// Selector for a range of encrypted blobs to hard-delete.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedBlobParams {
    pub env_parent_id: ObjectId,
    pub blob_type: BlobType,
    /// `None` deletes every blob of the env parent.
    pub environment_id: Option<String>,
}

impl EncryptedBlobParams {
    pub fn db_scope(&self, org_id: &OrgId) -> DbScope {
        let mut scope = format!("{}|{}|", self.blob_type.as_str(), self.env_parent_id);
        if let Some(environment_id) = &self.environment_id {
            scope.push_str(environment_id);
            scope.push('|');
        }
        DbScope::within(blob_pkey(org_id), scope)
    }
}

/// Any row the storage boundary persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "recordType", content = "record")]
pub enum StoredRecord {
    Graph(GraphObject),
    EncryptedKey(EncryptedKeyRecord),
    EncryptedBlob(EncryptedBlobRecord),
}

impl StoredRecord {
    pub fn db_key(&self, org_id: &OrgId) -> DbKey {
        match self {
            StoredRecord::Graph(object) => graph_key(org_id, object),
            StoredRecord::EncryptedKey(key) => key.path.db_key(org_id),
            StoredRecord::EncryptedBlob(blob) => blob.db_key(org_id),
        }
    }

    pub fn as_graph(&self) -> Option<&GraphObject> {
        match self {
            StoredRecord::Graph(object) => Some(object),
            _ => None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.as_graph().map_or(false, GraphObject::is_deleted)
    }
}
