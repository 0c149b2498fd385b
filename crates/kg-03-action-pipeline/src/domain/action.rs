//! Request model: actions, bulk batches and per-request context.

use kg_01_graph_store::{EncryptedBlobRecord, EncryptedKeyRecord, StoredRecord, TransactionItems};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{ApiError, ApiResult, Credentials, ObjectId, OrgId, Timestamp};
use std::collections::BTreeSet;

/// Encrypted material attached to a secret-value mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvParams {
    #[serde(default)]
    pub keys: Vec<EncryptedKeyRecord>,
    #[serde(default)]
    pub blobs: Vec<EncryptedBlobRecord>,
}

impl EnvParams {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.blobs.is_empty()
    }

    /// Value-storage puts for the bundle.
    pub fn to_items(&self) -> TransactionItems {
        TransactionItems {
            puts: self
                .keys
                .iter()
                .cloned()
                .map(StoredRecord::EncryptedKey)
                .chain(self.blobs.iter().cloned().map(StoredRecord::EncryptedBlob))
                .collect(),
            ..TransactionItems::default()
        }
    }

    /// Generated envkeys whose keys are rewritten by this payload.
    pub fn generated_envkey_ids(&self) -> BTreeSet<ObjectId> {
        self.keys
            .iter()
            .filter_map(|key| key.path.generated_envkey_id().cloned())
            .collect()
    }
}

/// One business action as submitted by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: String,
    /// Version stamp the client last observed.
    #[serde(default)]
    pub graph_updated_at: Option<Timestamp>,
    #[serde(default)]
    pub skip_graph_updated_at_check: bool,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub env_params: Option<EnvParams>,
}

impl Action {
    pub fn new(action_type: impl Into<String>, payload: Value) -> Self {
        Self {
            action_type: action_type.into(),
            graph_updated_at: None,
            skip_graph_updated_at_check: false,
            payload,
            env_params: None,
        }
    }

    #[must_use]
    pub fn with_graph_updated_at(mut self, stamp: Timestamp) -> Self {
        self.graph_updated_at = Some(stamp);
        self
    }

    #[must_use]
    pub fn skipping_stamp_check(mut self) -> Self {
        self.skip_graph_updated_at_check = true;
        self
    }

    #[must_use]
    pub fn with_env_params(mut self, env_params: EnvParams) -> Self {
        self.env_params = Some(env_params);
        self
    }

    /// Deserialize the payload, mapping shape errors to a validation failure.
    pub fn payload_as<T: DeserializeOwned>(&self) -> ApiResult<T> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            ApiError::Validation(format!("{} payload: {e}", self.action_type))
        })
    }
}

/// A single action or an ordered batch sharing one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "actions")]
pub enum ActionRequest {
    Single(Action),
    Bulk(Vec<Action>),
}

impl ActionRequest {
    pub fn actions(&self) -> &[Action] {
        match self {
            ActionRequest::Single(action) => std::slice::from_ref(action),
            ActionRequest::Bulk(actions) => actions,
        }
    }

    pub fn is_bulk(&self) -> bool {
        matches!(self, ActionRequest::Bulk(_))
    }

    /// Action types in submission order.
    pub fn action_types(&self) -> Vec<String> {
        self.actions()
            .iter()
            .map(|action| action.action_type.clone())
            .collect()
    }
}

impl From<Action> for ActionRequest {
    fn from(action: Action) -> Self {
        ActionRequest::Single(action)
    }
}

/// Transport-level context of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub org_id: OrgId,
    pub credentials: Option<Credentials>,
    pub ip: Option<String>,
}

impl RequestContext {
    pub fn new(org_id: OrgId) -> Self {
        Self {
            org_id,
            credentials: None,
            ip: None,
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    #[must_use]
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }
}
