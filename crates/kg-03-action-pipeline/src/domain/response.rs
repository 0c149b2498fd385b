//! Response shapes. Every response carries the version stamp the caller
//! should present next.

use kg_01_graph_store::Graph;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{ApiError, ApiResult, GraphObject, ObjectId, Timestamp};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One JSON-patch style operation over the user graph, keyed by object id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    Add { path: String, value: Value },
    Replace { path: String, value: Value },
    Remove { path: String },
}

impl PatchOp {
    pub fn path(&self) -> &str {
        match self {
            PatchOp::Add { path, .. } | PatchOp::Replace { path, .. } | PatchOp::Remove { path } => {
                path
            }
        }
    }
}

fn object_path(id: &ObjectId) -> String {
    format!("/{id}")
}

fn to_value(object: &GraphObject) -> ApiResult<Value> {
    serde_json::to_value(object)
        .map_err(|e| ApiError::Internal(format!("serializing {}: {e}", object.id)))
}

/// Patch turning `before` into `after`. Soft-deleted objects count as absent.
pub fn graph_patch(before: &Graph, after: &Graph) -> ApiResult<Vec<PatchOp>> {
    let mut ops = Vec::new();

    for object in after.iter().filter(|object| !object.is_deleted()) {
        match before.get_active(&object.id) {
            None => ops.push(PatchOp::Add {
                path: object_path(&object.id),
                value: to_value(object)?,
            }),
            Some(previous) if previous != object => ops.push(PatchOp::Replace {
                path: object_path(&object.id),
                value: to_value(object)?,
            }),
            Some(_) => {}
        }
    }

    for object in before.iter().filter(|object| !object.is_deleted()) {
        if after.get_active(&object.id).is_none() {
            ops.push(PatchOp::Remove {
                path: object_path(&object.id),
            });
        }
    }

    Ok(ops)
}

/// Full user graph as returned on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserGraphSnapshot(pub BTreeMap<ObjectId, GraphObject>);

impl From<&Graph> for UserGraphSnapshot {
    fn from(graph: &Graph) -> Self {
        Self(
            graph
                .iter()
                .filter(|object| !object.is_deleted())
                .map(|object| (object.id.clone(), object.clone()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionBundle {
    pub user_id: ObjectId,
    pub device_id: Option<ObjectId>,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "data")]
pub enum ResponseBody {
    Diffs(Vec<PatchOp>),
    Graph(UserGraphSnapshot),
    Success,
    Session(SessionBundle),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    /// New stamp when something was committed, else the previous one.
    pub graph_updated_at: Timestamp,
    pub transaction_id: Uuid,
    pub body: ResponseBody,
}

impl ApiResponse {
    /// Concatenated diffs, or `None` for other bodies.
    pub fn diffs(&self) -> Option<&[PatchOp]> {
        match &self.body {
            ResponseBody::Diffs(ops) => Some(ops),
            _ => None,
        }
    }
}
