//! # UpdateTrustedRoot
//!
//! Acknowledges one or more root pubkey replacements for the calling device
//! (token session) or CLI user, and stores the principal's re-signed trusted
//! root. Runs outside the graph-action path so a principal blocked by a
//! pending replacement can still clear it.

use crate::domain::{acknowledge, Action};
use crate::ports::plugin::{NonGraphAction, NonGraphContext, NonGraphOutcome};
use async_trait::async_trait;
use kg_01_graph_store::{
    diff, load_org_graph, Graph, GraphStorage, ScopeKey, StorageQuery, StoredRecord,
};
use serde::{Deserialize, Serialize};
use shared_types::{ApiError, ApiResult, AuthContext, ObjectId, ObjectType, SignedData};
use tracing::info;

pub const UPDATE_TRUSTED_ROOT: &str = "UpdateTrustedRoot";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTrustedRootPayload {
    pub replacement_ids: Vec<ObjectId>,
    pub signed_trusted_root: SignedData,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateTrustedRoot;

#[async_trait]
impl NonGraphAction for UpdateTrustedRoot {
    fn authorize(&self, _action: &Action, auth: Option<&AuthContext>) -> bool {
        auth.is_some()
    }

    async fn handle(&self, action: &Action, ctx: NonGraphContext<'_>) -> ApiResult<NonGraphOutcome> {
        let auth = ctx.auth.ok_or(ApiError::AuthenticationRequired)?;
        let payload: UpdateTrustedRootPayload = action.payload_as()?;
        let keyable_id = auth.keyable_id();
        let now = ctx.now;

        let graph = load_org_graph(ctx.storage, ctx.txn, None).await?;
        let graph = with_deleted_replacements(&ctx, graph, &payload.replacement_ids).await?;

        let mut next = graph.clone();
        for replacement_id in &payload.replacement_ids {
            next = acknowledge(&next, replacement_id, keyable_id, now)?;
        }

        let principal = next
            .get_active(keyable_id)
            .ok_or_else(|| ApiError::NotFound(format!("keyable principal {keyable_id}")))?;
        if principal.as_device().is_none() && principal.as_cli_user().is_none() {
            return Err(ApiError::Validation(format!(
                "{keyable_id} cannot hold a trusted root"
            )));
        }

        let signed = payload.signed_trusted_root.clone();
        next = next.with_updated(keyable_id, |object| {
            object.updated_at = now;
            if let Some(device) = object.as_device_mut() {
                device.signed_trusted_root = Some(signed);
                device.trusted_root_updated_at = Some(now);
            } else if let Some(cli_user) = object.as_cli_user_mut() {
                cli_user.signed_trusted_root = Some(signed);
                cli_user.trusted_root_updated_at = Some(now);
            }
        })?;

        info!(
            org_id = %ctx.txn.org_id,
            keyable_id = %keyable_id,
            replacements = payload.replacement_ids.len(),
            "[kg-03] Trusted root updated"
        );

        Ok(NonGraphOutcome::success().with_transaction_items(diff(&graph, &next, &ctx.txn.org_id)))
    }
}

/// Add tombstoned replacement rows named in the request, so acknowledging a
/// deleted record is rejected as already processed rather than unknown.
async fn with_deleted_replacements(
    ctx: &NonGraphContext<'_>,
    graph: Graph,
    replacement_ids: &[ObjectId],
) -> ApiResult<Graph> {
    let missing: Vec<&ObjectId> = replacement_ids
        .iter()
        .filter(|id| !graph.contains(id))
        .collect();
    if missing.is_empty() {
        return Ok(graph);
    }

    let query = StorageQuery {
        include_deleted: true,
        ..StorageQuery::graph_scoped(
            &ctx.txn.org_id,
            vec![ScopeKey::for_type(ObjectType::RootPubkeyReplacement)],
        )
    };
    let records = ctx.storage.query(&query, ctx.txn).await?;
    Ok(records
        .into_iter()
        .filter_map(|record| match record {
            StoredRecord::Graph(object) if object.is_deleted() && missing.contains(&&object.id) => {
                Some(object)
            }
            _ => None,
        })
        .fold(graph, |graph, object| graph.with_object(object)))
}
