//! # RevokeAppGrant
//!
//! Removes a user's app grant together with the local keys on that app the
//! user can no longer read, and the envkeys generated for those local keys.
//! Encrypted keys are reconciled over the app and its connected blocks.

use kg_01_graph_store::Graph;
use kg_02_access_control::{
    blocks_for_app, env_parent_permissions, environment_permissions, has_org_permission,
    OrgAccessScope,
};
use kg_03_action_pipeline::{
    Action, GraphAction, GraphActionSettings, GraphTransition, TransitionOutcome,
};
use serde::{Deserialize, Serialize};
use shared_types::{
    ApiError, ApiResult, AuthContext, EnvParentPermission, EnvironmentPermission, GraphObject,
    KeyableParentType, ObjectId, ObjectType, OrgPermission, Timestamp,
};
use std::collections::BTreeSet;
use tracing::debug;

pub const REVOKE_APP_GRANT: &str = "RevokeAppGrant";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeAppGrantPayload {
    /// The `AppUserGrant` to remove.
    pub id: ObjectId,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RevokeAppGrant;

impl GraphAction for RevokeAppGrant {
    fn settings(&self) -> GraphActionSettings {
        GraphActionSettings::org_action().clearing_orphaned_locals()
    }

    fn authorize(
        &self,
        action: &Action,
        org_graph: &Graph,
        _user_graph: &Graph,
        auth: &AuthContext,
    ) -> bool {
        let Ok(payload) = action.payload_as::<RevokeAppGrantPayload>() else {
            return false;
        };
        let Some(grant) = org_graph
            .get_active(&payload.id)
            .and_then(GraphObject::as_app_user_grant)
        else {
            return false;
        };
        has_org_permission(org_graph, &auth.user_id, OrgPermission::AppsManageUsers)
            || env_parent_permissions(org_graph, &auth.user_id, &grant.app_id)
                .contains(&EnvParentPermission::AppManageUsers)
    }

    fn apply(
        &self,
        action: &Action,
        org_graph: &Graph,
        _auth: &AuthContext,
        now: Timestamp,
    ) -> ApiResult<TransitionOutcome> {
        let payload: RevokeAppGrantPayload = action.payload_as()?;
        let grant = org_graph
            .get_active(&payload.id)
            .and_then(GraphObject::as_app_user_grant)
            .ok_or_else(|| ApiError::NotFound(format!("app grant {}", payload.id)))?;
        let app_id = grant.app_id.clone();
        let user_id = grant.user_id.clone();

        let without_grant = org_graph.with_soft_deleted([&payload.id], now);

        let local_key_ids: BTreeSet<ObjectId> = org_graph
            .by_type(ObjectType::LocalKey)
            .filter(|object| !object.is_deleted())
            .filter(|object| {
                object.as_local_key().map_or(false, |key| {
                    key.app_id == app_id
                        && key.user_id == user_id
                        && !environment_permissions(&without_grant, &user_id, &key.environment_id)
                            .contains(&EnvironmentPermission::Read)
                })
            })
            .map(|object| object.id.clone())
            .collect();

        let envkey_ids: BTreeSet<ObjectId> = org_graph
            .by_type(ObjectType::GeneratedEnvkey)
            .filter(|object| !object.is_deleted())
            .filter(|object| {
                object.as_generated_envkey().map_or(false, |envkey| {
                    envkey.keyable_parent_type == KeyableParentType::LocalKey
                        && local_key_ids.contains(&envkey.keyable_parent_id)
                })
            })
            .map(|object| object.id.clone())
            .collect();

        let graph = without_grant.with_soft_deleted(local_key_ids.iter().chain(&envkey_ids), now);

        let mut env_parent_ids = vec![app_id.clone()];
        env_parent_ids.extend(blocks_for_app(org_graph, &app_id).cloned());

        debug!(
            grant_id = %payload.id,
            local_keys = local_key_ids.len(),
            envkeys = envkey_ids.len(),
            "[handlers] App grant revoked"
        );

        Ok(GraphTransition::new(graph)
            .with_encrypted_keys_scope(OrgAccessScope::for_env_parents(env_parent_ids))
            .clearing_envkey_sockets(envkey_ids)
            .with_log_targets([payload.id, user_id, app_id])
            .into())
    }
}
