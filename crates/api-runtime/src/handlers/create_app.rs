//! # CreateApp
//!
//! Creates an app and one base environment for every environment role that
//! applies to all apps by default.

use kg_01_graph_store::Graph;
use kg_02_access_control::has_org_permission;
use kg_03_action_pipeline::{
    Action, GraphAction, GraphActionSettings, GraphTransition, TransitionOutcome,
};
use serde::{Deserialize, Serialize};
use shared_types::{
    ApiError, ApiResult, AuthContext, EnvParent, Environment, GraphObject, ObjectBody, ObjectId,
    ObjectType, OrgPermission, Timestamp,
};
use tracing::debug;

pub const CREATE_APP: &str = "CreateApp";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppPayload {
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CreateApp;

impl GraphAction for CreateApp {
    fn settings(&self) -> GraphActionSettings {
        GraphActionSettings::org_action()
    }

    fn authorize(
        &self,
        _action: &Action,
        org_graph: &Graph,
        _user_graph: &Graph,
        auth: &AuthContext,
    ) -> bool {
        has_org_permission(org_graph, &auth.user_id, OrgPermission::AppsCreate)
    }

    fn apply(
        &self,
        action: &Action,
        org_graph: &Graph,
        _auth: &AuthContext,
        now: Timestamp,
    ) -> ApiResult<TransitionOutcome> {
        let payload: CreateAppPayload = action.payload_as()?;
        let name = payload.name.trim();
        if name.is_empty() {
            return Err(ApiError::Validation("app name is empty".into()));
        }

        let app_id = ObjectId::generate();
        let mut graph = org_graph.with_object(GraphObject::new(
            app_id.clone(),
            ObjectBody::App(EnvParent {
                name: name.to_string(),
                ..EnvParent::default()
            }),
            now,
        ));

        let default_roles: Vec<ObjectId> = org_graph
            .by_type(ObjectType::EnvironmentRole)
            .filter(|object| !object.is_deleted())
            .filter(|object| {
                object
                    .as_environment_role()
                    .map_or(false, |role| role.default_all_apps)
            })
            .map(|object| object.id.clone())
            .collect();

        for environment_role_id in default_roles {
            graph = graph.with_object(GraphObject::new(
                ObjectId::generate(),
                ObjectBody::Environment(Environment {
                    env_parent_id: app_id.clone(),
                    environment_role_id,
                    is_sub: false,
                    parent_environment_id: None,
                    env_updated_at: None,
                    reencryption_required_at: None,
                }),
                now,
            ));
        }

        debug!(app_id = %app_id, "[handlers] App created");
        Ok(GraphTransition::new(graph)
            .with_log_targets([app_id])
            .into())
    }
}
