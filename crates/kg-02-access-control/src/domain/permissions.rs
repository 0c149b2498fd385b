//! # RBAC Evaluation
//!
//! Permissions are derived from the graph on every call; nothing here is
//! cached.
//!
//! ```text
//! principal ──org_role_id──→ OrgRole ──permissions──→ OrgPermission
//!     │
//!     └──AppUserGrant(app)──→ AppRole ──env_parent_permissions──→ EnvParentPermission
//!                                 └──environment_role_permissions[role]──→ EnvironmentPermission
//!
//! block ←──AppBlock── app   (block access is inherited from connected apps)
//! ```
//!
//! `AppsReadAll` grants every permission on every app, `BlocksReadAll` on
//! every block.

use kg_01_graph_store::Graph;
use shared_types::{
    AppRole, EnvParentPermission, EnvironmentPermission, GraphObject, ObjectBody, ObjectId,
    ObjectType, OrgPermission,
};
use std::collections::BTreeSet;

/// Live org user or CLI user. Users that have not accepted their invite
/// count as principals here; callers that need an accepted user check
/// `OrgUser::active` themselves.
pub fn live_principal<'a>(graph: &'a Graph, user_id: &ObjectId) -> Option<&'a GraphObject> {
    graph.get_active(user_id).filter(|object| {
        object.is_live()
            && matches!(
                object.object_type(),
                ObjectType::OrgUser | ObjectType::CliUser
            )
    })
}

pub fn org_permissions(graph: &Graph, user_id: &ObjectId) -> BTreeSet<OrgPermission> {
    live_principal(graph, user_id)
        .and_then(GraphObject::org_role_id)
        .and_then(|role_id| graph.get_active(role_id))
        .and_then(GraphObject::as_org_role)
        .map(|role| role.permissions.clone())
        .unwrap_or_default()
}

pub fn has_org_permission(graph: &Graph, user_id: &ObjectId, permission: OrgPermission) -> bool {
    org_permissions(graph, user_id).contains(&permission)
}

/// Org-wide read access to every env parent of this kind.
pub fn has_full_access(graph: &Graph, user_id: &ObjectId, env_parent: &GraphObject) -> bool {
    let permissions = org_permissions(graph, user_id);
    match env_parent.body {
        ObjectBody::App(_) => permissions.contains(&OrgPermission::AppsReadAll),
        ObjectBody::Block(_) => permissions.contains(&OrgPermission::BlocksReadAll),
        _ => false,
    }
}

/// App role `user_id` holds on `app_id` through a live grant.
pub fn app_role_for<'a>(
    graph: &'a Graph,
    user_id: &ObjectId,
    app_id: &ObjectId,
) -> Option<&'a AppRole> {
    graph
        .by_type(ObjectType::AppUserGrant)
        .filter_map(GraphObject::as_app_user_grant)
        .find(|grant| &grant.app_id == app_id && &grant.user_id == user_id)
        .and_then(|grant| graph.get_active(&grant.app_role_id))
        .and_then(GraphObject::as_app_role)
}

/// Apps a block is connected to.
pub fn apps_for_block<'a>(
    graph: &'a Graph,
    block_id: &'a ObjectId,
) -> impl Iterator<Item = &'a ObjectId> + 'a {
    graph
        .by_type(ObjectType::AppBlock)
        .filter_map(GraphObject::as_app_block)
        .filter(move |link| &link.block_id == block_id)
        .map(|link| &link.app_id)
}

/// Blocks connected to an app.
pub fn blocks_for_app<'a>(
    graph: &'a Graph,
    app_id: &'a ObjectId,
) -> impl Iterator<Item = &'a ObjectId> + 'a {
    graph
        .by_type(ObjectType::AppBlock)
        .filter_map(GraphObject::as_app_block)
        .filter(move |link| &link.app_id == app_id)
        .map(|link| &link.block_id)
}

fn granted_roles<'a>(
    graph: &'a Graph,
    user_id: &ObjectId,
    env_parent: &'a GraphObject,
) -> Vec<&'a AppRole> {
    match env_parent.body {
        ObjectBody::App(_) => app_role_for(graph, user_id, &env_parent.id).into_iter().collect(),
        ObjectBody::Block(_) => apps_for_block(graph, &env_parent.id)
            .filter_map(|app_id| app_role_for(graph, user_id, app_id))
            .collect(),
        _ => Vec::new(),
    }
}

pub fn env_parent_permissions(
    graph: &Graph,
    user_id: &ObjectId,
    env_parent_id: &ObjectId,
) -> BTreeSet<EnvParentPermission> {
    let Some(env_parent) = graph
        .get_active(env_parent_id)
        .filter(|object| object.as_env_parent().is_some())
    else {
        return BTreeSet::new();
    };
    if live_principal(graph, user_id).is_none() {
        return BTreeSet::new();
    }
    if has_full_access(graph, user_id, env_parent) {
        return EnvParentPermission::ALL.into_iter().collect();
    }

    granted_roles(graph, user_id, env_parent)
        .into_iter()
        .flat_map(|role| role.env_parent_permissions.iter().copied())
        .collect()
}

pub fn environment_permissions(
    graph: &Graph,
    user_id: &ObjectId,
    environment_id: &ObjectId,
) -> BTreeSet<EnvironmentPermission> {
    let Some(environment) = graph
        .get_active(environment_id)
        .and_then(GraphObject::as_environment)
    else {
        return BTreeSet::new();
    };
    let Some(env_parent) = graph.get_active(&environment.env_parent_id) else {
        return BTreeSet::new();
    };
    if live_principal(graph, user_id).is_none() {
        return BTreeSet::new();
    }
    if has_full_access(graph, user_id, env_parent) {
        return EnvironmentPermission::ALL.into_iter().collect();
    }

    granted_roles(graph, user_id, env_parent)
        .into_iter()
        .filter_map(|role| {
            role.environment_role_permissions
                .get(&environment.environment_role_id)
        })
        .flat_map(|permissions| permissions.iter().copied())
        .collect()
}

/// Whether `user_id` may decrypt the locals `locals_user_id` keeps on
/// `env_parent_id`.
pub fn can_read_locals(
    graph: &Graph,
    user_id: &ObjectId,
    env_parent_id: &ObjectId,
    locals_user_id: &ObjectId,
) -> bool {
    let required = if user_id == locals_user_id {
        EnvParentPermission::AppReadOwnLocals
    } else {
        EnvParentPermission::AppReadUserLocals
    };
    live_principal(graph, locals_user_id).is_some()
        && env_parent_permissions(graph, user_id, env_parent_id).contains(&required)
}

/// Whether `user_id` may keep personal locals on `env_parent_id` at all.
pub fn can_keep_locals(graph: &Graph, user_id: &ObjectId, env_parent_id: &ObjectId) -> bool {
    if live_principal(graph, user_id).is_none() {
        return false;
    }
    has_org_permission(graph, user_id, OrgPermission::BlocksReadAll)
        || env_parent_permissions(graph, user_id, env_parent_id)
            .contains(&EnvParentPermission::AppReadOwnLocals)
}
