//! Access-control domain: RBAC evaluation over the graph, the access scope
//! restriction and the encrypted key set projection.

pub mod access_scope;
pub mod key_set;
pub mod permissions;

#[cfg(test)]
pub(crate) mod fixtures;

pub use access_scope::{OrgAccessScope, ScopeFilter};
pub use key_set::{KeySet, CLI_DEVICE_ID};
pub use permissions::{
    app_role_for, apps_for_block, blocks_for_app, can_keep_locals, can_read_locals,
    env_parent_permissions, environment_permissions, has_full_access, has_org_permission,
    live_principal, org_permissions,
};
