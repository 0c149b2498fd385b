//! # RBAC Vocabulary
//!
//! Permission names attached to org roles and app roles. Evaluation lives in
//! the access-control crate; this module only defines the vocabulary.

use serde::{Deserialize, Serialize};

/// Tenant-wide permissions granted by an org role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgPermission {
    AppsCreate,
    AppsDelete,
    AppsReadAll,
    AppsManageUsers,
    BlocksCreate,
    BlocksReadAll,
    OrgManageUsers,
    OrgManageTrust,
}

/// Permissions on a single app or block, granted through an app role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvParentPermission {
    AppRename,
    AppManageUsers,
    AppReadOwnLocals,
    AppReadUserLocals,
}

impl EnvParentPermission {
    pub const ALL: [EnvParentPermission; 4] = [
        EnvParentPermission::AppRename,
        EnvParentPermission::AppManageUsers,
        EnvParentPermission::AppReadOwnLocals,
        EnvParentPermission::AppReadUserLocals,
    ];
}

/// Permissions on one environment, granted per environment role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentPermission {
    Read,
    ReadMeta,
    ReadInherits,
    ReadHistory,
    Write,
}

impl EnvironmentPermission {
    pub const ALL: [EnvironmentPermission; 5] = [
        EnvironmentPermission::Read,
        EnvironmentPermission::ReadMeta,
        EnvironmentPermission::ReadInherits,
        EnvironmentPermission::ReadHistory,
        EnvironmentPermission::Write,
    ];
}
