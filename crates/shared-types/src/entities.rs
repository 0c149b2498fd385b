//! # Graph Entities
//!
//! Every persisted tenant object is a [`GraphObject`]: common bookkeeping
//! fields plus a type-specific [`ObjectBody`].
//!
//! ## Clusters
//!
//! - **Tenant & Identity**: `Org`, `OrgUser`, `CliUser`, `OrgUserDevice`
//! - **Secrets Topology**: `App`, `Block`, `Environment`, `AppBlock`
//! - **RBAC**: `OrgRole`, `AppRole`, `EnvironmentRole`, `AppUserGrant`
//! - **Distribution**: `Server`, `LocalKey`, `GeneratedEnvkey`
//! - **Auth Objects**: `Invite`, `DeviceGrant`, `RecoveryKey`
//! - **Trust**: `RootPubkeyReplacement`, `PubkeyRevocationRequest`

use crate::crypto::{Pubkey, SignedData};
use crate::rbac::{EnvParentPermission, EnvironmentPermission, OrgPermission};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Stable identifier of a graph object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random (v4) identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Tenant identifier. The tenant root object uses the same id.
pub type OrgId = ObjectId;

// =============================================================================
// DISCRIMINANT
// =============================================================================

/// Discriminant of an [`ObjectBody`], also the second segment of graph keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjectType {
    Org,
    OrgUser,
    CliUser,
    OrgUserDevice,
    App,
    Block,
    Environment,
    EnvironmentRole,
    OrgRole,
    AppRole,
    AppUserGrant,
    AppBlock,
    Server,
    LocalKey,
    GeneratedEnvkey,
    Invite,
    DeviceGrant,
    RecoveryKey,
    RootPubkeyReplacement,
    PubkeyRevocationRequest,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Org => "org",
            ObjectType::OrgUser => "orgUser",
            ObjectType::CliUser => "cliUser",
            ObjectType::OrgUserDevice => "orgUserDevice",
            ObjectType::App => "app",
            ObjectType::Block => "block",
            ObjectType::Environment => "environment",
            ObjectType::EnvironmentRole => "environmentRole",
            ObjectType::OrgRole => "orgRole",
            ObjectType::AppRole => "appRole",
            ObjectType::AppUserGrant => "appUserGrant",
            ObjectType::AppBlock => "appBlock",
            ObjectType::Server => "server",
            ObjectType::LocalKey => "localKey",
            ObjectType::GeneratedEnvkey => "generatedEnvkey",
            ObjectType::Invite => "invite",
            ObjectType::DeviceGrant => "deviceGrant",
            ObjectType::RecoveryKey => "recoveryKey",
            ObjectType::RootPubkeyReplacement => "rootPubkeyReplacement",
            ObjectType::PubkeyRevocationRequest => "pubkeyRevocationRequest",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// GRAPH OBJECT
// =============================================================================

/// A tagged, logically deletable graph record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphObject {
    pub id: ObjectId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<Timestamp>,
    #[serde(flatten)]
    pub body: ObjectBody,
}

/// Type-specific fields of a graph object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ObjectBody {
    Org(Org),
    OrgUser(OrgUser),
    CliUser(CliUser),
    OrgUserDevice(OrgUserDevice),
    App(EnvParent),
    Block(EnvParent),
    Environment(Environment),
    EnvironmentRole(EnvironmentRole),
    OrgRole(OrgRole),
    AppRole(AppRole),
    AppUserGrant(AppUserGrant),
    AppBlock(AppBlock),
    Server(Server),
    LocalKey(LocalKey),
    GeneratedEnvkey(GeneratedEnvkey),
    Invite(Invite),
    DeviceGrant(DeviceGrant),
    RecoveryKey(RecoveryKey),
    RootPubkeyReplacement(RootPubkeyReplacement),
    PubkeyRevocationRequest(PubkeyRevocationRequest),
}

impl ObjectBody {
    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectBody::Org(_) => ObjectType::Org,
            ObjectBody::OrgUser(_) => ObjectType::OrgUser,
            ObjectBody::CliUser(_) => ObjectType::CliUser,
            ObjectBody::OrgUserDevice(_) => ObjectType::OrgUserDevice,
            ObjectBody::App(_) => ObjectType::App,
            ObjectBody::Block(_) => ObjectType::Block,
            ObjectBody::Environment(_) => ObjectType::Environment,
            ObjectBody::EnvironmentRole(_) => ObjectType::EnvironmentRole,
            ObjectBody::OrgRole(_) => ObjectType::OrgRole,
            ObjectBody::AppRole(_) => ObjectType::AppRole,
            ObjectBody::AppUserGrant(_) => ObjectType::AppUserGrant,
            ObjectBody::AppBlock(_) => ObjectType::AppBlock,
            ObjectBody::Server(_) => ObjectType::Server,
            ObjectBody::LocalKey(_) => ObjectType::LocalKey,
            ObjectBody::GeneratedEnvkey(_) => ObjectType::GeneratedEnvkey,
            ObjectBody::Invite(_) => ObjectType::Invite,
            ObjectBody::DeviceGrant(_) => ObjectType::DeviceGrant,
            ObjectBody::RecoveryKey(_) => ObjectType::RecoveryKey,
            ObjectBody::RootPubkeyReplacement(_) => ObjectType::RootPubkeyReplacement,
            ObjectBody::PubkeyRevocationRequest(_) => ObjectType::PubkeyRevocationRequest,
        }
    }
}

macro_rules! body_accessors {
    ($( $variant:ident => $as_ref:ident, $as_mut:ident : $ty:ty; )*) => {
        impl GraphObject {
            $(
                pub fn $as_ref(&self) -> Option<&$ty> {
                    match &self.body {
                        ObjectBody::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }

                pub fn $as_mut(&mut self) -> Option<&mut $ty> {
                    match &mut self.body {
                        ObjectBody::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
            )*
        }
    };
}

body_accessors! {
    Org => as_org, as_org_mut: Org;
    OrgUser => as_org_user, as_org_user_mut: OrgUser;
    CliUser => as_cli_user, as_cli_user_mut: CliUser;
    OrgUserDevice => as_device, as_device_mut: OrgUserDevice;
    Environment => as_environment, as_environment_mut: Environment;
    EnvironmentRole => as_environment_role, as_environment_role_mut: EnvironmentRole;
    OrgRole => as_org_role, as_org_role_mut: OrgRole;
    AppRole => as_app_role, as_app_role_mut: AppRole;
    AppUserGrant => as_app_user_grant, as_app_user_grant_mut: AppUserGrant;
    AppBlock => as_app_block, as_app_block_mut: AppBlock;
    Server => as_server, as_server_mut: Server;
    LocalKey => as_local_key, as_local_key_mut: LocalKey;
    GeneratedEnvkey => as_generated_envkey, as_generated_envkey_mut: GeneratedEnvkey;
    Invite => as_invite, as_invite_mut: Invite;
    DeviceGrant => as_device_grant, as_device_grant_mut: DeviceGrant;
    RecoveryKey => as_recovery_key, as_recovery_key_mut: RecoveryKey;
    RootPubkeyReplacement => as_root_pubkey_replacement, as_root_pubkey_replacement_mut: RootPubkeyReplacement;
    PubkeyRevocationRequest => as_pubkey_revocation_request, as_pubkey_revocation_request_mut: PubkeyRevocationRequest;
}

impl GraphObject {
    pub fn new(id: ObjectId, body: ObjectBody, now: Timestamp) -> Self {
        Self {
            id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            body,
        }
    }

    pub fn object_type(&self) -> ObjectType {
        self.body.object_type()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Deactivation timestamp for principals that support it.
    pub fn deactivated_at(&self) -> Option<Timestamp> {
        match &self.body {
            ObjectBody::OrgUser(user) => user.deactivated_at,
            ObjectBody::CliUser(user) => user.deactivated_at,
            ObjectBody::OrgUserDevice(device) => device.deactivated_at,
            _ => None,
        }
    }

    /// Neither deleted nor deactivated.
    pub fn is_live(&self) -> bool {
        !self.is_deleted() && self.deactivated_at().is_none()
    }

    /// Apps and blocks share the env-parent shape.
    pub fn as_env_parent(&self) -> Option<&EnvParent> {
        match &self.body {
            ObjectBody::App(parent) | ObjectBody::Block(parent) => Some(parent),
            _ => None,
        }
    }

    pub fn as_env_parent_mut(&mut self) -> Option<&mut EnvParent> {
        match &mut self.body {
            ObjectBody::App(parent) | ObjectBody::Block(parent) => Some(parent),
            _ => None,
        }
    }

    /// Org role of an org user or CLI user.
    pub fn org_role_id(&self) -> Option<&ObjectId> {
        match &self.body {
            ObjectBody::OrgUser(user) => Some(&user.org_role_id),
            ObjectBody::CliUser(user) => Some(&user.org_role_id),
            _ => None,
        }
    }

    /// Ids used after the type segment of this object's graph key, in order.
    /// Child objects are keyed under their parent so scope prefixes can select
    /// a whole subtree.
    pub fn key_ids(&self) -> Vec<&ObjectId> {
        match &self.body {
            ObjectBody::Org(_) => Vec::new(),
            ObjectBody::Environment(env) => vec![&env.env_parent_id, &self.id],
            ObjectBody::AppUserGrant(grant) => vec![&grant.app_id, &grant.user_id, &self.id],
            ObjectBody::AppBlock(link) => vec![&link.app_id, &link.block_id, &self.id],
            ObjectBody::Server(server) => vec![&server.app_id, &self.id],
            ObjectBody::LocalKey(key) => vec![&key.app_id, &self.id],
            ObjectBody::GeneratedEnvkey(envkey) => vec![&envkey.keyable_parent_id, &self.id],
            ObjectBody::OrgUserDevice(device) => vec![&device.user_id, &self.id],
            _ => vec![&self.id],
        }
    }
}

// =============================================================================
// TENANT & IDENTITY
// =============================================================================

/// Tenant root. Holds the version stamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Org {
    pub name: String,
    /// Version stamp for optimistic concurrency.
    pub graph_updated_at: Timestamp,
    #[serde(default)]
    pub rbac_updated_at: Option<Timestamp>,
    /// Devices, CLI users and pending invites/grants.
    #[serde(default)]
    pub device_like_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgUser {
    pub email: String,
    pub org_role_id: ObjectId,
    #[serde(default)]
    pub is_creator: bool,
    /// False until the user accepts an invite.
    pub active: bool,
    #[serde(default)]
    pub deactivated_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliUser {
    pub name: String,
    pub org_role_id: ObjectId,
    pub pubkey: Pubkey,
    #[serde(default)]
    pub signed_trusted_root: Option<SignedData>,
    #[serde(default)]
    pub trusted_root_updated_at: Option<Timestamp>,
    #[serde(default)]
    pub deactivated_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgUserDevice {
    pub user_id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub pubkey: Option<Pubkey>,
    #[serde(default)]
    pub approved_at: Option<Timestamp>,
    #[serde(default)]
    pub signed_trusted_root: Option<SignedData>,
    #[serde(default)]
    pub trusted_root_updated_at: Option<Timestamp>,
    #[serde(default)]
    pub deactivated_at: Option<Timestamp>,
}

// =============================================================================
// SECRETS TOPOLOGY
// =============================================================================

/// Shared shape of apps and blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvParent {
    pub name: String,
    /// Users whose personal (local) overrides exist, with last write time.
    #[serde(default)]
    pub locals_updated_at_by_user_id: BTreeMap<ObjectId, Timestamp>,
    /// Locals user id -> id of the user who encrypted them.
    #[serde(default)]
    pub locals_encrypted_by: BTreeMap<ObjectId, ObjectId>,
    #[serde(default)]
    pub locals_reencryption_required_at: BTreeMap<ObjectId, Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub env_parent_id: ObjectId,
    pub environment_role_id: ObjectId,
    #[serde(default)]
    pub is_sub: bool,
    #[serde(default)]
    pub parent_environment_id: Option<ObjectId>,
    /// Set once any secret value has been written.
    #[serde(default)]
    pub env_updated_at: Option<Timestamp>,
    #[serde(default)]
    pub reencryption_required_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppBlock {
    pub app_id: ObjectId,
    pub block_id: ObjectId,
    #[serde(default)]
    pub order_index: u32,
}

// =============================================================================
// RBAC
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentRole {
    pub name: String,
    #[serde(default)]
    pub default_all_apps: bool,
    #[serde(default)]
    pub default_all_blocks: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgRole {
    pub name: String,
    pub permissions: BTreeSet<OrgPermission>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRole {
    pub name: String,
    #[serde(default)]
    pub default_all_apps: bool,
    pub env_parent_permissions: BTreeSet<EnvParentPermission>,
    /// Environment role id -> permissions on environments of that role.
    pub environment_role_permissions: BTreeMap<ObjectId, BTreeSet<EnvironmentPermission>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUserGrant {
    pub app_id: ObjectId,
    pub user_id: ObjectId,
    pub app_role_id: ObjectId,
}

// =============================================================================
// DISTRIBUTION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    pub app_id: ObjectId,
    pub environment_id: ObjectId,
    pub name: String,
}

/// A user's personal development key for one app environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalKey {
    pub app_id: ObjectId,
    pub environment_id: ObjectId,
    pub user_id: ObjectId,
    #[serde(default)]
    pub device_id: Option<ObjectId>,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyableParentType {
    Server,
    LocalKey,
}

/// Secret-distribution artifact: an ENVKEY issued to a server or local key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedEnvkey {
    pub app_id: ObjectId,
    pub keyable_parent_id: ObjectId,
    pub keyable_parent_type: KeyableParentType,
    pub environment_id: ObjectId,
    pub envkey_id_part: String,
    pub pubkey: Pubkey,
    /// Bumped whenever the artifact's encrypted payload must be re-fetched.
    #[serde(default)]
    pub blobs_updated_at: Option<Timestamp>,
    #[serde(default)]
    pub signed_trusted_root: Option<SignedData>,
    #[serde(default)]
    pub trusted_root_updated_at: Option<Timestamp>,
}

// =============================================================================
// AUTH OBJECTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invite {
    pub invitee_id: ObjectId,
    pub invited_by_user_id: ObjectId,
    pub expires_at: Timestamp,
    #[serde(default)]
    pub accepted_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceGrant {
    pub grantee_id: ObjectId,
    pub granted_by_user_id: ObjectId,
    pub expires_at: Timestamp,
    #[serde(default)]
    pub accepted_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryKey {
    pub user_id: ObjectId,
    #[serde(default)]
    pub expires_at: Option<Timestamp>,
    #[serde(default)]
    pub redeemed_at: Option<Timestamp>,
}

// =============================================================================
// TRUST
// =============================================================================

/// Pending rotation of the root signing key.
///
/// `processed_at_by_id` maps each keyable principal (device, CLI user,
/// generated envkey) to `None` while its acknowledgement is pending, or to
/// the acknowledgement time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootPubkeyReplacement {
    pub requesting_device_id: ObjectId,
    pub replacing_pubkey_id: ObjectId,
    pub replacing_pubkey: Pubkey,
    pub signed_replacing_trusted_pubkeys: SignedData,
    pub processed_at_by_id: BTreeMap<ObjectId, Option<Timestamp>>,
    #[serde(default)]
    pub expires_at: Option<Timestamp>,
}

impl RootPubkeyReplacement {
    /// Every remaining principal has acknowledged.
    pub fn is_fully_processed(&self) -> bool {
        self.processed_at_by_id.values().all(Option::is_some)
    }

    /// `true` when `keyable_id` still owes an acknowledgement.
    pub fn is_pending_for(&self, keyable_id: &ObjectId) -> bool {
        matches!(self.processed_at_by_id.get(keyable_id), Some(None))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubkeyRevocationRequest {
    pub target_id: ObjectId,
    pub creator_id: ObjectId,
}
