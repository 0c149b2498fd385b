//! # RBAC User Graph
//!
//! Default visibility rules:
//!
//! | Object | Visible when |
//! |--------|--------------|
//! | org, roles, users | always |
//! | devices | own, or `OrgManageUsers` |
//! | apps, blocks | any env-parent or environment permission |
//! | environments | any environment permission |
//! | grants, app-block links, servers | their env parents are visible |
//! | local keys | own, or `AppReadUserLocals` on the app |
//! | generated envkeys | their keyable parent is visible |
//! | invites, device grants | sender or recipient, or `OrgManageUsers` |
//! | recovery keys | own |
//! | root pubkey replacements | unexpired and pending for the caller's keyable id |
//! | revocation requests | creator, or `OrgManageTrust` |

use crate::domain::permissions::{
    env_parent_permissions, environment_permissions, has_org_permission, live_principal,
};
use crate::ports::outbound::UserGraphEvaluator;
use kg_01_graph_store::Graph;
use shared_types::{
    AuthContext, EnvParentPermission, GraphObject, ObjectBody, ObjectId, ObjectType, OrgPermission,
    Timestamp,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct RbacUserGraphEvaluator;

impl RbacUserGraphEvaluator {
    pub fn new() -> Self {
        Self
    }
}

struct Visibility<'a> {
    graph: &'a Graph,
    auth: &'a AuthContext,
    now: Timestamp,
    manage_users: bool,
    manage_trust: bool,
}

impl<'a> Visibility<'a> {
    fn env_parent(&self, id: &ObjectId) -> bool {
        if self.graph.get_active(id).is_none() {
            return false;
        }
        let user_id = &self.auth.user_id;
        if !env_parent_permissions(self.graph, user_id, id).is_empty() {
            return true;
        }
        self.graph
            .by_type(ObjectType::Environment)
            .filter(|env| {
                env.as_environment()
                    .map_or(false, |body| &body.env_parent_id == id)
            })
            .any(|env| !environment_permissions(self.graph, user_id, &env.id).is_empty())
    }

    fn environment(&self, id: &ObjectId) -> bool {
        !environment_permissions(self.graph, &self.auth.user_id, id).is_empty()
    }

    fn keyable_parent(&self, id: &ObjectId) -> bool {
        self.graph
            .get_active(id)
            .map_or(false, |object| self.object(object))
    }

    fn object(&self, object: &GraphObject) -> bool {
        let user_id = &self.auth.user_id;
        match &object.body {
            ObjectBody::Org(_)
            | ObjectBody::OrgRole(_)
            | ObjectBody::AppRole(_)
            | ObjectBody::EnvironmentRole(_)
            | ObjectBody::OrgUser(_)
            | ObjectBody::CliUser(_) => true,
            ObjectBody::OrgUserDevice(device) => &device.user_id == user_id || self.manage_users,
            ObjectBody::App(_) | ObjectBody::Block(_) => self.env_parent(&object.id),
            ObjectBody::Environment(_) => self.environment(&object.id),
            ObjectBody::AppUserGrant(grant) => self.env_parent(&grant.app_id),
            ObjectBody::AppBlock(link) => {
                self.env_parent(&link.app_id) && self.env_parent(&link.block_id)
            }
            ObjectBody::Server(server) => self.env_parent(&server.app_id),
            ObjectBody::LocalKey(key) => {
                &key.user_id == user_id
                    || env_parent_permissions(self.graph, user_id, &key.app_id)
                        .contains(&EnvParentPermission::AppReadUserLocals)
            }
            ObjectBody::GeneratedEnvkey(envkey) => self.keyable_parent(&envkey.keyable_parent_id),
            ObjectBody::Invite(invite) => {
                &invite.invitee_id == user_id
                    || &invite.invited_by_user_id == user_id
                    || self.manage_users
            }
            ObjectBody::DeviceGrant(grant) => {
                &grant.grantee_id == user_id
                    || &grant.granted_by_user_id == user_id
                    || self.manage_users
            }
            ObjectBody::RecoveryKey(key) => &key.user_id == user_id,
            ObjectBody::RootPubkeyReplacement(replacement) => {
                replacement.is_pending_for(self.auth.keyable_id())
                    && replacement.expires_at.map_or(true, |at| self.now < at)
            }
            ObjectBody::PubkeyRevocationRequest(request) => {
                &request.creator_id == user_id || self.manage_trust
            }
        }
    }
}

impl UserGraphEvaluator for RbacUserGraphEvaluator {
    fn user_graph(&self, org_graph: &Graph, auth: &AuthContext, now: Timestamp) -> Graph {
        if live_principal(org_graph, &auth.user_id).is_none() {
            return org_graph
                .org()
                .map(|org| Graph::from_objects([org.clone()]))
                .unwrap_or_default();
        }

        let visibility = Visibility {
            graph: org_graph,
            auth,
            now,
            manage_users: has_org_permission(org_graph, &auth.user_id, OrgPermission::OrgManageUsers),
            manage_trust: has_org_permission(org_graph, &auth.user_id, OrgPermission::OrgManageTrust),
        };

        org_graph
            .iter()
            .filter(|object| !object.is_deleted() && visibility.object(object))
            .cloned()
            .collect()
    }
}
