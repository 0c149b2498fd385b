//! Small org graph shared by the unit tests of this crate.

use kg_01_graph_store::Graph;
use shared_types::{
    AppBlock, AppRole, AppUserGrant, EnvParent, EnvParentPermission, Environment,
    EnvironmentPermission, EnvironmentRole, GeneratedEnvkey, GraphObject, KeyableParentType,
    LocalKey, ObjectBody, Org, OrgPermission, OrgRole, OrgUser, OrgUserDevice, Pubkey, Server,
};
use std::collections::{BTreeMap, BTreeSet};

pub const ORG: &str = "org";
pub const OWNER: &str = "owner";
pub const MEMBER: &str = "member";
pub const OWNER_DEVICE: &str = "owner-device";
pub const MEMBER_DEVICE: &str = "member-device";
pub const OWNER_ROLE: &str = "org-owner";
pub const MEMBER_ROLE: &str = "org-member";
pub const DEVELOPER_ROLE: &str = "app-developer";
pub const DEV_ROLE: &str = "development";
pub const PROD_ROLE: &str = "production";
pub const APP: &str = "app";
pub const BLOCK: &str = "block";
pub const APP_BLOCK: &str = "app-block";
pub const DEV_ENV: &str = "app-dev";
pub const PROD_ENV: &str = "app-prod";
pub const BLOCK_DEV_ENV: &str = "block-dev";
pub const GRANT: &str = "grant";
pub const SERVER: &str = "server";
pub const SERVER_ENVKEY: &str = "server-envkey";
pub const LOCAL_KEY: &str = "local-key";
pub const LOCAL_ENVKEY: &str = "local-envkey";

fn object(id: &str, body: ObjectBody) -> GraphObject {
    GraphObject::new(id.into(), body, 1)
}

fn user(id: &str, role: &str) -> GraphObject {
    object(
        id,
        ObjectBody::OrgUser(OrgUser {
            email: format!("{id}@example.com"),
            org_role_id: role.into(),
            is_creator: id == OWNER,
            active: true,
            deactivated_at: None,
        }),
    )
}

fn device(id: &str, user_id: &str) -> GraphObject {
    object(
        id,
        ObjectBody::OrgUserDevice(OrgUserDevice {
            user_id: user_id.into(),
            name: id.into(),
            pubkey: Some(Pubkey(format!("{id}-pk"))),
            approved_at: Some(1),
            signed_trusted_root: None,
            trusted_root_updated_at: None,
            deactivated_at: None,
        }),
    )
}

fn environment(id: &str, parent: &str, role: &str) -> GraphObject {
    object(
        id,
        ObjectBody::Environment(Environment {
            env_parent_id: parent.into(),
            environment_role_id: role.into(),
            is_sub: false,
            parent_environment_id: None,
            env_updated_at: Some(2),
            reencryption_required_at: None,
        }),
    )
}

fn envkey(id: &str, parent: &str, parent_type: KeyableParentType, env: &str) -> GraphObject {
    object(
        id,
        ObjectBody::GeneratedEnvkey(GeneratedEnvkey {
            app_id: APP.into(),
            keyable_parent_id: parent.into(),
            keyable_parent_type: parent_type,
            environment_id: env.into(),
            envkey_id_part: format!("{id}-part"),
            pubkey: Pubkey(format!("{id}-pk")),
            blobs_updated_at: None,
            signed_trusted_root: None,
            trusted_root_updated_at: None,
        }),
    )
}

/// Owner with org-wide access, member with a developer grant on the app
/// (read on development only, own locals), one block connected to the app,
/// a production server and a member local key on development.
pub fn org_graph() -> Graph {
    let mut app_locals = BTreeMap::new();
    app_locals.insert(MEMBER.into(), 3);

    let mut env_role_permissions = BTreeMap::new();
    env_role_permissions.insert(
        DEV_ROLE.into(),
        BTreeSet::from([EnvironmentPermission::Read, EnvironmentPermission::Write]),
    );

    Graph::from_objects(vec![
        object(
            ORG,
            ObjectBody::Org(Org {
                name: "acme".into(),
                graph_updated_at: 1,
                rbac_updated_at: None,
                device_like_count: 2,
            }),
        ),
        object(
            OWNER_ROLE,
            ObjectBody::OrgRole(OrgRole {
                name: "Owner".into(),
                permissions: BTreeSet::from([
                    OrgPermission::AppsReadAll,
                    OrgPermission::BlocksReadAll,
                    OrgPermission::OrgManageUsers,
                    OrgPermission::OrgManageTrust,
                ]),
            }),
        ),
        object(
            MEMBER_ROLE,
            ObjectBody::OrgRole(OrgRole {
                name: "Member".into(),
                permissions: BTreeSet::new(),
            }),
        ),
        object(
            DEVELOPER_ROLE,
            ObjectBody::AppRole(AppRole {
                name: "Developer".into(),
                default_all_apps: false,
                env_parent_permissions: BTreeSet::from([EnvParentPermission::AppReadOwnLocals]),
                environment_role_permissions: env_role_permissions,
            }),
        ),
        object(
            DEV_ROLE,
            ObjectBody::EnvironmentRole(EnvironmentRole {
                name: "Development".into(),
                default_all_apps: true,
                default_all_blocks: true,
            }),
        ),
        object(
            PROD_ROLE,
            ObjectBody::EnvironmentRole(EnvironmentRole {
                name: "Production".into(),
                default_all_apps: true,
                default_all_blocks: true,
            }),
        ),
        user(OWNER, OWNER_ROLE),
        user(MEMBER, MEMBER_ROLE),
        device(OWNER_DEVICE, OWNER),
        device(MEMBER_DEVICE, MEMBER),
        object(
            APP,
            ObjectBody::App(EnvParent {
                name: "api".into(),
                locals_updated_at_by_user_id: app_locals,
                locals_encrypted_by: BTreeMap::from([(MEMBER.into(), MEMBER.into())]),
                locals_reencryption_required_at: BTreeMap::new(),
            }),
        ),
        object(
            BLOCK,
            ObjectBody::Block(EnvParent {
                name: "shared".into(),
                ..EnvParent::default()
            }),
        ),
        object(
            APP_BLOCK,
            ObjectBody::AppBlock(AppBlock {
                app_id: APP.into(),
                block_id: BLOCK.into(),
                order_index: 0,
            }),
        ),
        environment(DEV_ENV, APP, DEV_ROLE),
        environment(PROD_ENV, APP, PROD_ROLE),
        environment(BLOCK_DEV_ENV, BLOCK, DEV_ROLE),
        object(
            GRANT,
            ObjectBody::AppUserGrant(AppUserGrant {
                app_id: APP.into(),
                user_id: MEMBER.into(),
                app_role_id: DEVELOPER_ROLE.into(),
            }),
        ),
        object(
            SERVER,
            ObjectBody::Server(Server {
                app_id: APP.into(),
                environment_id: PROD_ENV.into(),
                name: "prod-server".into(),
            }),
        ),
        envkey(SERVER_ENVKEY, SERVER, KeyableParentType::Server, PROD_ENV),
        object(
            LOCAL_KEY,
            ObjectBody::LocalKey(LocalKey {
                app_id: APP.into(),
                environment_id: DEV_ENV.into(),
                user_id: MEMBER.into(),
                device_id: Some(MEMBER_DEVICE.into()),
                name: "laptop".into(),
            }),
        ),
        envkey(LOCAL_ENVKEY, LOCAL_KEY, KeyableParentType::LocalKey, DEV_ENV),
    ])
}
