//! Seeded tenant plus a member with a developer grant on one app.

use crate::seed::{SeedBuilder, SeedConfig};
use kg_01_graph_store::Graph;
use shared_types::{
    AppBlock, AppRole, AppUserGrant, EnvParent, EnvParentPermission, Environment,
    EnvironmentPermission, GeneratedEnvkey, GraphObject, KeyableParentType, LocalKey, ObjectBody,
    OrgUser, OrgUserDevice, Pubkey, Server,
};
use std::collections::{BTreeMap, BTreeSet};

pub const ORG: &str = "org";
pub const OWNER: &str = "org-owner";
pub const OWNER_DEVICE: &str = "org-owner-device";
pub const MEMBER: &str = "member";
pub const MEMBER_DEVICE: &str = "member-device";
pub const DEV_ROLE: &str = "org-development";
pub const PROD_ROLE: &str = "org-production";
pub const DEVELOPER_ROLE: &str = "app-developer";
pub const APP: &str = "app";
pub const BLOCK: &str = "block";
pub const DEV_ENV: &str = "app-dev";
pub const PROD_ENV: &str = "app-prod";
pub const GRANT: &str = "grant";
pub const SERVER: &str = "server";
pub const SERVER_ENVKEY: &str = "server-envkey";
pub const LOCAL_KEY: &str = "local-key";
pub const LOCAL_ENVKEY: &str = "local-envkey";

fn object(id: &str, body: ObjectBody) -> GraphObject {
    GraphObject::new(id.into(), body, 1)
}

fn environment(id: &str, role: &str) -> GraphObject {
    object(
        id,
        ObjectBody::Environment(Environment {
            env_parent_id: APP.into(),
            environment_role_id: role.into(),
            is_sub: false,
            parent_environment_id: None,
            env_updated_at: Some(1),
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

pub fn org_graph() -> Graph {
    let config = SeedConfig {
        org_id: ORG.into(),
        environment_roles: vec!["Development".into(), "Production".into()],
        ..SeedConfig::default()
    };
    let seeded = SeedBuilder::new(config).build(1).unwrap();

    let mut objects = seeded.objects;
    objects.extend([
        object(
            MEMBER,
            ObjectBody::OrgUser(OrgUser {
                email: "member@example.com".into(),
                org_role_id: seeded.member_role_id.clone(),
                is_creator: false,
                active: true,
                deactivated_at: None,
            }),
        ),
        object(
            MEMBER_DEVICE,
            ObjectBody::OrgUserDevice(OrgUserDevice {
                user_id: MEMBER.into(),
                name: "laptop".into(),
                pubkey: Some(Pubkey("member-pk".into())),
                approved_at: Some(1),
                signed_trusted_root: None,
                trusted_root_updated_at: None,
                deactivated_at: None,
            }),
        ),
        object(
            DEVELOPER_ROLE,
            ObjectBody::AppRole(AppRole {
                name: "Developer".into(),
                default_all_apps: false,
                env_parent_permissions: BTreeSet::from([EnvParentPermission::AppReadOwnLocals]),
                environment_role_permissions: BTreeMap::from([(
                    DEV_ROLE.into(),
                    BTreeSet::from([EnvironmentPermission::Read, EnvironmentPermission::Write]),
                )]),
            }),
        ),
        object(
            APP,
            ObjectBody::App(EnvParent {
                name: "api".into(),
                locals_updated_at_by_user_id: BTreeMap::from([(MEMBER.into(), 1)]),
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
            "app-block",
            ObjectBody::AppBlock(AppBlock {
                app_id: APP.into(),
                block_id: BLOCK.into(),
                order_index: 0,
            }),
        ),
        environment(DEV_ENV, DEV_ROLE),
        environment(PROD_ENV, PROD_ROLE),
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
                name: "prod".into(),
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
    ]);
    Graph::from_objects(objects)
}
