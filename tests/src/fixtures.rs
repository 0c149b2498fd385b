//! # Test Harness
//!
//! A seeded tenant wired to a running pipeline:
//!
//! - owner (every org permission) and member, one device each
//! - app `api` connected to block `shared`, development and production
//! - member holds a developer grant (read/write development, own locals)
//! - a production server with an envkey, a member local key with an envkey
//! - every encrypted key the graph implies, stored as rows

use std::sync::Arc;

use api_runtime::{action_registry, SeedBuilder, SeedConfig};
use kg_01_graph_store::{org_key, EncryptedKeyRecord, Graph, InMemoryGraphStorage, StoredRecord};
use kg_02_access_control::{KeySet, OrgAccessScope};
use kg_03_action_pipeline::{
    ActionDescriptor, ActionKind, ActionPipeline, ActionRegistry, GraphAction, PipelineBuilder,
    RequestContext, StaticAuthenticator,
};
use shared_bus::{InMemoryNotificationBus, SocketEventFilter, Subscription};
use shared_types::{
    AppBlock, AppRole, AppUserGrant, AuthContext, Credentials, EncryptedData, EnvParent,
    EnvParentPermission, Environment, EnvironmentPermission, FixedClock, GeneratedEnvkey,
    GraphObject, KeyableParentType, LocalKey, ObjectBody, ObjectId, OrgUser, OrgUserDevice,
    Pubkey, Server, Timestamp,
};
use std::collections::{BTreeMap, BTreeSet};
use tokio::task::JoinHandle;

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
pub const BLOCK_DEV_ENV: &str = "block-dev";
pub const GRANT: &str = "grant";
pub const SERVER: &str = "server";
pub const SERVER_ENVKEY: &str = "server-envkey";
pub const LOCAL_KEY: &str = "local-key";
pub const LOCAL_ENVKEY: &str = "local-envkey";

pub const OWNER_TOKEN: &str = "owner-token";
pub const MEMBER_TOKEN: &str = "member-token";

/// Seed time and initial version stamp.
pub const SEEDED_AT: Timestamp = 1_000;

fn object(id: &str, body: ObjectBody) -> GraphObject {
    GraphObject::new(id.into(), body, SEEDED_AT)
}

fn environment(id: &str, parent: &str, role: &str) -> GraphObject {
    object(
        id,
        ObjectBody::Environment(Environment {
            env_parent_id: parent.into(),
            environment_role_id: role.into(),
            is_sub: false,
            parent_environment_id: None,
            env_updated_at: Some(SEEDED_AT),
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

fn device(id: &str, user_id: &str) -> GraphObject {
    object(
        id,
        ObjectBody::OrgUserDevice(OrgUserDevice {
            user_id: user_id.into(),
            name: id.into(),
            pubkey: Some(Pubkey(format!("{id}-pk"))),
            approved_at: Some(SEEDED_AT),
            signed_trusted_root: None,
            trusted_root_updated_at: None,
            deactivated_at: None,
        }),
    )
}

/// The tenant graph described in the module docs.
pub fn org_graph() -> Graph {
    let config = SeedConfig {
        org_id: ORG.into(),
        environment_roles: vec!["Development".into(), "Production".into()],
        ..SeedConfig::default()
    };
    let seeded = SeedBuilder::new(config)
        .build(SEEDED_AT)
        .expect("fixture seed config is valid");

    let mut objects: Vec<GraphObject> = seeded
        .objects
        .into_iter()
        .map(|mut object| {
            if let Some(org) = object.as_org_mut() {
                org.device_like_count = 2;
            }
            object
        })
        .collect();

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
        device(MEMBER_DEVICE, MEMBER),
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
                locals_updated_at_by_user_id: BTreeMap::from([(MEMBER.into(), SEEDED_AT)]),
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

/// Every encrypted key `graph` implies, as storable rows.
pub fn encrypted_key_rows(graph: &Graph) -> Vec<StoredRecord> {
    KeySet::compute(graph, &OrgAccessScope::all())
        .iter()
        .map(|path| {
            StoredRecord::EncryptedKey(EncryptedKeyRecord {
                path: path.clone(),
                data: EncryptedData("sealed".into()),
                created_at: SEEDED_AT,
            })
        })
        .collect()
}

/// A running pipeline over a seeded in-memory tenant.
pub struct Harness {
    pub storage: Arc<InMemoryGraphStorage>,
    pub bus: Arc<InMemoryNotificationBus>,
    pub clock: Arc<FixedClock>,
    pub pipeline: ActionPipeline,
    pub worker: JoinHandle<()>,
}

impl Harness {
    /// Runtime handlers only.
    pub fn new() -> Self {
        Self::with_actions(Vec::new())
    }

    /// Runtime handlers plus extra graph actions.
    pub fn with_actions(extra: Vec<(&str, Arc<dyn GraphAction>)>) -> Self {
        let mut registry = action_registry().expect("runtime registry");
        for (action_type, action) in extra {
            register(&mut registry, action_type, action);
        }

        let graph = org_graph();
        let storage = Arc::new(InMemoryGraphStorage::new());
        storage.seed(
            &ORG.into(),
            graph
                .iter()
                .cloned()
                .map(StoredRecord::Graph)
                .chain(encrypted_key_rows(&graph)),
        );

        let authenticator = StaticAuthenticator::new();
        authenticator.insert(
            OWNER_TOKEN,
            AuthContext::session(ORG.into(), OWNER.into(), OWNER_DEVICE.into()),
        );
        authenticator.insert(
            MEMBER_TOKEN,
            AuthContext::session(ORG.into(), MEMBER.into(), MEMBER_DEVICE.into()),
        );

        let bus = Arc::new(InMemoryNotificationBus::new());
        let clock = Arc::new(FixedClock::new(SEEDED_AT + 1_000));
        let (pipeline, worker) = PipelineBuilder::new()
            .storage(Arc::clone(&storage) as _)
            .notifications(Arc::clone(&bus) as _)
            .authenticator(Arc::new(authenticator))
            .clock(Arc::clone(&clock) as _)
            .registry(registry)
            .start()
            .expect("pipeline wiring is complete");

        Self {
            storage,
            bus,
            clock,
            pipeline,
            worker,
        }
    }

    pub fn owner(&self) -> RequestContext {
        RequestContext::new(ORG.into()).with_credentials(Credentials::token(OWNER_TOKEN))
    }

    pub fn member(&self) -> RequestContext {
        RequestContext::new(ORG.into()).with_credentials(Credentials::token(MEMBER_TOKEN))
    }

    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe(SocketEventFilter::all())
    }

    /// Committed version stamp of the tenant.
    pub fn stamp(&self) -> Timestamp {
        self.storage
            .get(&org_key(&ORG.into()))
            .and_then(|record| {
                record
                    .as_graph()
                    .and_then(GraphObject::as_org)
                    .map(|org| org.graph_updated_at)
            })
            .expect("tenant root is seeded")
    }

    /// Committed row of a graph object, deleted or not.
    pub fn object(&self, id: &str) -> Option<GraphObject> {
        let id = ObjectId::from(id);
        self.storage
            .snapshot(ORG)
            .into_iter()
            .filter_map(|(_, record)| match record {
                StoredRecord::Graph(object) if object.id == id => Some(object),
                _ => None,
            })
            .next()
    }

    /// Committed live graph objects of the tenant.
    pub fn live_graph(&self) -> Graph {
        Graph::from_objects(
            self.storage
                .snapshot(ORG)
                .into_iter()
                .filter_map(|(_, record)| match record {
                    StoredRecord::Graph(object) if !object.is_deleted() => Some(object),
                    _ => None,
                }),
        )
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

fn register(registry: &mut ActionRegistry, action_type: &str, action: Arc<dyn GraphAction>) {
    let descriptor = ActionDescriptor {
        action_type: action_type.to_string(),
        authenticated: true,
        kind: ActionKind::Graph(action),
    };
    registry
        .register(descriptor)
        .unwrap_or_else(|e| panic!("register {action_type}: {e}"));
}
