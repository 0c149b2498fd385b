//! # Encrypted Key Set
//!
//! Derived projection of who should currently hold an encrypted copy of
//! which secret material. It is recomputed from the graph's access-control
//! relationships and never stored.
//!
//! ## Key Paths
//!
//! | Holder | Target | Parts |
//! |--------|--------|-------|
//! | user device | environment | from environment permissions |
//! | user device | another user's locals | env, meta, changesets |
//! | generated envkey | app environment | env, inheritanceOverrides, subEnv, localOverrides |
//! | generated envkey | connected block environment | env, subEnv |
//!
//! Only environments that have ever been written (`env_updated_at`) carry keys.

use crate::domain::access_scope::OrgAccessScope;
use crate::domain::permissions::{blocks_for_app, can_read_locals, environment_permissions};
use kg_01_graph_store::{locals_environment_id, EncryptedKeyPath, EnvPart, Graph, UserKeyTarget};
use shared_types::{
    EnvironmentPermission, GraphObject, KeyableParentType, ObjectBody, ObjectId, ObjectType,
};
use std::collections::BTreeSet;

/// Device slot used for keys held by CLI users.
pub const CLI_DEVICE_ID: &str = "cli";

const LOCALS_PARTS: [EnvPart; 3] = [EnvPart::Env, EnvPart::Meta, EnvPart::Changesets];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySet {
    paths: BTreeSet<EncryptedKeyPath>,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Project the keys that `graph` implies, restricted to `scope`.
    pub fn compute(graph: &Graph, scope: &OrgAccessScope) -> KeySet {
        let mut paths = BTreeSet::new();
        collect_user_keys(graph, scope, &mut paths);
        collect_envkey_keys(graph, scope, &mut paths);
        KeySet { paths }
    }

    /// Keys in `self` that are absent from `other`.
    pub fn difference(&self, other: &KeySet) -> KeySet {
        KeySet {
            paths: self.paths.difference(&other.paths).cloned().collect(),
        }
    }

    pub fn contains(&self, path: &EncryptedKeyPath) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EncryptedKeyPath> {
        self.paths.iter()
    }

    pub fn into_paths(self) -> Vec<EncryptedKeyPath> {
        self.paths.into_iter().collect()
    }

    /// Generated envkeys that hold at least one key in this set.
    pub fn generated_envkey_ids(&self) -> BTreeSet<ObjectId> {
        self.paths
            .iter()
            .filter_map(EncryptedKeyPath::generated_envkey_id)
            .cloned()
            .collect()
    }
}

impl FromIterator<EncryptedKeyPath> for KeySet {
    fn from_iter<T: IntoIterator<Item = EncryptedKeyPath>>(iter: T) -> Self {
        KeySet {
            paths: iter.into_iter().collect(),
        }
    }
}

fn environment_parts(permissions: &BTreeSet<EnvironmentPermission>) -> BTreeSet<EnvPart> {
    let mut parts = BTreeSet::new();
    for permission in permissions {
        match permission {
            EnvironmentPermission::Read => {
                parts.extend([
                    EnvPart::Env,
                    EnvPart::Meta,
                    EnvPart::Inherits,
                    EnvPart::InheritanceOverrides,
                ]);
            }
            EnvironmentPermission::ReadMeta => {
                parts.insert(EnvPart::Meta);
            }
            EnvironmentPermission::ReadInherits => {
                parts.insert(EnvPart::Inherits);
            }
            EnvironmentPermission::ReadHistory => {
                parts.insert(EnvPart::Changesets);
            }
            EnvironmentPermission::Write => {}
        }
    }
    parts
}

/// Device slots of a key-holding principal, honouring the device filter.
fn key_slots(graph: &Graph, principal: &GraphObject, scope: &OrgAccessScope) -> Vec<ObjectId> {
    match &principal.body {
        ObjectBody::CliUser(_) => vec![ObjectId::new(CLI_DEVICE_ID)],
        ObjectBody::OrgUser(user) if user.active => graph
            .by_type(ObjectType::OrgUserDevice)
            .filter(|device| device.is_live() && scope.devices.contains(&device.id))
            .filter(|device| {
                device
                    .as_device()
                    .map_or(false, |d| d.user_id == principal.id && d.pubkey.is_some())
            })
            .map(|device| device.id.clone())
            .collect(),
        _ => Vec::new(),
    }
}

fn env_parents<'a>(
    graph: &'a Graph,
    scope: &'a OrgAccessScope,
) -> impl Iterator<Item = &'a GraphObject> + 'a {
    graph
        .by_type(ObjectType::App)
        .chain(graph.by_type(ObjectType::Block))
        .filter(|parent| scope.env_parents.contains(&parent.id))
}

fn collect_user_keys(graph: &Graph, scope: &OrgAccessScope, paths: &mut BTreeSet<EncryptedKeyPath>) {
    let principals = graph
        .by_type(ObjectType::OrgUser)
        .chain(graph.by_type(ObjectType::CliUser))
        .filter(|principal| principal.is_live() && scope.users.contains(&principal.id));

    for principal in principals {
        let slots = key_slots(graph, principal, scope);
        if slots.is_empty() {
            continue;
        }

        let mut targets: Vec<(ObjectId, UserKeyTarget, BTreeSet<EnvPart>)> = Vec::new();
        for parent in env_parents(graph, scope) {
            let environments = graph
                .by_type(ObjectType::Environment)
                .filter(|env| scope.environments.contains(&env.id))
                .filter_map(|env| env.as_environment().map(|body| (env, body)))
                .filter(|(_, body)| body.env_parent_id == parent.id && body.env_updated_at.is_some());

            for (env, _) in environments {
                let parts =
                    environment_parts(&environment_permissions(graph, &principal.id, &env.id));
                if !parts.is_empty() {
                    targets.push((
                        parent.id.clone(),
                        UserKeyTarget::Environment(env.id.clone()),
                        parts,
                    ));
                }
            }

            let Some(body) = parent.as_env_parent() else {
                continue;
            };
            for locals_user_id in body.locals_updated_at_by_user_id.keys() {
                let locals_env = ObjectId::new(locals_environment_id(&parent.id, locals_user_id));
                if !scope.environments.contains(&locals_env) {
                    continue;
                }
                if can_read_locals(graph, &principal.id, &parent.id, locals_user_id) {
                    targets.push((
                        parent.id.clone(),
                        UserKeyTarget::Locals(locals_user_id.clone()),
                        LOCALS_PARTS.into_iter().collect(),
                    ));
                }
            }
        }

        for device_id in &slots {
            for (env_parent_id, target, parts) in &targets {
                for part in parts {
                    paths.insert(EncryptedKeyPath::User {
                        user_id: principal.id.clone(),
                        device_id: device_id.clone(),
                        env_parent_id: env_parent_id.clone(),
                        target: target.clone(),
                        part: *part,
                    });
                }
            }
        }
    }
}

fn collect_envkey_keys(
    graph: &Graph,
    scope: &OrgAccessScope,
    paths: &mut BTreeSet<EncryptedKeyPath>,
) {
    for object in graph.by_type(ObjectType::GeneratedEnvkey) {
        let Some(envkey) = object.as_generated_envkey() else {
            continue;
        };
        if !scope.keyable_parents.contains(&envkey.keyable_parent_id)
            || !scope.env_parents.contains(&envkey.app_id)
            || !scope.environments.contains(&envkey.environment_id)
        {
            continue;
        }
        let Some(keyable_parent) = graph.get_active(&envkey.keyable_parent_id) else {
            continue;
        };
        let Some(app) = graph.get_active(&envkey.app_id).and_then(GraphObject::as_env_parent)
        else {
            continue;
        };
        let Some(environment) = graph
            .get_active(&envkey.environment_id)
            .and_then(GraphObject::as_environment)
        else {
            continue;
        };

        let mut parts = BTreeSet::new();
        if environment.env_updated_at.is_some() {
            parts.extend([EnvPart::Env, EnvPart::InheritanceOverrides]);
        }
        if environment.is_sub {
            parts.insert(EnvPart::SubEnv);
        }
        if envkey.keyable_parent_type == KeyableParentType::LocalKey {
            let has_locals = keyable_parent
                .as_local_key()
                .map_or(false, |key| app.locals_updated_at_by_user_id.contains_key(&key.user_id));
            if has_locals {
                parts.insert(EnvPart::LocalOverrides);
            }
        }
        for part in parts {
            paths.insert(EncryptedKeyPath::Envkey {
                block_id: None,
                keyable_parent_id: envkey.keyable_parent_id.clone(),
                generated_envkey_id: object.id.clone(),
                part,
            });
        }

        for block_id in blocks_for_app(graph, &envkey.app_id) {
            if !scope.env_parents.contains(block_id) || graph.get_active(block_id).is_none() {
                continue;
            }
            let block_env = graph
                .by_type(ObjectType::Environment)
                .filter_map(GraphObject::as_environment)
                .find(|env| {
                    &env.env_parent_id == block_id
                        && env.environment_role_id == environment.environment_role_id
                        && env.is_sub == environment.is_sub
                });
            let Some(block_env) = block_env else {
                continue;
            };
            let mut block_parts = Vec::new();
            if block_env.env_updated_at.is_some() {
                block_parts.push(EnvPart::Env);
            }
            if block_env.is_sub {
                block_parts.push(EnvPart::SubEnv);
            }
            for part in block_parts {
                paths.insert(EncryptedKeyPath::Envkey {
                    block_id: Some(block_id.clone()),
                    keyable_parent_id: envkey.keyable_parent_id.clone(),
                    generated_envkey_id: object.id.clone(),
                    part,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures::*;

    fn user_path(user: &str, device: &str, env: &str, part: EnvPart) -> EncryptedKeyPath {
        EncryptedKeyPath::User {
            user_id: user.into(),
            device_id: device.into(),
            env_parent_id: APP.into(),
            target: UserKeyTarget::Environment(env.into()),
            part,
        }
    }

    #[test]
    fn test_member_holds_dev_keys_only() {
        let keys = KeySet::compute(&org_graph(), &OrgAccessScope::all());
        assert!(keys.contains(&user_path(MEMBER, MEMBER_DEVICE, DEV_ENV, EnvPart::Env)));
        assert!(!keys.contains(&user_path(MEMBER, MEMBER_DEVICE, PROD_ENV, EnvPart::Env)));
        assert!(keys.contains(&user_path(OWNER, OWNER_DEVICE, PROD_ENV, EnvPart::Changesets)));
    }

    #[test]
    fn test_locals_keys() {
        let keys = KeySet::compute(&org_graph(), &OrgAccessScope::all());
        let own = EncryptedKeyPath::User {
            user_id: MEMBER.into(),
            device_id: MEMBER_DEVICE.into(),
            env_parent_id: APP.into(),
            target: UserKeyTarget::Locals(MEMBER.into()),
            part: EnvPart::Meta,
        };
        assert!(keys.contains(&own));
    }

    #[test]
    fn test_envkey_keys_cover_connected_block() {
        let keys = KeySet::compute(&org_graph(), &OrgAccessScope::all());
        let block_key = EncryptedKeyPath::Envkey {
            block_id: Some(BLOCK.into()),
            keyable_parent_id: LOCAL_KEY.into(),
            generated_envkey_id: LOCAL_ENVKEY.into(),
            part: EnvPart::Env,
        };
        assert!(keys.contains(&block_key));
        let local_overrides = EncryptedKeyPath::Envkey {
            block_id: None,
            keyable_parent_id: LOCAL_KEY.into(),
            generated_envkey_id: LOCAL_ENVKEY.into(),
            part: EnvPart::LocalOverrides,
        };
        assert!(keys.contains(&local_overrides));
        assert!(keys.generated_envkey_ids().contains(&ObjectId::new(SERVER_ENVKEY)));
    }

    #[test]
    fn test_revoking_grant_removes_member_keys() {
        let before_graph = org_graph();
        let after_graph = before_graph.with_soft_deleted([&GRANT.into()], 9);
        let scope = OrgAccessScope::for_env_parents([APP.into(), BLOCK.into()]);

        let before = KeySet::compute(&before_graph, &scope);
        let after = KeySet::compute(&after_graph, &scope);
        let removed = before.difference(&after);

        assert!(!removed.is_empty());
        assert!(removed.iter().all(|path| matches!(
            path,
            EncryptedKeyPath::User { user_id, .. } if user_id.as_str() == MEMBER
        )));
        assert!(after.difference(&before).is_empty());
    }

    #[test]
    fn test_scope_restricts_projection() {
        let scope = OrgAccessScope::for_users([OWNER.into()]);
        let keys = KeySet::compute(&org_graph(), &scope);
        assert!(keys.iter().all(|path| match path {
            EncryptedKeyPath::User { user_id, .. } => user_id.as_str() == OWNER,
            EncryptedKeyPath::Envkey { .. } => true,
        }));
    }

    #[test]
    fn test_unwritten_environment_has_no_keys() {
        let graph = org_graph()
            .with_updated(&PROD_ENV.into(), |object| {
                if let Some(env) = object.as_environment_mut() {
                    env.env_updated_at = None;
                }
            })
            .unwrap();
        let keys = KeySet::compute(&graph, &OrgAccessScope::all());
        assert!(!keys.contains(&user_path(OWNER, OWNER_DEVICE, PROD_ENV, EnvPart::Env)));
    }
}
