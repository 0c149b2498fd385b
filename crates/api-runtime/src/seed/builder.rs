//! # Tenant Seed Builder
//!
//! Builds the minimal graph a fresh tenant needs before any action can run:
//! the tenant root, org roles, default environment roles, and an owner with
//! one approved device.

use kg_01_graph_store::{org_key, InMemoryGraphStorage, StoredRecord};
use shared_types::{
    EnvironmentRole, GraphObject, ObjectBody, ObjectId, Org, OrgId, OrgPermission, OrgRole,
    OrgUser, OrgUserDevice, Pubkey, Timestamp,
};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::info;

/// Seeding errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeedError {
    /// The tenant root already exists in storage.
    #[error("Tenant {0} is already seeded")]
    AlreadySeeded(OrgId),

    /// Invalid seed configuration.
    #[error("Invalid seed configuration: {0}")]
    InvalidConfig(String),
}

/// What to seed.
#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub org_id: OrgId,
    pub org_name: String,
    pub owner_email: String,
    pub owner_device_name: String,
    /// Base environment roles, in order. Each applies to all apps and blocks.
    pub environment_roles: Vec<String>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            org_id: "demo-org".into(),
            org_name: "Demo Org".to_string(),
            owner_email: "owner@example.com".to_string(),
            owner_device_name: "owner-device".to_string(),
            environment_roles: vec![
                "Development".to_string(),
                "Staging".to_string(),
                "Production".to_string(),
            ],
        }
    }
}

impl SeedConfig {
    pub fn validate(&self) -> Result<(), SeedError> {
        if self.org_id.as_str().trim().is_empty() {
            return Err(SeedError::InvalidConfig("org id is empty".to_string()));
        }
        if !self.owner_email.contains('@') {
            return Err(SeedError::InvalidConfig(format!(
                "owner email {} is not an address",
                self.owner_email
            )));
        }
        let unique: BTreeSet<&String> = self.environment_roles.iter().collect();
        if unique.len() != self.environment_roles.len() {
            return Err(SeedError::InvalidConfig(
                "environment role names must be unique".to_string(),
            ));
        }
        Ok(())
    }
}

/// A built tenant, ready to be written.
#[derive(Debug, Clone)]
pub struct SeededOrg {
    pub org_id: OrgId,
    pub owner_id: ObjectId,
    pub owner_device_id: ObjectId,
    pub owner_role_id: ObjectId,
    pub member_role_id: ObjectId,
    pub environment_role_ids: Vec<ObjectId>,
    pub objects: Vec<GraphObject>,
}

impl SeededOrg {
    /// Write every object straight into `storage`.
    pub fn write_to(&self, storage: &InMemoryGraphStorage) -> Result<(), SeedError> {
        if storage.get(&org_key(&self.org_id)).is_some() {
            return Err(SeedError::AlreadySeeded(self.org_id.clone()));
        }
        storage.seed(
            &self.org_id,
            self.objects.iter().cloned().map(StoredRecord::Graph),
        );
        info!(
            org_id = %self.org_id,
            objects = self.objects.len(),
            "[seed] Tenant written"
        );
        Ok(())
    }
}

/// Builds a [`SeededOrg`] with ids derived from the org id.
pub struct SeedBuilder {
    config: SeedConfig,
}

impl SeedBuilder {
    pub fn new(config: SeedConfig) -> Self {
        Self { config }
    }

    fn id(&self, suffix: &str) -> ObjectId {
        ObjectId::new(format!("{}-{suffix}", self.config.org_id))
    }

    pub fn build(&self, now: Timestamp) -> Result<SeededOrg, SeedError> {
        self.config.validate()?;
        let config = &self.config;

        let owner_role_id = self.id("owner-role");
        let member_role_id = self.id("member-role");
        let owner_id = self.id("owner");
        let owner_device_id = self.id("owner-device");

        let mut objects = vec![
            GraphObject::new(
                config.org_id.clone(),
                ObjectBody::Org(Org {
                    name: config.org_name.clone(),
                    graph_updated_at: now,
                    rbac_updated_at: Some(now),
                    device_like_count: 1,
                }),
                now,
            ),
            GraphObject::new(
                owner_role_id.clone(),
                ObjectBody::OrgRole(OrgRole {
                    name: "Owner".to_string(),
                    permissions: BTreeSet::from([
                        OrgPermission::AppsCreate,
                        OrgPermission::AppsDelete,
                        OrgPermission::AppsReadAll,
                        OrgPermission::AppsManageUsers,
                        OrgPermission::BlocksCreate,
                        OrgPermission::BlocksReadAll,
                        OrgPermission::OrgManageUsers,
                        OrgPermission::OrgManageTrust,
                    ]),
                }),
                now,
            ),
            GraphObject::new(
                member_role_id.clone(),
                ObjectBody::OrgRole(OrgRole {
                    name: "Basic User".to_string(),
                    permissions: BTreeSet::new(),
                }),
                now,
            ),
            GraphObject::new(
                owner_id.clone(),
                ObjectBody::OrgUser(OrgUser {
                    email: config.owner_email.clone(),
                    org_role_id: owner_role_id.clone(),
                    is_creator: true,
                    active: true,
                    deactivated_at: None,
                }),
                now,
            ),
            GraphObject::new(
                owner_device_id.clone(),
                ObjectBody::OrgUserDevice(OrgUserDevice {
                    user_id: owner_id.clone(),
                    name: config.owner_device_name.clone(),
                    pubkey: Some(Pubkey(format!("{owner_device_id}-pubkey"))),
                    approved_at: Some(now),
                    signed_trusted_root: None,
                    trusted_root_updated_at: None,
                    deactivated_at: None,
                }),
                now,
            ),
        ];

        let mut environment_role_ids = Vec::with_capacity(config.environment_roles.len());
        for name in &config.environment_roles {
            let id = self.id(&name.to_lowercase().replace(' ', "-"));
            objects.push(GraphObject::new(
                id.clone(),
                ObjectBody::EnvironmentRole(EnvironmentRole {
                    name: name.clone(),
                    default_all_apps: true,
                    default_all_blocks: true,
                }),
                now,
            ));
            environment_role_ids.push(id);
        }

        Ok(SeededOrg {
            org_id: config.org_id.clone(),
            owner_id,
            owner_device_id,
            owner_role_id,
            member_role_id,
            environment_role_ids,
            objects,
        })
    }
}
