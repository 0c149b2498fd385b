//! Caller identity.

use crate::entities::ObjectId;
use serde::{Deserialize, Serialize};

/// How the caller authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthType {
    /// Interactive user on an approved device.
    TokenSession,
    /// CLI user signing with its own key pair.
    CliKey,
}

/// Raw credentials presented with a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub auth_type: AuthType,
    pub secret: String,
}

impl Credentials {
    pub fn token(secret: impl Into<String>) -> Self {
        Self {
            auth_type: AuthType::TokenSession,
            secret: secret.into(),
        }
    }

    pub fn cli_key(secret: impl Into<String>) -> Self {
        Self {
            auth_type: AuthType::CliKey,
            secret: secret.into(),
        }
    }
}

/// Resolved identity of an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    pub auth_type: AuthType,
    pub org_id: ObjectId,
    /// `OrgUser` id for sessions, `CliUser` id for CLI keys.
    pub user_id: ObjectId,
    /// Present for token sessions only.
    pub device_id: Option<ObjectId>,
}

impl AuthContext {
    pub fn session(org_id: ObjectId, user_id: ObjectId, device_id: ObjectId) -> Self {
        Self {
            auth_type: AuthType::TokenSession,
            org_id,
            user_id,
            device_id: Some(device_id),
        }
    }

    pub fn cli(org_id: ObjectId, cli_user_id: ObjectId) -> Self {
        Self {
            auth_type: AuthType::CliKey,
            org_id,
            user_id: cli_user_id,
            device_id: None,
        }
    }

    /// The id of the object holding the caller's key pair: the device for a
    /// session, the CLI user itself for a CLI key.
    pub fn keyable_id(&self) -> &ObjectId {
        match (&self.auth_type, &self.device_id) {
            (AuthType::TokenSession, Some(device_id)) => device_id,
            _ => &self.user_id,
        }
    }
}
