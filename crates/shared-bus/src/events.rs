//! # Socket Events
//!
//! Everything the pipeline can ask the notification channel to deliver.

use serde::{Deserialize, Serialize};
use shared_types::entities::{ObjectId, OrgId};
use std::collections::BTreeSet;

/// Payload of a tenant-wide "graph changed" notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgSocketUpdate {
    pub action_types: Vec<String>,
    pub actor_id: Option<ObjectId>,
}

/// Restricts an org update to specific users or devices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketFilter {
    #[serde(default)]
    pub user_ids: BTreeSet<ObjectId>,
    #[serde(default)]
    pub device_ids: BTreeSet<ObjectId>,
}

/// Event delivered to a generated-envkey socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvkeySocketEvent {
    EnvUpdated,
}

/// Coarse event category for subscription filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocketTopic {
    OrgUpdate,
    EnvkeyUpdate,
    ClearSockets,
}

/// All events that flow through the notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocketEvent {
    /// Tenant graph changed; connected sessions should refetch.
    OrgUpdate {
        org_id: OrgId,
        update: OrgSocketUpdate,
        /// The acting device already has the response.
        exclude_device_id: Option<ObjectId>,
        filter: Option<SocketFilter>,
    },

    /// A secret-distribution artifact must re-fetch its payload.
    EnvkeyUpdate {
        org_id: OrgId,
        generated_envkey_id: ObjectId,
        event: EnvkeySocketEvent,
    },

    ClearDeviceSocket {
        org_id: OrgId,
        user_id: ObjectId,
        device_id: ObjectId,
    },

    ClearUserSockets {
        org_id: OrgId,
        user_id: ObjectId,
    },

    ClearOrgSockets {
        org_id: OrgId,
    },

    ClearEnvkeySocket {
        org_id: OrgId,
        generated_envkey_id: ObjectId,
    },
}

impl SocketEvent {
    pub fn org_id(&self) -> &OrgId {
        match self {
            SocketEvent::OrgUpdate { org_id, .. }
            | SocketEvent::EnvkeyUpdate { org_id, .. }
            | SocketEvent::ClearDeviceSocket { org_id, .. }
            | SocketEvent::ClearUserSockets { org_id, .. }
            | SocketEvent::ClearOrgSockets { org_id }
            | SocketEvent::ClearEnvkeySocket { org_id, .. } => org_id,
        }
    }

    pub fn topic(&self) -> SocketTopic {
        match self {
            SocketEvent::OrgUpdate { .. } => SocketTopic::OrgUpdate,
            SocketEvent::EnvkeyUpdate { .. } => SocketTopic::EnvkeyUpdate,
            SocketEvent::ClearDeviceSocket { .. }
            | SocketEvent::ClearUserSockets { .. }
            | SocketEvent::ClearOrgSockets { .. }
            | SocketEvent::ClearEnvkeySocket { .. } => SocketTopic::ClearSockets,
        }
    }
}

/// Subscription filter. Empty collections match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SocketEventFilter {
    pub topics: Vec<SocketTopic>,
    pub org_ids: Vec<OrgId>,
}

impl SocketEventFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn topics(topics: Vec<SocketTopic>) -> Self {
        Self {
            topics,
            org_ids: Vec::new(),
        }
    }

    #[must_use]
    pub fn for_org(org_id: OrgId) -> Self {
        Self {
            topics: Vec::new(),
            org_ids: vec![org_id],
        }
    }

    #[must_use]
    pub fn matches(&self, event: &SocketEvent) -> bool {
        let topic_match = self.topics.is_empty() || self.topics.contains(&event.topic());
        let org_match = self.org_ids.is_empty() || self.org_ids.contains(event.org_id());
        topic_match && org_match
    }
}
