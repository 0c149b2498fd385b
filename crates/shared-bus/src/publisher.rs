//! # Notification Publisher
//!
//! The outbound side of the notification boundary.

use crate::events::{
    EnvkeySocketEvent, OrgSocketUpdate, SocketEvent, SocketEventFilter, SocketFilter,
};
use crate::subscriber::{EventStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use shared_types::entities::{ObjectId, OrgId};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Notification boundary used by the pipeline after commit.
///
/// Implementors only need [`NotificationChannel::deliver`]; the named
/// helpers build the matching [`SocketEvent`]. Delivery is best-effort:
/// the return value is the number of receivers reached, never an error.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Deliver one event to connected sessions.
    async fn deliver(&self, event: SocketEvent) -> usize;

    /// Total events handed to the channel.
    fn events_published(&self) -> u64;

    async fn notify_org(
        &self,
        org_id: &OrgId,
        update: OrgSocketUpdate,
        exclude_device_id: Option<ObjectId>,
        filter: Option<SocketFilter>,
    ) -> usize {
        self.deliver(SocketEvent::OrgUpdate {
            org_id: org_id.clone(),
            update,
            exclude_device_id,
            filter,
        })
        .await
    }

    async fn notify_envkey(
        &self,
        org_id: &OrgId,
        generated_envkey_id: &ObjectId,
        event: EnvkeySocketEvent,
    ) -> usize {
        self.deliver(SocketEvent::EnvkeyUpdate {
            org_id: org_id.clone(),
            generated_envkey_id: generated_envkey_id.clone(),
            event,
        })
        .await
    }

    async fn clear_device_socket(
        &self,
        org_id: &OrgId,
        user_id: &ObjectId,
        device_id: &ObjectId,
    ) -> usize {
        self.deliver(SocketEvent::ClearDeviceSocket {
            org_id: org_id.clone(),
            user_id: user_id.clone(),
            device_id: device_id.clone(),
        })
        .await
    }

    async fn clear_user_sockets(&self, org_id: &OrgId, user_id: &ObjectId) -> usize {
        self.deliver(SocketEvent::ClearUserSockets {
            org_id: org_id.clone(),
            user_id: user_id.clone(),
        })
        .await
    }

    async fn clear_org_sockets(&self, org_id: &OrgId) -> usize {
        self.deliver(SocketEvent::ClearOrgSockets {
            org_id: org_id.clone(),
        })
        .await
    }

    async fn clear_envkey_socket(&self, org_id: &OrgId, generated_envkey_id: &ObjectId) -> usize {
        self.deliver(SocketEvent::ClearEnvkeySocket {
            org_id: org_id.clone(),
            generated_envkey_id: generated_envkey_id.clone(),
        })
        .await
    }
}

/// In-memory notification bus.
///
/// Uses `tokio::sync::broadcast` so any number of sessions (or tests) can
/// subscribe. A clustered deployment would put a pub/sub transport behind
/// the same trait.
pub struct InMemoryNotificationBus {
    sender: broadcast::Sender<SocketEvent>,
    events_published: AtomicU64,
    capacity: usize,
}

impl InMemoryNotificationBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    #[must_use]
    pub fn subscribe(&self, filter: SocketEventFilter) -> Subscription {
        debug!(topics = ?filter.topics, orgs = filter.org_ids.len(), "New socket subscription");
        Subscription::new(self.sender.subscribe(), filter)
    }

    #[must_use]
    pub fn event_stream(&self, filter: SocketEventFilter) -> EventStream {
        EventStream::new(self.sender.subscribe(), filter)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryNotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationChannel for InMemoryNotificationBus {
    async fn deliver(&self, event: SocketEvent) -> usize {
        let topic = event.topic();
        let org_id = event.org_id().clone();

        self.events_published.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(event) {
            Ok(receivers) => {
                debug!(topic = ?topic, org_id = %org_id, receivers, "Socket event delivered");
                receivers
            }
            Err(e) => {
                warn!(topic = ?topic, org_id = %org_id, error = %e, "Socket event dropped (no receivers)");
                0
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}
