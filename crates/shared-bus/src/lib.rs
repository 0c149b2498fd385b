//! # Shared Bus - Realtime Notification Channel
//!
//! The notification boundary between the action pipeline and connected
//! sessions. After a commit, the pipeline tells the channel which tenant
//! changed, which secret-distribution artifacts need a refresh, and which
//! sockets must be dropped. Transport internals live behind the
//! [`NotificationChannel`] trait.
//!
//! ```text
//! ┌──────────────────┐   notify_org()      ┌──────────────────┐
//! │ Action Pipeline  │ ──────────────────→ │ Notification     │
//! │ (post-commit     │   notify_envkey()   │ Channel          │ ──→ sessions
//! │  worker)         │   clear_*()         │                  │
//! └──────────────────┘                     └──────────────────┘
//! ```
//!
//! `InMemoryNotificationBus` fans events out over `tokio::sync::broadcast`
//! and is what tests subscribe to.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{
    EnvkeySocketEvent, OrgSocketUpdate, SocketEvent, SocketEventFilter, SocketFilter, SocketTopic,
};
pub use publisher::{InMemoryNotificationBus, NotificationChannel};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events buffered per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
