//! # Socket Subscriptions
//!
//! Receiving side of the in-memory bus.

use crate::events::{SocketEvent, SocketEventFilter};
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The bus was dropped.
    #[error("Notification bus closed")]
    Closed,
}

/// Filtered handle onto the broadcast channel.
pub struct Subscription {
    receiver: broadcast::Receiver<SocketEvent>,
    filter: SocketEventFilter,
}

impl Subscription {
    pub(crate) fn new(receiver: broadcast::Receiver<SocketEvent>, filter: SocketEventFilter) -> Self {
        Self { receiver, filter }
    }

    /// Wait for the next matching event. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<SocketEvent> {
        loop {
            let event = match self.receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Subscriber lagged, some socket events dropped");
                    continue;
                }
            };

            if self.filter.matches(&event) {
                return Some(event);
            }
        }
    }

    /// Next matching event if one is already queued.
    pub fn try_recv(&mut self) -> Result<Option<SocketEvent>, SubscriptionError> {
        loop {
            let event = match self.receiver.try_recv() {
                Ok(event) => event,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if self.filter.matches(&event) {
                return Ok(Some(event));
            }
        }
    }

    /// Drain every matching event queued so far.
    pub fn drain(&mut self) -> Vec<SocketEvent> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = self.try_recv() {
            events.push(event);
        }
        events
    }

    #[must_use]
    pub fn filter(&self) -> &SocketEventFilter {
        &self.filter
    }
}

/// `Stream` adapter over a filtered subscription.
pub struct EventStream {
    inner: BroadcastStream<SocketEvent>,
    filter: SocketEventFilter,
}

impl EventStream {
    pub(crate) fn new(receiver: broadcast::Receiver<SocketEvent>, filter: SocketEventFilter) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
            filter,
        }
    }

    #[must_use]
    pub fn filter(&self) -> &SocketEventFilter {
        &self.filter
    }
}

impl Stream for EventStream {
    type Item = SocketEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    if self.filter.matches(&event) {
                        return Poll::Ready(Some(event));
                    }
                }
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(count)))) => {
                    debug!(lagged = count, "Event stream lagged");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EnvkeySocketEvent, SocketTopic};
    use crate::publisher::{InMemoryNotificationBus, NotificationChannel};
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_subscription_filter_skips_other_orgs() {
        let bus = InMemoryNotificationBus::new();
        let mut sub = bus.subscribe(SocketEventFilter::for_org("o2".into()));

        bus.clear_org_sockets(&"o1".into()).await;
        bus.clear_org_sockets(&"o2".into()).await;

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("event");
        assert_eq!(received.org_id().as_str(), "o2");
        assert!(sub.try_recv().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_drain_collects_queued_events() {
        let bus = InMemoryNotificationBus::new();
        let mut sub = bus.subscribe(SocketEventFilter::topics(vec![SocketTopic::EnvkeyUpdate]));

        bus.notify_envkey(&"o".into(), &"g1".into(), EnvkeySocketEvent::EnvUpdated)
            .await;
        bus.clear_org_sockets(&"o".into()).await;
        bus.notify_envkey(&"o".into(), &"g2".into(), EnvkeySocketEvent::EnvUpdated)
            .await;

        assert_eq!(sub.drain().len(), 2);
    }

    #[tokio::test]
    async fn test_event_stream_yields_matching() {
        let bus = InMemoryNotificationBus::new();
        let mut stream = bus.event_stream(SocketEventFilter::topics(vec![SocketTopic::ClearSockets]));

        bus.notify_envkey(&"o".into(), &"g".into(), EnvkeySocketEvent::EnvUpdated)
            .await;
        bus.clear_user_sockets(&"o".into(), &"u".into()).await;

        let next = timeout(Duration::from_millis(100), stream.next())
            .await
            .expect("timeout")
            .expect("event");
        assert_eq!(next.topic(), SocketTopic::ClearSockets);
    }

    #[tokio::test]
    async fn test_try_recv_closed() {
        let bus = InMemoryNotificationBus::new();
        let mut sub = bus.subscribe(SocketEventFilter::all());
        drop(bus);
        assert_eq!(sub.try_recv(), Err(SubscriptionError::Closed));
    }
}
