//! Broadcast event bus for distributing `InboundEvent` to multiple subscribers.
//!
//! Built on `tokio::sync::broadcast`, the `EventBus` supports multiple
//! concurrent subscribers; every subscriber sees every event, so a failing
//! or slow subscriber cannot prevent delivery to the others. Publishing with
//! no active subscribers is a no-op.

use corvid_types::event::{EventKind, InboundEvent};
use tokio::sync::broadcast;

/// Multi-consumer event bus for classified platform events.
///
/// Wraps a `tokio::sync::broadcast` channel. Cloning the bus clones the
/// sender, allowing multiple producers and consumers.
pub struct EventBus {
    sender: broadcast::Sender<InboundEvent>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    ///
    /// A capacity of 256 is plenty for a single platform connection.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a new subscriber that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<InboundEvent> {
        self.sender.subscribe()
    }

    /// Create a subscriber that only yields events of the given kinds.
    ///
    /// Filtering happens on the receiving side; other subscribers are
    /// unaffected.
    pub fn subscribe_kinds(&self, kinds: &[EventKind]) -> FilteredReceiver {
        FilteredReceiver {
            inner: self.sender.subscribe(),
            kinds: kinds.to_vec(),
        }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no subscribers, the event is silently dropped.
    pub fn publish(&self, event: InboundEvent) {
        let _ = self.sender.send(event);
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

/// A broadcast receiver that drops events whose kind is not subscribed.
///
/// Lag is not an error for the caller: a `Lagged` notification is logged and
/// the receiver continues with the next available event.
pub struct FilteredReceiver {
    inner: broadcast::Receiver<InboundEvent>,
    kinds: Vec<EventKind>,
}

impl FilteredReceiver {
    /// Receive the next event matching the subscribed kinds.
    ///
    /// Returns `None` when the bus has shut down (all senders dropped).
    pub async fn recv(&mut self) -> Option<InboundEvent> {
        loop {
            match self.inner.recv().await {
                Ok(event) if self.kinds.contains(&event.kind) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged; continuing");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_event(kind: EventKind) -> InboundEvent {
        InboundEvent {
            id: format!("ev-{kind}"),
            kind,
            author_user_id: "u1".to_string(),
            text: "hello".to_string(),
            channel_id: None,
            in_reply_to_id: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn publish_and_subscribe_delivers_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(sample_event(EventKind::Mention));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, EventKind::Mention);
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive_event() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(sample_event(EventKind::Reply));

        assert_eq!(rx1.recv().await.unwrap().kind, EventKind::Reply);
        assert_eq!(rx2.recv().await.unwrap().kind, EventKind::Reply);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new(16);
        bus.publish(sample_event(EventKind::Notification));
        bus.publish(sample_event(EventKind::Notification));
    }

    #[tokio::test]
    async fn filtered_receiver_skips_other_kinds() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe_kinds(&[EventKind::DirectMessage]);

        bus.publish(sample_event(EventKind::Mention));
        bus.publish(sample_event(EventKind::DirectMessage));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, EventKind::DirectMessage);
    }

    #[tokio::test]
    async fn filtered_receiver_returns_none_when_bus_dropped() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe_kinds(&[EventKind::Mention]);
        drop(bus);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn clone_shares_channel() {
        let bus = EventBus::new(16);
        let bus2 = bus.clone();
        let mut rx = bus.subscribe();

        bus2.publish(sample_event(EventKind::Mention));

        assert!(rx.try_recv().is_ok());
    }
}
