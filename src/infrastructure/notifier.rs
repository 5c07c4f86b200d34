use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::{ChangeEvent, Envelope};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// In-process change feed for registry mutations.
///
/// Built on `tokio::sync::broadcast`: publishing never blocks, slow
/// subscribers lag and drop old events instead of stalling writers.
pub struct ChangeNotifier {
    sender: broadcast::Sender<Envelope>,
    sequence: AtomicU64,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: AtomicU64::new(0),
        }
    }

    /// Publish an event; returns how many subscribers received it.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            sequence,
            event_type = event.event_type(),
            resource_id = event.resource_id(),
            "Publishing change event"
        );
        let envelope = Envelope {
            sequence,
            occurred_at: Utc::now(),
            event,
        };
        // An error only means nobody is listening right now.
        self.sender.send(envelope).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.sender.subscribe()
    }

    pub fn events_published(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers_in_order() {
        let notifier = ChangeNotifier::new();
        let mut rx = notifier.subscribe();

        notifier.publish(ChangeEvent::CardBlocked {
            card_id: "c1".into(),
            owner_id: "u1".into(),
        });
        notifier.publish(ChangeEvent::UserApproved {
            user_id: "u1".into(),
        });

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.sequence, 1);
        assert_eq!(first.event.event_type(), "CardBlocked");
        assert_eq!(second.sequence, 2);
        assert_eq!(second.event.resource_id(), "u1");
    }

    #[test]
    fn test_publish_without_subscribers_is_not_an_error() {
        let notifier = ChangeNotifier::new();
        let delivered = notifier.publish(ChangeEvent::UserRegistered {
            user_id: "u1".into(),
        });
        assert_eq!(delivered, 0);
        assert_eq!(notifier.events_published(), 1);
    }
}
