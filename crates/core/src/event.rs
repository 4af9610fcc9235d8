//! Domain event system — decoupled communication between components.
//!
//! Events are published when something interesting happens in the system.
//! The turn worker subscribes to react to new messages without coupling
//! the store to the pipeline.

use crate::message::Author;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A new message was appended to a conversation
    MessageCreated {
        conversation_id: String,
        message_id: String,
        author: Author,
        content: String,
        timestamp: DateTime<Utc>,
    },

    /// The pipeline produced a bot reply
    ReplyGenerated {
        conversation_id: String,
        provider: String,
        timestamp: DateTime<Utc>,
    },

    /// A turn was rejected by the quota ledger
    QuotaBlocked {
        user_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Both providers failed for a turn
    TurnFailed {
        conversation_id: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
/// Components can subscribe to receive all events and filter for what
/// they care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::MessageCreated {
            conversation_id: "c1".into(),
            message_id: "m1".into(),
            author: Author::User,
            content: "Olá".into(),
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::MessageCreated {
                conversation_id,
                author,
                ..
            } => {
                assert_eq!(conversation_id, "c1");
                assert_eq!(*author, Author::User);
            }
            _ => panic!("Expected MessageCreated event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        // Publishing with no subscribers should not panic
        bus.publish(DomainEvent::QuotaBlocked {
            user_id: "u1".into(),
            timestamp: Utc::now(),
        });
    }
}
