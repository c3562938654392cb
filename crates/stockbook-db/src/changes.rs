//! # Change Feed
//!
//! In-process notification of committed writes, per table.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Change Feed                                     │
//! │                                                                         │
//! │  Repository mutation                                                   │
//! │       │  tx.commit()                                                    │
//! │       ▼                                                                 │
//! │  ChangeFeed::publish(ChangeEvent) ──► broadcast::Sender                 │
//! │                                            │                            │
//! │                    ┌───────────────────────┼───────────────────┐        │
//! │                    ▼                       ▼                   ▼        │
//! │           ChangeSubscription      ChangeSubscription     (no one?)     │
//! │           recv_for("products")    recv()                 event dropped │
//! │                    │                       │                            │
//! │                    ▼                       ▼                            │
//! │              WebSocket client        WebSocket client                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Events are published only after commit, so a subscriber that refetches
//! on an event always sees the new state. A subscriber that falls more than
//! the channel capacity behind skips the missed events and carries on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stockbook_core::{ActionType, EntityType};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default number of events buffered per subscriber.
pub const DEFAULT_FEED_CAPACITY: usize = 256;

// =============================================================================
// Change Event
// =============================================================================

/// One committed change.
///
/// `id` is `None` for changes spanning many rows (CSV import, manufacturer
/// delete clearing product references); subscribers should refetch the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub entity: EntityType,
    pub table: String,
    pub action: ActionType,
    pub id: Option<String>,
    pub at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(entity: EntityType, action: ActionType, id: Option<String>) -> Self {
        ChangeEvent {
            entity,
            table: entity.table().to_string(),
            action,
            id,
            at: Utc::now(),
        }
    }
}

// =============================================================================
// Change Feed
// =============================================================================

#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        ChangeFeed { tx }
    }

    /// Sends an event to every current subscriber.
    pub fn publish(&self, event: ChangeEvent) {
        debug!(
            table = %event.table,
            action = ?event.action,
            id = ?event.id,
            "Publishing change"
        );
        // Err only means nobody is listening
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> ChangeSubscription {
        ChangeSubscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        ChangeFeed::new(DEFAULT_FEED_CAPACITY)
    }
}

// =============================================================================
// Subscription
// =============================================================================

pub struct ChangeSubscription {
    rx: broadcast::Receiver<ChangeEvent>,
}

impl ChangeSubscription {
    /// Next event for any table. `None` once the feed is gone.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Change subscriber lagged, skipping ahead");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next event for `table` (e.g. `"products"`), discarding the rest.
    pub async fn recv_for(&mut self, table: &str) -> Option<ChangeEvent> {
        loop {
            let event = self.recv().await?;
            if event.table == table {
                return Some(event);
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let feed = ChangeFeed::default();
        let mut sub = feed.subscribe();

        feed.publish(ChangeEvent::new(
            EntityType::Product,
            ActionType::Create,
            Some("p-1".to_string()),
        ));

        let event = sub.recv().await.unwrap();
        assert_eq!(event.table, "products");
        assert_eq!(event.action, ActionType::Create);
        assert_eq!(event.id.as_deref(), Some("p-1"));
    }

    #[tokio::test]
    async fn test_recv_for_filters_tables() {
        let feed = ChangeFeed::default();
        let mut sub = feed.subscribe();

        feed.publish(ChangeEvent::new(EntityType::Customer, ActionType::Update, None));
        feed.publish(ChangeEvent::new(
            EntityType::Booking,
            ActionType::Delete,
            Some("b-1".to_string()),
        ));

        let event = sub.recv_for("bookings").await.unwrap();
        assert_eq!(event.entity, EntityType::Booking);
        assert_eq!(event.id.as_deref(), Some("b-1"));
    }

    #[tokio::test]
    async fn test_lagged_subscriber_skips_ahead() {
        let feed = ChangeFeed::new(2);
        let mut sub = feed.subscribe();

        for i in 0..5 {
            feed.publish(ChangeEvent::new(
                EntityType::Product,
                ActionType::Update,
                Some(format!("p-{i}")),
            ));
        }

        // Oldest events were overwritten; the newest survive
        let event = sub.recv().await.unwrap();
        assert_eq!(event.id.as_deref(), Some("p-3"));
    }

    #[tokio::test]
    async fn test_closed_feed_ends_subscription() {
        let feed = ChangeFeed::default();
        let mut sub = feed.subscribe();
        drop(feed);
        assert!(sub.recv().await.is_none());
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let feed = ChangeFeed::default();
        assert_eq!(feed.subscriber_count(), 0);
        feed.publish(ChangeEvent::new(EntityType::User, ActionType::Create, None));
    }
}
