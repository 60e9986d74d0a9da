//! Match notifications
//!
//! The engine queues events inside the settlement transaction and flushes
//! them only after commit, so a rollback never produces a phantom
//! notification. Delivery is best-effort and at-most-once: a failed publish
//! is logged and dropped, never retried and never surfaced to the trade.

use crate::assets::AssetView;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::broadcast;
use types::prelude::*;

/// Event name for the per-user match notification.
pub const ORDER_MATCHED: &str = "order.matched";

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("no active subscribers")]
    NoSubscribers,
}

/// Abstract sink for per-user notifications.
pub trait EventPublisher: Send + Sync {
    fn publish(
        &self,
        user_id: UserId,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<(), PublishError>;
}

/// Post-settlement balance snapshot carried by `order.matched`.
#[derive(Debug, Clone, Serialize)]
pub struct MatchedBalance {
    pub usd_balance: Amount,
}

/// Payload of the `order.matched` event, one per party.
#[derive(Debug, Clone, Serialize)]
pub struct OrderMatched {
    pub trade: Trade,
    pub user_balance: MatchedBalance,
    pub user_assets: BTreeMap<String, AssetView>,
}

/// An event addressed to one user's private channel.
#[derive(Debug, Clone, Serialize)]
pub struct UserEvent {
    pub user_id: UserId,
    pub event: String,
    pub payload: serde_json::Value,
}

/// Fan-out publisher backed by a tokio broadcast channel; the gateway's
/// WebSocket layer subscribes and filters per user.
pub struct BroadcastPublisher {
    sender: broadcast::Sender<UserEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UserEvent> {
        self.sender.subscribe()
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(
        &self,
        user_id: UserId,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<(), PublishError> {
        self.sender
            .send(UserEvent {
                user_id,
                event: event.to_string(),
                payload,
            })
            .map(|_| ())
            .map_err(|_| PublishError::NoSubscribers)
    }
}

/// Publisher that discards everything. Used in tests and batch tooling.
pub struct NullPublisher;

impl EventPublisher for NullPublisher {
    fn publish(
        &self,
        _user_id: UserId,
        _event: &str,
        _payload: serde_json::Value,
    ) -> Result<(), PublishError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_broadcast_delivers_to_subscriber() {
        let publisher = BroadcastPublisher::new(16);
        let mut rx = publisher.subscribe();
        let user_id = UserId::new();

        publisher
            .publish(user_id, ORDER_MATCHED, json!({"hello": "world"}))
            .unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.user_id, user_id);
        assert_eq!(event.event, ORDER_MATCHED);
        assert_eq!(event.payload["hello"], "world");
    }

    #[test]
    fn test_publish_without_subscribers_fails_softly() {
        let publisher = BroadcastPublisher::new(16);
        let err = publisher
            .publish(UserId::new(), ORDER_MATCHED, json!({}))
            .unwrap_err();
        assert!(matches!(err, PublishError::NoSubscribers));
    }

    #[test]
    fn test_null_publisher_always_succeeds() {
        let publisher = NullPublisher;
        assert!(publisher
            .publish(UserId::new(), ORDER_MATCHED, json!({}))
            .is_ok());
    }
}
