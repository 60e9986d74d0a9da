//! Append-only audit trail entries

use crate::ids::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Action tags recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    UserRegistered,
    UserLoggedIn,
    UserLoggedOut,
    OrderPlaced,
    OrderCancelled,
    TradeExecutedBuy,
    TradeExecutedSell,
}

/// Kind of entity an audit entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    User,
    Asset,
    Order,
    Trade,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::User => write!(f, "user"),
            EntityKind::Asset => write!(f, "asset"),
            EntityKind::Order => write!(f, "order"),
            EntityKind::Trade => write!(f, "trade"),
        }
    }
}

/// One audit trail record. Entries are append-only and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub user_id: Option<UserId>,
    pub action: AuditAction,
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub details: serde_json::Value,
    pub ip: Option<String>,
    pub created_at: i64, // Unix nanos
}

impl AuditEntry {
    pub fn new(
        user_id: Option<UserId>,
        action: AuditAction,
        entity_kind: EntityKind,
        entity_id: impl Into<String>,
        details: serde_json::Value,
        ip: Option<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            user_id,
            action,
            entity_kind,
            entity_id: entity_id.into(),
            details,
            ip,
            created_at: timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_tags() {
        assert_eq!(
            serde_json::to_string(&AuditAction::TradeExecutedBuy).unwrap(),
            "\"TRADE_EXECUTED_BUY\""
        );
        assert_eq!(
            serde_json::to_string(&AuditAction::OrderCancelled).unwrap(),
            "\"ORDER_CANCELLED\""
        );
    }

    #[test]
    fn test_entry_shape() {
        let entry = AuditEntry::new(
            Some(UserId::new()),
            AuditAction::OrderPlaced,
            EntityKind::Order,
            "some-order",
            json!({"side": "buy"}),
            None,
            1_708_123_456_789_000_000,
        );
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["action"], "ORDER_PLACED");
        assert_eq!(value["entity_kind"], "order");
        assert_eq!(value["details"]["side"], "buy");
    }
}
