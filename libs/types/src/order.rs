//! Order lifecycle types
//!
//! An order is Open from creation until it is either matched in full
//! (Filled) or withdrawn by its owner (Cancelled). Both terminal states are
//! frozen: no transition ever leaves them.

use crate::ids::{OrderId, Symbol, UserId};
use crate::numeric::{Amount, NumericError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side (buyer or seller).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Get the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Parse a side string, returning None for anything else.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Some(Side::Buy),
            "sell" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Order status. Open is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Filled,
    Cancelled,
}

impl OrderStatus {
    /// Check if the status is terminal (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }

    /// Parse a status string, returning None for anything else.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Some(OrderStatus::Open),
            "filled" => Some(OrderStatus::Filled),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Open => write!(f, "open"),
            OrderStatus::Filled => write!(f, "filled"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A limit order. Price and amount are fixed at creation; only the status
/// and `updated_at` ever change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub symbol: Symbol,
    pub side: Side,
    pub price: Amount,
    pub amount: Amount,
    pub status: OrderStatus,
    pub created_at: i64, // Unix nanos
    pub updated_at: i64, // Unix nanos
}

impl Order {
    /// Create a new open order.
    pub fn new(
        user_id: UserId,
        symbol: Symbol,
        side: Side,
        price: Amount,
        amount: Amount,
        timestamp: i64,
    ) -> Self {
        Self {
            id: OrderId::new(),
            user_id,
            symbol,
            side,
            price,
            amount,
            status: OrderStatus::Open,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// USD committed by a buy order (`price × amount`).
    pub fn locked_value(&self) -> Result<Amount, NumericError> {
        self.price.checked_mul(self.amount)
    }

    /// Transition Open → Filled.
    ///
    /// # Panics
    /// Panics if the order is already terminal; callers check status first.
    pub fn mark_filled(&mut self, timestamp: i64) {
        assert!(
            self.status == OrderStatus::Open,
            "cannot fill a terminal order"
        );
        self.status = OrderStatus::Filled;
        self.updated_at = timestamp;
    }

    /// Transition Open → Cancelled.
    ///
    /// # Panics
    /// Panics if the order is already terminal; callers check status first.
    pub fn mark_cancelled(&mut self, timestamp: i64) {
        assert!(
            self.status == OrderStatus::Open,
            "cannot cancel a terminal order"
        );
        self.status = OrderStatus::Cancelled;
        self.updated_at = timestamp;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order() -> Order {
        Order::new(
            UserId::new(),
            Symbol::Btc,
            Side::Buy,
            Amount::from_units(50000),
            Amount::from_units(1),
            1_708_123_456_789_000_000,
        )
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn test_new_order_is_open() {
        let order = sample_order();
        assert_eq!(order.status, OrderStatus::Open);
        assert!(!order.status.is_terminal());
        assert_eq!(order.created_at, order.updated_at);
    }

    #[test]
    fn test_locked_value() {
        let order = sample_order();
        assert_eq!(order.locked_value().unwrap(), Amount::from_units(50000));
    }

    #[test]
    fn test_fill_transition() {
        let mut order = sample_order();
        order.mark_filled(order.created_at + 1);
        assert_eq!(order.status, OrderStatus::Filled);
        assert!(order.status.is_terminal());
        assert!(order.updated_at > order.created_at);
    }

    #[test]
    #[should_panic(expected = "cannot cancel a terminal order")]
    fn test_terminal_states_are_frozen() {
        let mut order = sample_order();
        order.mark_filled(order.created_at + 1);
        order.mark_cancelled(order.created_at + 2);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(OrderStatus::parse("open"), Some(OrderStatus::Open));
        assert_eq!(OrderStatus::parse("FILLED"), Some(OrderStatus::Filled));
        assert_eq!(OrderStatus::parse("done"), None);
    }

    #[test]
    fn test_wire_format() {
        let order = sample_order();
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["side"], "buy");
        assert_eq!(json["status"], "open");
        assert_eq!(json["price"], "50000.00000000");
        assert_eq!(json["symbol"], "BTC");
    }
}
