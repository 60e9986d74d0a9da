//! Unique identifier types for exchange entities
//!
//! All IDs use UUID v7 for time-sortable ordering. The `Ord` impls double as
//! the canonical ascending-id ordering used for multi-row lock acquisition.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Create a new UserId with the current timestamp embedded.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an order.
///
/// UUID v7 embeds creation time, so equal-price candidates sorted by id are
/// also sorted by arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeId(Uuid);

impl TradeId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TradeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tradable symbol, quoted in USD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Symbol {
    Btc,
    Eth,
}

impl Symbol {
    /// Every supported symbol.
    pub const ALL: [Symbol; 2] = [Symbol::Btc, Symbol::Eth];

    pub fn as_str(&self) -> &'static str {
        match self {
            Symbol::Btc => "BTC",
            Symbol::Eth => "ETH",
        }
    }

    /// Parse a symbol string, returning None for unsupported symbols.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BTC" => Some(Symbol::Btc),
            "ETH" => Some(Symbol::Eth),
            _ => None,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(UserId::new(), UserId::new());
        assert_ne!(OrderId::new(), OrderId::new());
        assert_ne!(TradeId::new(), TradeId::new());
    }

    #[test]
    fn test_id_serialization() {
        let id = OrderId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: OrderId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_symbol_parse() {
        assert_eq!(Symbol::parse("BTC"), Some(Symbol::Btc));
        assert_eq!(Symbol::parse("eth"), Some(Symbol::Eth));
        assert_eq!(Symbol::parse("DOGE"), None);
    }

    #[test]
    fn test_symbol_serialization() {
        assert_eq!(serde_json::to_string(&Symbol::Btc).unwrap(), "\"BTC\"");
        let parsed: Symbol = serde_json::from_str("\"ETH\"").unwrap();
        assert_eq!(parsed, Symbol::Eth);
    }
}
