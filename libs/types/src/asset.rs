//! Per-symbol asset holdings
//!
//! Invariant: 0 ≤ locked_amount ≤ amount. The available portion is derived,
//! never stored.

use crate::ids::{Symbol, UserId};
use crate::numeric::Amount;
use serde::Serialize;

/// Seed holding granted per symbol at registration.
pub fn initial_holding(symbol: Symbol) -> Amount {
    match symbol {
        Symbol::Btc => Amount::from_units(1),
        Symbol::Eth => Amount::from_units(10),
    }
}

/// One user's holding of one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Asset {
    pub user_id: UserId,
    pub symbol: Symbol,
    /// Total held, including the locked portion.
    pub amount: Amount,
    /// Portion committed to open sell orders.
    pub locked_amount: Amount,
}

impl Asset {
    /// Create an empty holding.
    pub fn new(user_id: UserId, symbol: Symbol) -> Self {
        Self {
            user_id,
            symbol,
            amount: Amount::ZERO,
            locked_amount: Amount::ZERO,
        }
    }

    /// Portion not committed to any open order.
    pub fn available_amount(&self) -> Amount {
        self.amount
            .checked_sub(self.locked_amount)
            .unwrap_or(Amount::ZERO)
    }

    /// Check the holding invariant: locked_amount ≤ amount.
    pub fn check_invariant(&self) -> bool {
        self.locked_amount <= self.amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_asset_is_empty() {
        let asset = Asset::new(UserId::new(), Symbol::Btc);
        assert!(asset.amount.is_zero());
        assert!(asset.locked_amount.is_zero());
        assert!(asset.check_invariant());
    }

    #[test]
    fn test_available_amount() {
        let mut asset = Asset::new(UserId::new(), Symbol::Eth);
        asset.amount = Amount::from_units(10);
        asset.locked_amount = Amount::from_units(3);
        assert_eq!(asset.available_amount(), Amount::from_units(7));
        assert!(asset.check_invariant());
    }

    #[test]
    fn test_invariant_violation_detected() {
        let mut asset = Asset::new(UserId::new(), Symbol::Btc);
        asset.amount = Amount::from_units(1);
        asset.locked_amount = Amount::from_units(2);
        assert!(!asset.check_invariant());
    }

    #[test]
    fn test_never_locked_holding_serializes_eight_digits() {
        let mut asset = Asset::new(UserId::new(), Symbol::Btc);
        asset.amount = Amount::from_units(1);
        let json = serde_json::to_value(&asset).unwrap();
        assert_eq!(json["locked_amount"], "0.00000000");
        assert_eq!(json["amount"], "1.00000000");
    }

    #[test]
    fn test_seed_holdings() {
        assert_eq!(initial_holding(Symbol::Btc), Amount::from_units(1));
        assert_eq!(initial_holding(Symbol::Eth), Amount::from_units(10));
    }
}
