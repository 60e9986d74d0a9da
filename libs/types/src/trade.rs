//! Trade records
//!
//! A trade is created by the matching engine at settlement and never
//! mutated afterwards. The clearing price is always the sell order's
//! price, regardless of which side arrived last.

use crate::fee;
use crate::ids::{OrderId, Symbol, TradeId, UserId};
use crate::numeric::{Amount, NumericError};
use crate::order::Order;
use serde::{Deserialize, Serialize};

/// An executed match between one buy and one sell order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub symbol: Symbol,
    pub price: Amount,
    pub amount: Amount,
    pub volume: Amount,
    pub commission: Amount,
    pub created_at: i64, // Unix nanos
}

impl Trade {
    /// Build the trade record for a full match of `buy` against `sell`.
    ///
    /// `volume` and `commission` are derived here so every trade satisfies
    /// `volume = price × amount` and `commission = volume × 0.015` by
    /// construction.
    pub fn from_match(buy: &Order, sell: &Order, timestamp: i64) -> Result<Self, NumericError> {
        let price = sell.price;
        let amount = buy.amount;
        let volume = price.checked_mul(amount)?;
        let commission = fee::commission_on(volume)?;

        Ok(Self {
            id: TradeId::new(),
            buy_order_id: buy.id,
            sell_order_id: sell.id,
            buyer_id: buy.user_id,
            seller_id: sell.user_id,
            symbol: buy.symbol,
            price,
            amount,
            volume,
            commission,
            created_at: timestamp,
        })
    }

    /// Seller proceeds after commission.
    pub fn seller_proceeds(&self) -> Result<Amount, NumericError> {
        self.volume.checked_sub(self.commission)
    }
}
