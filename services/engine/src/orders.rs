//! Order placement, cancellation and book views
//!
//! The service owns transaction boundaries: placement runs
//! lock-insert-match-commit as one atomic unit, and queued notifications
//! are flushed strictly after commit.

use crate::events::EventPublisher;
use crate::store::{Committed, PriceOrder, Store};
use crate::{assets, balance, matching};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use types::prelude::*;

/// Public order book for one symbol: bids price-descending, asks
/// price-ascending.
#[derive(Debug, Clone, Serialize)]
pub struct OrderBookView {
    pub symbol: Symbol,
    pub buy_orders: Vec<Order>,
    pub sell_orders: Vec<Order>,
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<Store>,
    publisher: Arc<dyn EventPublisher>,
}

impl OrderService {
    pub fn new(store: Arc<Store>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { store, publisher }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Place a limit order: lock funds or assets, insert it Open, and run
    /// the matching engine, all in one transaction. Returns the order as it
    /// exists after commit — possibly already Filled.
    pub async fn create_order(
        &self,
        user_id: UserId,
        symbol: Symbol,
        side: Side,
        price: Amount,
        amount: Amount,
    ) -> Result<Order, EngineError> {
        if !price.is_positive() {
            return Err(ValidationError::NonPositivePrice.into());
        }
        if !amount.is_positive() {
            return Err(ValidationError::NonPositiveAmount.into());
        }

        let now = types::now_nanos();
        let mut tx = self.store.begin();

        match side {
            Side::Buy => {
                let cost = price.checked_mul(amount).map_err(|source| {
                    ValidationError::Numeric {
                        field: "price * amount",
                        source,
                    }
                })?;
                balance::lock_funds(&mut tx, user_id, cost).await?;
            }
            Side::Sell => {
                assets::lock_assets(&mut tx, user_id, symbol, amount).await?;
            }
        }

        let order = Order::new(user_id, symbol, side, price, amount, now);
        tx.insert_order(order.clone());
        tx.push_audit(AuditEntry::new(
            Some(user_id),
            AuditAction::OrderPlaced,
            EntityKind::Order,
            order.id.to_string(),
            json!({
                "symbol": symbol,
                "side": side,
                "price": price,
                "amount": amount,
            }),
            None,
            now,
        ));

        matching::process(&mut tx, order.id).await?;

        let placed = tx.order(order.id).ok_or(EngineError::Internal(
            "placed order missing from transaction".to_string(),
        ))?;
        let committed = tx.commit();
        self.flush_events(committed);

        tracing::info!(
            order_id = %placed.id,
            user_id = %user_id,
            side = %side,
            status = %placed.status,
            "order placed"
        );
        Ok(placed)
    }

    /// Cancel an open order owned by the requesting user, releasing its
    /// locked funds or assets.
    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<Order, EngineError> {
        let now = types::now_nanos();
        let mut tx = self.store.begin();

        let mut order = tx.lock_order(order_id).await?;
        if order.user_id != user_id {
            return Err(EngineError::OwnershipViolation { order_id });
        }
        if order.status != OrderStatus::Open {
            return Err(EngineError::IllegalState {
                order_id,
                status: order.status,
            });
        }

        match order.side {
            Side::Buy => {
                let locked = order.locked_value()?;
                balance::release_funds(&mut tx, order.user_id, locked).await?;
            }
            Side::Sell => {
                assets::release_assets(&mut tx, order.user_id, order.symbol, order.amount).await?;
            }
        }

        order.mark_cancelled(now);
        tx.update_order(order.clone());
        tx.push_audit(AuditEntry::new(
            Some(user_id),
            AuditAction::OrderCancelled,
            EntityKind::Order,
            order.id.to_string(),
            json!({
                "symbol": order.symbol,
                "side": order.side,
                "price": order.price,
                "amount": order.amount,
            }),
            None,
            now,
        ));

        let committed = tx.commit();
        self.flush_events(committed);

        tracing::info!(order_id = %order.id, user_id = %user_id, "order cancelled");
        Ok(order)
    }

    /// The user's orders, most recent first, optionally filtered by status.
    pub fn orders_for(&self, user_id: UserId, status: Option<OrderStatus>) -> Vec<Order> {
        self.store.orders_of(user_id, status)
    }

    /// Public order book for a symbol.
    pub fn orderbook(&self, symbol: Symbol) -> OrderBookView {
        OrderBookView {
            symbol,
            buy_orders: self
                .store
                .open_orders(symbol, Side::Buy, PriceOrder::Descending),
            sell_orders: self
                .store
                .open_orders(symbol, Side::Sell, PriceOrder::Ascending),
        }
    }

    /// Deliver queued notifications after a commit. Failures are logged and
    /// dropped; the committed trade stands regardless.
    fn flush_events(&self, committed: Committed) {
        for event in committed.events {
            if let Err(err) = self
                .publisher
                .publish(event.user_id, event.event, event.payload)
            {
                tracing::warn!(
                    user_id = %event.user_id,
                    event = event.event,
                    error = %err,
                    "dropping undeliverable match notification"
                );
            }
        }
    }
}
