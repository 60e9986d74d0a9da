//! Matching engine core
//!
//! `process` runs inside the order-creation transaction, so a failure
//! anywhere — lock timeout, invariant violation, overflow — rolls back the
//! placement itself along with any partial settlement. Counter-orders are
//! locked one at a time and re-checked under their row token: a row that
//! got filled or cancelled between the scan and the lock is skipped.

use crate::store::{PriceOrder, Transaction};
use crate::{assets, balance, events};
use serde_json::json;
use types::prelude::*;

/// Try to match a newly inserted order against the best compatible
/// counter-order and settle the trade.
///
/// Returns the trade on a match, `None` when the order rests Open.
pub async fn process(
    tx: &mut Transaction<'_>,
    order_id: OrderId,
) -> Result<Option<Trade>, EngineError> {
    let order = tx.lock_order(order_id).await?;
    if order.status != OrderStatus::Open {
        return Ok(None);
    }

    // Best price first: lowest ask for an incoming buy, highest bid for an
    // incoming sell; equal prices resolve by creation time.
    let price_order = match order.side {
        Side::Buy => PriceOrder::Ascending,
        Side::Sell => PriceOrder::Descending,
    };
    let candidates = tx
        .store()
        .open_orders(order.symbol, order.side.opposite(), price_order);

    for candidate in candidates {
        if candidate.id == order.id {
            continue;
        }
        if !crosses(&order, candidate.price) {
            // Sorted best-first: nothing further down can cross either.
            break;
        }

        let counter = tx.lock_order(candidate.id).await?;
        if counter.status != OrderStatus::Open {
            continue;
        }

        if counter.amount != order.amount {
            let (buy_amount, sell_amount) = match order.side {
                Side::Buy => (order.amount, counter.amount),
                Side::Sell => (counter.amount, order.amount),
            };
            return Err(EngineError::UnsupportedPartialMatch {
                buy_amount,
                sell_amount,
            });
        }

        let trade = settle(tx, &order, &counter).await?;
        return Ok(Some(trade));
    }

    Ok(None)
}

/// Price compatibility of a counter-order against the new order.
fn crosses(order: &Order, counter_price: Amount) -> bool {
    match order.side {
        Side::Buy => counter_price <= order.price,
        Side::Sell => counter_price >= order.price,
    }
}

/// Settle a full match between the new order and a locked counter-order.
///
/// The clearing price is the sell order's price. The buyer gets back the
/// exact USD locked at placement (their own `price × amount`), pays the
/// seller `volume − commission` and the house `commission`, leaving the
/// buyer down by `volume` overall.
async fn settle(
    tx: &mut Transaction<'_>,
    order: &Order,
    counter: &Order,
) -> Result<Trade, EngineError> {
    let now = types::now_nanos();
    let (buy, sell) = match order.side {
        Side::Buy => (order.clone(), counter.clone()),
        Side::Sell => (counter.clone(), order.clone()),
    };

    let trade = Trade::from_match(&buy, &sell, now)?;
    let buyer_locked = buy.locked_value()?;
    let seller_proceeds = trade.seller_proceeds()?;

    // Both user rows first, then both asset rows, each pair in ascending id
    // order.
    tx.lock_user_pair(buy.user_id, sell.user_id).await?;
    assets::transfer_assets(tx, sell.user_id, buy.user_id, trade.symbol, trade.amount).await?;

    balance::release_funds(tx, buy.user_id, buyer_locked).await?;
    if seller_proceeds.is_positive() {
        balance::transfer_usd(tx, buy.user_id, sell.user_id, seller_proceeds).await?;
    }
    if trade.commission.is_positive() {
        balance::deduct_commission(tx, buy.user_id, trade.commission).await?;
    }

    let mut filled_buy = buy;
    filled_buy.mark_filled(now);
    tx.update_order(filled_buy);

    let mut filled_sell = sell;
    filled_sell.mark_filled(now);
    tx.update_order(filled_sell);

    tx.insert_trade(trade.clone());
    push_trade_audit(tx, &trade, now);
    queue_notifications(tx, &trade)?;

    tracing::debug!(
        trade_id = %trade.id,
        symbol = %trade.symbol,
        price = %trade.price,
        amount = %trade.amount,
        "orders matched"
    );

    Ok(trade)
}

fn push_trade_audit(tx: &mut Transaction<'_>, trade: &Trade, now: i64) {
    let legs = [
        (trade.buyer_id, AuditAction::TradeExecutedBuy, trade.buy_order_id, trade.seller_id),
        (trade.seller_id, AuditAction::TradeExecutedSell, trade.sell_order_id, trade.buyer_id),
    ];
    for (user_id, action, order_id, counterparty) in legs {
        tx.push_audit(AuditEntry::new(
            Some(user_id),
            action,
            EntityKind::Trade,
            trade.id.to_string(),
            json!({
                "order_id": order_id,
                "symbol": trade.symbol,
                "price": trade.price,
                "amount": trade.amount,
                "volume": trade.volume,
                "commission": trade.commission,
                "counterparty": counterparty,
            }),
            None,
            now,
        ));
    }
}

/// Queue one `order.matched` event per party, carrying that party's
/// post-settlement balance and full asset map.
fn queue_notifications(tx: &mut Transaction<'_>, trade: &Trade) -> Result<(), EngineError> {
    for user_id in [trade.buyer_id, trade.seller_id] {
        let usd_balance = tx.balance_of(user_id).ok_or(EngineError::Internal(
            "settled party has no balance row".to_string(),
        ))?;
        let user_assets = tx
            .asset_map(user_id)
            .iter()
            .map(|(symbol, asset)| (symbol.to_string(), assets::snapshot(asset)))
            .collect();

        let payload = events::OrderMatched {
            trade: trade.clone(),
            user_balance: events::MatchedBalance { usd_balance },
            user_assets,
        };
        let payload = serde_json::to_value(payload)
            .map_err(|err| EngineError::Internal(err.to_string()))?;
        tx.queue_event(user_id, events::ORDER_MATCHED, payload);
    }
    Ok(())
}
