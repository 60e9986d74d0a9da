//! USD balance operations
//!
//! Every mutation runs against a caller-supplied transaction; the outermost
//! caller owns commit and rollback. `balance` on the user row is the
//! available balance — locking subtracts from it directly, so funds held
//! for open buy orders can never be spent twice.

use crate::store::{Store, Transaction};
use serde::Serialize;
use types::prelude::*;

/// Balance view returned to callers. `available_usd` mirrors `balance` for
/// compatibility with older clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceView {
    pub balance: Amount,
    pub available_usd: Amount,
}

/// Current balance of a user (its own read-only transaction).
pub fn balance_of(store: &Store, user_id: UserId) -> Result<BalanceView, EngineError> {
    let user = store.get_user(user_id).ok_or(EngineError::NotFound {
        kind: EntityKind::User,
        id: user_id.to_string(),
    })?;
    Ok(BalanceView {
        balance: user.balance,
        available_usd: user.balance,
    })
}

/// Move `amount` out of the user's available balance.
pub async fn lock_funds(
    tx: &mut Transaction<'_>,
    user_id: UserId,
    amount: Amount,
) -> Result<(), EngineError> {
    require_positive(amount)?;
    let mut user = tx.lock_user(user_id).await?;
    if user.balance < amount {
        return Err(EngineError::InsufficientBalance {
            required: amount,
            available: user.balance,
        });
    }
    user.balance = user.balance.checked_sub(amount)?;
    tx.update_user(user);
    Ok(())
}

/// Return previously locked funds to the user's available balance.
pub async fn release_funds(
    tx: &mut Transaction<'_>,
    user_id: UserId,
    amount: Amount,
) -> Result<(), EngineError> {
    require_positive(amount)?;
    let mut user = tx.lock_user(user_id).await?;
    user.balance = user.balance.checked_add(amount)?;
    tx.update_user(user);
    Ok(())
}

/// Move USD between two users, locking both rows in ascending id order.
pub async fn transfer_usd(
    tx: &mut Transaction<'_>,
    from: UserId,
    to: UserId,
    amount: Amount,
) -> Result<(), EngineError> {
    require_positive(amount)?;
    tx.lock_user_pair(from, to).await?;

    if from == to {
        // Self-trade settlement: the payer must still cover the amount, but
        // the net movement on the single row is zero.
        let user = tx.lock_user(from).await?;
        if user.balance < amount {
            return Err(EngineError::InsufficientBalance {
                required: amount,
                available: user.balance,
            });
        }
        return Ok(());
    }

    let mut src = tx.lock_user(from).await?;
    if src.balance < amount {
        return Err(EngineError::InsufficientBalance {
            required: amount,
            available: src.balance,
        });
    }
    src.balance = src.balance.checked_sub(amount)?;
    tx.update_user(src);

    let mut dst = tx.lock_user(to).await?;
    dst.balance = dst.balance.checked_add(amount)?;
    tx.update_user(dst);
    Ok(())
}

/// Deduct commission from a user. Unlike [`lock_funds`] there is no matching
/// release; the amount accrues into the store's commission sink.
pub async fn deduct_commission(
    tx: &mut Transaction<'_>,
    user_id: UserId,
    amount: Amount,
) -> Result<(), EngineError> {
    require_positive(amount)?;
    let mut user = tx.lock_user(user_id).await?;
    if user.balance < amount {
        return Err(EngineError::InsufficientBalance {
            required: amount,
            available: user.balance,
        });
    }
    user.balance = user.balance.checked_sub(amount)?;
    tx.update_user(user);
    tx.add_commission(amount)?;
    Ok(())
}

fn require_positive(amount: Amount) -> Result<(), EngineError> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(ValidationError::NonPositiveAmount.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn store_with_user(balance: u64) -> (Arc<Store>, UserId) {
        let store = Arc::new(Store::new());
        let mut user = User::new("alice", "alice@example.com", "hash", 1);
        user.balance = Amount::from_units(balance);
        let id = user.id;
        let mut tx = store.begin();
        tx.insert_user(user);
        tx.commit();
        (store, id)
    }

    #[tokio::test]
    async fn test_lock_and_release_roundtrip() {
        let (store, id) = store_with_user(1_000).await;

        let mut tx = store.begin();
        lock_funds(&mut tx, id, Amount::from_units(400)).await.unwrap();
        tx.commit();
        assert_eq!(
            balance_of(&store, id).unwrap().balance,
            Amount::from_units(600)
        );

        let mut tx = store.begin();
        release_funds(&mut tx, id, Amount::from_units(400)).await.unwrap();
        tx.commit();
        assert_eq!(
            balance_of(&store, id).unwrap().balance,
            Amount::from_units(1_000)
        );
    }

    #[tokio::test]
    async fn test_lock_rejects_insufficient_balance() {
        let (store, id) = store_with_user(100).await;

        let mut tx = store.begin();
        let err = lock_funds(&mut tx, id, Amount::from_units(101))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientBalance { .. }));
        drop(tx);

        assert_eq!(
            balance_of(&store, id).unwrap().balance,
            Amount::from_units(100)
        );
    }

    #[tokio::test]
    async fn test_lock_rejects_zero_amount() {
        let (store, id) = store_with_user(100).await;
        let mut tx = store.begin();
        let err = lock_funds(&mut tx, id, Amount::ZERO).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_transfer_moves_funds() {
        let (store, from) = store_with_user(1_000).await;
        let to = {
            let user = User::new("bob", "bob@example.com", "hash", 1);
            let id = user.id;
            let mut tx = store.begin();
            tx.insert_user(user);
            tx.commit();
            id
        };

        let mut tx = store.begin();
        transfer_usd(&mut tx, from, to, Amount::from_units(250))
            .await
            .unwrap();
        tx.commit();

        assert_eq!(
            balance_of(&store, from).unwrap().balance,
            Amount::from_units(750)
        );
        assert_eq!(
            balance_of(&store, to).unwrap().balance,
            Amount::from_units(10_250)
        );
    }

    #[tokio::test]
    async fn test_self_transfer_is_net_zero() {
        let (store, id) = store_with_user(1_000).await;

        let mut tx = store.begin();
        transfer_usd(&mut tx, id, id, Amount::from_units(250))
            .await
            .unwrap();
        tx.commit();

        assert_eq!(
            balance_of(&store, id).unwrap().balance,
            Amount::from_units(1_000)
        );
    }

    #[tokio::test]
    async fn test_deduct_commission_feeds_the_sink() {
        let (store, id) = store_with_user(1_000).await;

        let mut tx = store.begin();
        deduct_commission(&mut tx, id, Amount::from_units(15))
            .await
            .unwrap();
        tx.commit();

        assert_eq!(
            balance_of(&store, id).unwrap().balance,
            Amount::from_units(985)
        );
        assert_eq!(store.total_commission(), Amount::from_units(15));
    }

    #[tokio::test]
    async fn test_balance_view_compatibility_alias() {
        let (store, id) = store_with_user(100).await;
        let view = balance_of(&store, id).unwrap();
        assert_eq!(view.balance, view.available_usd);
    }
}
