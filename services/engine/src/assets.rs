//! Per-symbol asset operations
//!
//! Locking happens at order placement; settlement moves value straight out
//! of the seller's locked pool, so the seller's available portion is never
//! touched by a match.

use crate::store::{Store, Transaction};
use serde::Serialize;
use std::collections::BTreeMap;
use types::prelude::*;

/// Holding view: total, locked, and the derived available portion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetView {
    pub total: Amount,
    pub locked: Amount,
    pub available: Amount,
}

/// Snapshot one holding into its view shape.
pub fn snapshot(asset: &Asset) -> AssetView {
    AssetView {
        total: asset.amount,
        locked: asset.locked_amount,
        available: asset.available_amount(),
    }
}

/// All holdings of a user, keyed by symbol (its own read-only transaction).
pub fn assets_of(store: &Store, user_id: UserId) -> BTreeMap<Symbol, AssetView> {
    store
        .assets_of(user_id)
        .iter()
        .map(|(symbol, asset)| (*symbol, snapshot(asset)))
        .collect()
}

/// Fetch a holding row, creating an empty one if missing.
pub async fn get_or_create(
    tx: &mut Transaction<'_>,
    user_id: UserId,
    symbol: Symbol,
) -> Result<Asset, EngineError> {
    if let Some(asset) = tx.lock_asset(user_id, symbol).await? {
        return Ok(asset);
    }
    let asset = Asset::new(user_id, symbol);
    tx.update_asset(asset.clone());
    Ok(asset)
}

/// Commit part of the available holding to an open sell order.
pub async fn lock_assets(
    tx: &mut Transaction<'_>,
    user_id: UserId,
    symbol: Symbol,
    amount: Amount,
) -> Result<(), EngineError> {
    require_positive(amount)?;
    let mut asset = require_asset(tx, user_id, symbol).await?;
    let available = asset.available_amount();
    if available < amount {
        return Err(EngineError::InsufficientAssets {
            symbol,
            required: amount,
            available,
        });
    }
    asset.locked_amount = asset.locked_amount.checked_add(amount)?;
    tx.update_asset(asset);
    Ok(())
}

/// Return part of the locked holding to the available pool.
pub async fn release_assets(
    tx: &mut Transaction<'_>,
    user_id: UserId,
    symbol: Symbol,
    amount: Amount,
) -> Result<(), EngineError> {
    require_positive(amount)?;
    let mut asset = require_asset(tx, user_id, symbol).await?;
    if asset.locked_amount < amount {
        return Err(EngineError::InsufficientLocked {
            symbol,
            required: amount,
            locked: asset.locked_amount,
        });
    }
    asset.locked_amount = asset.locked_amount.checked_sub(amount)?;
    tx.update_asset(asset);
    Ok(())
}

/// Move `amount` out of `from`'s locked pool into `to`'s available pool,
/// locking both rows in ascending user-id order and creating the
/// destination row if missing.
pub async fn transfer_assets(
    tx: &mut Transaction<'_>,
    from: UserId,
    to: UserId,
    symbol: Symbol,
    amount: Amount,
) -> Result<(), EngineError> {
    require_positive(amount)?;
    tx.lock_asset_pair((from, symbol), (to, symbol)).await?;

    let mut src = require_asset(tx, from, symbol).await?;
    if src.locked_amount < amount {
        return Err(EngineError::InsufficientLocked {
            symbol,
            required: amount,
            locked: src.locked_amount,
        });
    }

    if from == to {
        // Self-trade settlement: the holding stays put, only the lock lifts.
        src.locked_amount = src.locked_amount.checked_sub(amount)?;
        tx.update_asset(src);
        return Ok(());
    }

    src.locked_amount = src.locked_amount.checked_sub(amount)?;
    src.amount = src.amount.checked_sub(amount)?;
    tx.update_asset(src);

    let mut dst = match tx.lock_asset(to, symbol).await? {
        Some(asset) => asset,
        None => Asset::new(to, symbol),
    };
    dst.amount = dst.amount.checked_add(amount)?;
    tx.update_asset(dst);
    Ok(())
}

/// Add to the available holding. Initial funding only.
pub async fn credit(
    tx: &mut Transaction<'_>,
    user_id: UserId,
    symbol: Symbol,
    amount: Amount,
) -> Result<(), EngineError> {
    require_positive(amount)?;
    let mut asset = get_or_create(tx, user_id, symbol).await?;
    asset.amount = asset.amount.checked_add(amount)?;
    tx.update_asset(asset);
    Ok(())
}

async fn require_asset(
    tx: &mut Transaction<'_>,
    user_id: UserId,
    symbol: Symbol,
) -> Result<Asset, EngineError> {
    tx.lock_asset(user_id, symbol)
        .await?
        .ok_or(EngineError::NotFound {
            kind: EntityKind::Asset,
            id: format!("{user_id}/{symbol}"),
        })
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

    async fn store_with_holding(amount: u64) -> (Arc<Store>, UserId) {
        let store = Arc::new(Store::new());
        let user_id = UserId::new();
        let mut tx = store.begin();
        credit(&mut tx, user_id, Symbol::Btc, Amount::from_units(amount))
            .await
            .unwrap();
        tx.commit();
        (store, user_id)
    }

    #[tokio::test]
    async fn test_credit_creates_row() {
        let (store, user_id) = store_with_holding(10).await;
        let asset = store.get_asset(user_id, Symbol::Btc).unwrap();
        assert_eq!(asset.amount, Amount::from_units(10));
        assert!(asset.locked_amount.is_zero());
    }

    #[tokio::test]
    async fn test_lock_and_release_roundtrip() {
        let (store, user_id) = store_with_holding(10).await;

        let mut tx = store.begin();
        lock_assets(&mut tx, user_id, Symbol::Btc, Amount::from_units(4))
            .await
            .unwrap();
        tx.commit();

        let asset = store.get_asset(user_id, Symbol::Btc).unwrap();
        assert_eq!(asset.locked_amount, Amount::from_units(4));
        assert_eq!(asset.available_amount(), Amount::from_units(6));

        let mut tx = store.begin();
        release_assets(&mut tx, user_id, Symbol::Btc, Amount::from_units(4))
            .await
            .unwrap();
        tx.commit();

        let asset = store.get_asset(user_id, Symbol::Btc).unwrap();
        assert!(asset.locked_amount.is_zero());
        assert_eq!(asset.available_amount(), Amount::from_units(10));
    }

    #[tokio::test]
    async fn test_lock_rejects_beyond_available() {
        let (store, user_id) = store_with_holding(10).await;

        let mut tx = store.begin();
        lock_assets(&mut tx, user_id, Symbol::Btc, Amount::from_units(8))
            .await
            .unwrap();
        let err = lock_assets(&mut tx, user_id, Symbol::Btc, Amount::from_units(3))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientAssets { .. }));
    }

    #[tokio::test]
    async fn test_lock_requires_existing_row() {
        let store = Store::new();
        let mut tx = store.begin();
        let err = lock_assets(&mut tx, UserId::new(), Symbol::Eth, Amount::from_units(1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_release_rejects_beyond_locked() {
        let (store, user_id) = store_with_holding(10).await;
        let mut tx = store.begin();
        let err = release_assets(&mut tx, user_id, Symbol::Btc, Amount::from_units(1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientLocked { .. }));
    }

    #[tokio::test]
    async fn test_transfer_moves_locked_into_available() {
        let (store, seller) = store_with_holding(10).await;
        let buyer = UserId::new();

        let mut tx = store.begin();
        lock_assets(&mut tx, seller, Symbol::Btc, Amount::from_units(3))
            .await
            .unwrap();
        tx.commit();

        let mut tx = store.begin();
        transfer_assets(&mut tx, seller, buyer, Symbol::Btc, Amount::from_units(3))
            .await
            .unwrap();
        tx.commit();

        let src = store.get_asset(seller, Symbol::Btc).unwrap();
        assert_eq!(src.amount, Amount::from_units(7));
        assert!(src.locked_amount.is_zero());
        assert_eq!(src.available_amount(), Amount::from_units(7));

        let dst = store.get_asset(buyer, Symbol::Btc).unwrap();
        assert_eq!(dst.amount, Amount::from_units(3));
        assert!(dst.locked_amount.is_zero());
    }

    #[tokio::test]
    async fn test_transfer_requires_locked_funds() {
        let (store, seller) = store_with_holding(10).await;
        let mut tx = store.begin();
        let err = transfer_assets(&mut tx, seller, UserId::new(), Symbol::Btc, Amount::from_units(1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientLocked { .. }));
    }

    #[tokio::test]
    async fn test_self_transfer_releases_lock_only() {
        let (store, user_id) = store_with_holding(10).await;

        let mut tx = store.begin();
        lock_assets(&mut tx, user_id, Symbol::Btc, Amount::from_units(2))
            .await
            .unwrap();
        transfer_assets(&mut tx, user_id, user_id, Symbol::Btc, Amount::from_units(2))
            .await
            .unwrap();
        tx.commit();

        let asset = store.get_asset(user_id, Symbol::Btc).unwrap();
        assert_eq!(asset.amount, Amount::from_units(10));
        assert!(asset.locked_amount.is_zero());
    }

    #[tokio::test]
    async fn test_snapshot_shape() {
        let (store, user_id) = store_with_holding(10).await;
        let views = assets_of(&store, user_id);
        let btc = views.get(&Symbol::Btc).unwrap();
        assert_eq!(btc.total, Amount::from_units(10));
        assert_eq!(btc.available, Amount::from_units(10));
        assert!(btc.locked.is_zero());
    }
}
