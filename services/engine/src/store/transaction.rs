//! Transactions over the store
//!
//! A transaction pins every row it touches behind an exclusive token and
//! works on private copies. Commit writes the copies back under the store's
//! commit gate; dropping the transaction without committing discards them.
//! Row tokens are held until the transaction ends either way (two-phase
//! locking), so a locked read is repeatable for the life of the transaction.

use super::{write_guard, AssetKey, RowKey, Store};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::OwnedMutexGuard;
use tokio::time::timeout;
use types::prelude::*;

/// A notification queued during a transaction, delivered only after commit.
#[derive(Debug, Clone)]
pub struct PendingEvent {
    pub user_id: UserId,
    pub event: &'static str,
    pub payload: serde_json::Value,
}

/// Result of a successful commit. Queued events must be flushed by the
/// caller; a rollback never yields any.
pub struct Committed {
    pub events: Vec<PendingEvent>,
}

pub struct Transaction<'a> {
    store: &'a Store,
    guards: HashMap<RowKey, OwnedMutexGuard<()>>,
    users: HashMap<UserId, User>,
    assets: HashMap<AssetKey, Asset>,
    orders: HashMap<OrderId, Order>,
    trades: Vec<Trade>,
    audit: Vec<AuditEntry>,
    commission: Amount,
    events: Vec<PendingEvent>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self {
            store,
            guards: HashMap::new(),
            users: HashMap::new(),
            assets: HashMap::new(),
            orders: HashMap::new(),
            trades: Vec::new(),
            audit: Vec::new(),
            commission: Amount::ZERO,
            events: Vec::new(),
        }
    }

    pub fn store(&self) -> &Store {
        self.store
    }

    /// Acquire a row token, bounded by the store's lock timeout. Idempotent
    /// within one transaction, so re-locking a held row never self-deadlocks.
    async fn acquire(&mut self, key: RowKey) -> Result<(), EngineError> {
        if self.guards.contains_key(&key) {
            return Ok(());
        }
        let lock = self.store.row_lock(key.clone());
        match timeout(self.store.lock_timeout(), lock.lock_owned()).await {
            Ok(guard) => {
                self.guards.insert(key, guard);
                Ok(())
            }
            Err(_) => Err(EngineError::Transient(format!(
                "lock wait timed out for {key:?}"
            ))),
        }
    }

    // ---- users -----------------------------------------------------------

    /// Lock a user row and return its current value.
    pub async fn lock_user(&mut self, id: UserId) -> Result<User, EngineError> {
        if let Some(user) = self.users.get(&id) {
            return Ok(user.clone());
        }
        self.acquire(RowKey::User(id)).await?;
        let user = self.store.get_user(id).ok_or(EngineError::NotFound {
            kind: EntityKind::User,
            id: id.to_string(),
        })?;
        self.users.insert(id, user.clone());
        Ok(user)
    }

    /// Lock two user rows in ascending id order.
    pub async fn lock_user_pair(&mut self, a: UserId, b: UserId) -> Result<(), EngineError> {
        let mut ids = [a, b];
        ids.sort();
        for id in ids {
            self.lock_user(id).await?;
        }
        Ok(())
    }

    /// Stage a new value for a user row locked by this transaction.
    pub fn update_user(&mut self, user: User) {
        debug_assert!(
            self.users.contains_key(&user.id),
            "user row was not locked or inserted first"
        );
        self.users.insert(user.id, user);
    }

    /// Stage a brand-new user row (not yet visible to other transactions).
    pub fn insert_user(&mut self, user: User) {
        self.users.insert(user.id, user);
    }

    /// Working-copy read of a user's balance, falling back to committed state.
    pub fn balance_of(&self, id: UserId) -> Option<Amount> {
        if let Some(user) = self.users.get(&id) {
            return Some(user.balance);
        }
        self.store.get_user(id).map(|user| user.balance)
    }

    // ---- assets ----------------------------------------------------------

    /// Lock an asset row and return its current value, or None if the row
    /// does not exist yet (the token is held either way).
    pub async fn lock_asset(
        &mut self,
        user_id: UserId,
        symbol: Symbol,
    ) -> Result<Option<Asset>, EngineError> {
        let key = (user_id, symbol);
        if let Some(asset) = self.assets.get(&key) {
            return Ok(Some(asset.clone()));
        }
        self.acquire(RowKey::Asset(user_id, symbol)).await?;
        match self.store.get_asset(user_id, symbol) {
            Some(asset) => {
                self.assets.insert(key, asset.clone());
                Ok(Some(asset))
            }
            None => Ok(None),
        }
    }

    /// Lock two asset rows in ascending user-id order.
    pub async fn lock_asset_pair(
        &mut self,
        a: AssetKey,
        b: AssetKey,
    ) -> Result<(), EngineError> {
        let mut keys = [a, b];
        keys.sort();
        for (user_id, symbol) in keys {
            self.lock_asset(user_id, symbol).await?;
        }
        Ok(())
    }

    /// Stage a new value for an asset row whose token this transaction holds.
    pub fn update_asset(&mut self, asset: Asset) {
        debug_assert!(
            self.guards
                .contains_key(&RowKey::Asset(asset.user_id, asset.symbol)),
            "asset row was not locked first"
        );
        self.assets.insert((asset.user_id, asset.symbol), asset);
    }

    /// A user's full holdings as this transaction sees them: committed rows
    /// overlaid with working copies.
    pub fn asset_map(&self, user_id: UserId) -> BTreeMap<Symbol, Asset> {
        let mut map = self.store.assets_of(user_id);
        for symbol in Symbol::ALL {
            if let Some(asset) = self.assets.get(&(user_id, symbol)) {
                map.insert(symbol, asset.clone());
            }
        }
        map
    }

    // ---- orders ----------------------------------------------------------

    /// Lock an order row and return its current value.
    pub async fn lock_order(&mut self, id: OrderId) -> Result<Order, EngineError> {
        if let Some(order) = self.orders.get(&id) {
            return Ok(order.clone());
        }
        self.acquire(RowKey::Order(id)).await?;
        let order = self.store.get_order(id).ok_or(EngineError::NotFound {
            kind: EntityKind::Order,
            id: id.to_string(),
        })?;
        self.orders.insert(id, order.clone());
        Ok(order)
    }

    /// Stage a brand-new order (not yet visible to other transactions).
    pub fn insert_order(&mut self, order: Order) {
        self.orders.insert(order.id, order);
    }

    /// Stage a new value for an order already part of this transaction.
    pub fn update_order(&mut self, order: Order) {
        debug_assert!(
            self.orders.contains_key(&order.id),
            "order was not locked or inserted first"
        );
        self.orders.insert(order.id, order);
    }

    /// Working-copy read of an order touched by this transaction.
    pub fn order(&self, id: OrderId) -> Option<Order> {
        self.orders.get(&id).cloned()
    }

    // ---- trades, audit, events, commission -------------------------------

    pub fn insert_trade(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn push_audit(&mut self, entry: AuditEntry) {
        self.audit.push(entry);
    }

    /// Accrue commission into the house sink, applied at commit.
    pub fn add_commission(&mut self, amount: Amount) -> Result<(), EngineError> {
        self.commission = self.commission.checked_add(amount)?;
        Ok(())
    }

    /// Queue a notification for delivery after commit.
    pub fn queue_event(&mut self, user_id: UserId, event: &'static str, payload: serde_json::Value) {
        self.events.push(PendingEvent {
            user_id,
            event,
            payload,
        });
    }

    // ---- commit ----------------------------------------------------------

    /// Publish every staged change atomically and release all row tokens.
    pub fn commit(self) -> Committed {
        let Transaction {
            store,
            guards,
            users,
            assets,
            orders,
            trades,
            audit,
            commission,
            events,
        } = self;

        {
            let _gate = write_guard(store.commit_gate());
            for (id, user) in users {
                store.users().insert(id, user);
            }
            for (key, asset) in assets {
                store.assets().insert(key, asset);
            }
            for (id, order) in orders {
                store.orders().insert(id, order);
            }
            if !trades.is_empty() {
                write_guard(store.trades_table()).extend(trades);
            }
            if !audit.is_empty() {
                write_guard(store.audit_table()).extend(audit);
            }
            if !commission.is_zero() {
                let mut total = write_guard(store.commission_cell());
                match total.checked_add(commission) {
                    Ok(sum) => *total = sum,
                    Err(err) => tracing::error!(%err, "commission sink overflow"),
                }
            }
        }

        // Row tokens release here, after every write is visible.
        drop(guards);

        Committed { events }
    }
}
