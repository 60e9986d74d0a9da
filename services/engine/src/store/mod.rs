//! Transactional entity store
//!
//! All mutable state lives here: users, per-symbol holdings, orders, trades
//! and the audit trail. Mutations go through a [`Transaction`], which holds
//! exclusive per-row lock tokens, buffers every change against working
//! copies and publishes them atomically at commit. Dropping an uncommitted
//! transaction rolls everything back, row tokens included.
//!
//! Lock acquisition is bounded: a transaction that cannot obtain a row
//! token within the store's timeout fails with a transient error and rolls
//! back, which also resolves any cross-kind acquisition-order inversions.

mod transaction;

pub use transaction::{Committed, PendingEvent, Transaction};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::Mutex;
use types::prelude::*;

/// Default bound on row-lock acquisition waits.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

pub(crate) type AssetKey = (UserId, Symbol);

/// Canonical key for row-lock tokens.
///
/// The derived `Ord` gives the ascending `(kind, id)` order used whenever a
/// transaction locks several rows of the same kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RowKey {
    User(UserId),
    Asset(UserId, Symbol),
    Order(OrderId),
}

/// Sort direction for open-order queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceOrder {
    Ascending,
    Descending,
}

/// Append-only sink for audit entries. Implementations must never fail the
/// surrounding operation.
pub trait AuditSink: Send + Sync {
    fn log(&self, entry: AuditEntry);
}

pub struct Store {
    users: DashMap<UserId, User>,
    emails: DashMap<String, UserId>,
    assets: DashMap<AssetKey, Asset>,
    orders: DashMap<OrderId, Order>,
    trades: RwLock<Vec<Trade>>,
    audit: RwLock<Vec<AuditEntry>>,
    commission_total: RwLock<Amount>,
    row_locks: DashMap<RowKey, Arc<Mutex<()>>>,
    // Commits write every row of a transaction while holding this gate, so
    // multi-row queries never observe a half-applied commit.
    commit_gate: RwLock<()>,
    lock_timeout: Duration,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            users: DashMap::new(),
            emails: DashMap::new(),
            assets: DashMap::new(),
            orders: DashMap::new(),
            trades: RwLock::new(Vec::new()),
            audit: RwLock::new(Vec::new()),
            commission_total: RwLock::new(Amount::ZERO),
            row_locks: DashMap::new(),
            commit_gate: RwLock::new(()),
            lock_timeout,
        }
    }

    /// Start a new transaction.
    pub fn begin(&self) -> Transaction<'_> {
        Transaction::new(self)
    }

    // ---- committed reads ------------------------------------------------

    pub fn get_user(&self, id: UserId) -> Option<User> {
        let _gate = read_guard(&self.commit_gate);
        self.users.get(&id).map(|entry| entry.value().clone())
    }

    pub fn find_user_by_email(&self, email: &str) -> Option<User> {
        let id = *self.emails.get(&email.to_ascii_lowercase())?.value();
        self.get_user(id)
    }

    pub fn get_asset(&self, user_id: UserId, symbol: Symbol) -> Option<Asset> {
        let _gate = read_guard(&self.commit_gate);
        self.assets
            .get(&(user_id, symbol))
            .map(|entry| entry.value().clone())
    }

    /// Every holding of one user, keyed by symbol.
    pub fn assets_of(&self, user_id: UserId) -> BTreeMap<Symbol, Asset> {
        let _gate = read_guard(&self.commit_gate);
        Symbol::ALL
            .into_iter()
            .filter_map(|symbol| {
                self.assets
                    .get(&(user_id, symbol))
                    .map(|entry| (symbol, entry.value().clone()))
            })
            .collect()
    }

    pub fn get_order(&self, id: OrderId) -> Option<Order> {
        let _gate = read_guard(&self.commit_gate);
        self.orders.get(&id).map(|entry| entry.value().clone())
    }

    /// One user's orders, most recent first, optionally filtered by status.
    pub fn orders_of(&self, user_id: UserId, status: Option<OrderStatus>) -> Vec<Order> {
        let mut rows: Vec<Order> = {
            let _gate = read_guard(&self.commit_gate);
            self.orders
                .iter()
                .filter(|entry| {
                    let order = entry.value();
                    order.user_id == user_id && status.map_or(true, |s| order.status == s)
                })
                .map(|entry| entry.value().clone())
                .collect()
        };
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows
    }

    /// Open orders for one side of a symbol, sorted by price in the given
    /// direction, then by creation time, then by id.
    pub fn open_orders(&self, symbol: Symbol, side: Side, price_order: PriceOrder) -> Vec<Order> {
        let mut rows: Vec<Order> = {
            let _gate = read_guard(&self.commit_gate);
            self.orders
                .iter()
                .filter(|entry| {
                    let order = entry.value();
                    order.symbol == symbol
                        && order.side == side
                        && order.status == OrderStatus::Open
                })
                .map(|entry| entry.value().clone())
                .collect()
        };
        rows.sort_by(|a, b| {
            let by_price = match price_order {
                PriceOrder::Ascending => a.price.cmp(&b.price),
                PriceOrder::Descending => b.price.cmp(&a.price),
            };
            by_price
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        rows
    }

    pub fn trades(&self) -> Vec<Trade> {
        read_guard(&self.trades).clone()
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        read_guard(&self.audit).clone()
    }

    /// Commission deducted across all trades ever settled (the house sink).
    pub fn total_commission(&self) -> Amount {
        *read_guard(&self.commission_total)
    }

    // ---- registration support -------------------------------------------

    /// Atomically claim an email address for a new user.
    pub fn reserve_email(&self, email: &str, user_id: UserId) -> Result<(), EngineError> {
        match self.emails.entry(email.to_ascii_lowercase()) {
            Entry::Occupied(_) => Err(ValidationError::EmailTaken(email.to_string()).into()),
            Entry::Vacant(slot) => {
                slot.insert(user_id);
                Ok(())
            }
        }
    }

    /// Undo an email reservation after a failed registration.
    pub fn release_email(&self, email: &str) {
        self.emails.remove(&email.to_ascii_lowercase());
    }

    // ---- internals shared with Transaction -------------------------------

    pub(crate) fn row_lock(&self, key: RowKey) -> Arc<Mutex<()>> {
        self.row_locks.entry(key).or_default().clone()
    }

    pub(crate) fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    pub(crate) fn commit_gate(&self) -> &RwLock<()> {
        &self.commit_gate
    }

    pub(crate) fn users(&self) -> &DashMap<UserId, User> {
        &self.users
    }

    pub(crate) fn assets(&self) -> &DashMap<AssetKey, Asset> {
        &self.assets
    }

    pub(crate) fn orders(&self) -> &DashMap<OrderId, Order> {
        &self.orders
    }

    pub(crate) fn trades_table(&self) -> &RwLock<Vec<Trade>> {
        &self.trades
    }

    pub(crate) fn audit_table(&self) -> &RwLock<Vec<AuditEntry>> {
        &self.audit
    }

    pub(crate) fn commission_cell(&self) -> &RwLock<Amount> {
        &self.commission_total
    }
}

impl AuditSink for Store {
    fn log(&self, entry: AuditEntry) {
        write_guard(&self.audit).push(entry);
    }
}

// Poisoning only happens if a writer panicked; the data is plain values, so
// recovering the guard is always safe.
pub(crate) fn read_guard<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn write_guard<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
