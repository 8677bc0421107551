//! In-Memory Store
//!
//! Reference implementation of the [`Database`] port. Tables are plain
//! maps behind one `RwLock`; the unit of work snapshots every table on
//! entry and restores the snapshot on rollback. Scopes are mutually
//! exclusive: `begin` holds a lock for the scope's whole lifetime, so a
//! rolled-back scope can never clobber rows another scope committed in
//! between. Id counters live outside the snapshot so ids stay strictly
//! increasing across aborted scopes.

use std::collections::HashMap;

use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::models::{
    Account, Asset, AuditLog, Balance, Order, Trade, Transaction, User,
};
use crate::store::{Database, UnitOfWork};

#[derive(Debug, Default, Clone)]
struct Tables {
    users: HashMap<u64, User>,
    accounts: HashMap<u64, Account>,
    balances: HashMap<u64, Balance>,
    balance_index: HashMap<(u64, Asset), u64>,
    orders: HashMap<u64, Order>,
    trades: HashMap<u64, Trade>,
    transactions: HashMap<u64, Transaction>,
    audit_logs: HashMap<u64, AuditLog>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    counters: Mutex<HashMap<String, u64>>,
    /// Held by each unit of work for its lifetime.
    scope_lock: Mutex<()>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn restore(&self, snapshot: Tables) {
        *self.tables.write() = snapshot;
    }
}

pub struct MemoryUnitOfWork<'a> {
    store: &'a InMemoryStore,
    _exclusive: MutexGuard<'a, ()>,
    snapshot: Option<Tables>,
    committed: bool,
}

impl UnitOfWork for MemoryUnitOfWork<'_> {
    fn commit(&mut self) {
        self.committed = true;
        self.snapshot = None;
    }

    fn rollback(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.store.restore(snapshot);
        }
        self.committed = true;
    }
}

impl Drop for MemoryUnitOfWork<'_> {
    fn drop(&mut self) {
        if !self.committed {
            if let Some(snapshot) = self.snapshot.take() {
                self.store.restore(snapshot);
            }
        }
    }
}

impl Database for InMemoryStore {
    fn next_id(&self, table: &str) -> u64 {
        let mut counters = self.counters.lock();
        let counter = counters.entry(table.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    fn begin(&self) -> Box<dyn UnitOfWork + '_> {
        let exclusive = self.scope_lock.lock();
        let snapshot = self.tables.read().clone();
        Box::new(MemoryUnitOfWork {
            store: self,
            _exclusive: exclusive,
            snapshot: Some(snapshot),
            committed: false,
        })
    }

    // ------------------------------------------------------------------
    // Users

    fn insert_user(&self, user: User) -> User {
        self.tables.write().users.insert(user.id, user.clone());
        user
    }

    fn user(&self, user_id: u64) -> Option<User> {
        self.tables.read().users.get(&user_id).cloned()
    }

    fn user_by_email(&self, email: &str) -> Option<User> {
        self.tables
            .read()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
    }

    // ------------------------------------------------------------------
    // Accounts

    fn insert_account(&self, account: Account) -> Account {
        self.tables
            .write()
            .accounts
            .insert(account.id, account.clone());
        account
    }

    fn account(&self, account_id: u64) -> Option<Account> {
        self.tables.read().accounts.get(&account_id).cloned()
    }

    fn update_account(&self, account: &Account) {
        self.tables
            .write()
            .accounts
            .insert(account.id, account.clone());
    }

    fn account_by_user(&self, user_id: u64) -> Option<Account> {
        self.tables
            .read()
            .accounts
            .values()
            .find(|a| a.user_id == user_id)
            .cloned()
    }

    // ------------------------------------------------------------------
    // Balances

    fn upsert_balance(&self, balance: Balance) -> Balance {
        let mut tables = self.tables.write();
        tables
            .balance_index
            .insert((balance.account_id, balance.asset), balance.id);
        tables.balances.insert(balance.id, balance.clone());
        balance
    }

    fn find_balance(&self, account_id: u64, asset: Asset) -> Option<Balance> {
        let tables = self.tables.read();
        let balance_id = tables.balance_index.get(&(account_id, asset))?;
        tables.balances.get(balance_id).cloned()
    }

    fn balances_by_account(&self, account_id: u64) -> Vec<Balance> {
        let mut balances: Vec<Balance> = self
            .tables
            .read()
            .balances
            .values()
            .filter(|b| b.account_id == account_id)
            .cloned()
            .collect();
        balances.sort_by_key(|b| b.id);
        balances
    }

    // ------------------------------------------------------------------
    // Orders

    fn insert_order(&self, order: Order) -> Order {
        self.tables.write().orders.insert(order.id, order.clone());
        order
    }

    fn update_order(&self, order: &Order) {
        self.tables.write().orders.insert(order.id, order.clone());
    }

    fn order(&self, order_id: u64) -> Option<Order> {
        self.tables.read().orders.get(&order_id).cloned()
    }

    fn orders_by_user(&self, user_id: u64) -> Vec<Order> {
        self.tables
            .read()
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect()
    }

    fn orders_by_account(&self, account_id: u64) -> Vec<Order> {
        self.tables
            .read()
            .orders
            .values()
            .filter(|o| o.account_id == account_id)
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------
    // Trades

    fn insert_trade(&self, trade: Trade) -> Trade {
        self.tables.write().trades.insert(trade.id, trade.clone());
        trade
    }

    fn trade(&self, trade_id: u64) -> Option<Trade> {
        self.tables.read().trades.get(&trade_id).cloned()
    }

    fn trades_by_user(&self, user_id: u64) -> Vec<Trade> {
        let tables = self.tables.read();
        let user_orders: Vec<u64> = tables
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .map(|o| o.id)
            .collect();
        tables
            .trades
            .values()
            .filter(|t| {
                user_orders.contains(&t.buy_order_id) || user_orders.contains(&t.sell_order_id)
            })
            .cloned()
            .collect()
    }

    fn recent_trades(&self, limit: usize) -> Vec<Trade> {
        let mut trades: Vec<Trade> = self.tables.read().trades.values().cloned().collect();
        trades.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        trades.truncate(limit);
        trades
    }

    // ------------------------------------------------------------------
    // Transactions

    fn insert_transaction(&self, tx: Transaction) -> Transaction {
        self.tables.write().transactions.insert(tx.id, tx.clone());
        tx
    }

    fn update_transaction(&self, tx: &Transaction) {
        self.tables.write().transactions.insert(tx.id, tx.clone());
    }

    fn transaction(&self, tx_id: u64) -> Option<Transaction> {
        self.tables.read().transactions.get(&tx_id).cloned()
    }

    fn transactions_by_user(&self, user_id: u64) -> Vec<Transaction> {
        self.tables
            .read()
            .transactions
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    fn all_transactions(&self) -> Vec<Transaction> {
        self.tables.read().transactions.values().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Audit logs

    fn insert_audit_log(&self, log: AuditLog) -> AuditLog {
        self.tables.write().audit_logs.insert(log.id, log.clone());
        log
    }

    fn audit_logs(&self, limit: usize) -> Vec<AuditLog> {
        let mut logs = self.all_audit_logs();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        logs.truncate(limit);
        logs
    }

    fn all_audit_logs(&self) -> Vec<AuditLog> {
        self.tables.read().audit_logs.values().cloned().collect()
    }
}
