//! Persistence Port
//!
//! The abstract store the services compile against, plus the unit-of-work
//! scope that gives a sequence of mutations all-or-nothing semantics. Any
//! conforming backend may be swapped in; [`memory::InMemoryStore`] is the
//! in-process reference implementation.

pub mod memory;

pub use memory::InMemoryStore;

use crate::models::{
    Account, Asset, AuditLog, Balance, Order, Trade, Transaction, User,
};

pub mod tables {
    pub const USERS: &str = "users";
    pub const ACCOUNTS: &str = "accounts";
    pub const BALANCES: &str = "balances";
    pub const ORDERS: &str = "orders";
    pub const TRADES: &str = "trades";
    pub const TRANSACTIONS: &str = "transactions";
    pub const AUDIT_LOGS: &str = "audit_logs";
}

/// All-or-nothing scope over store mutations.
///
/// Call [`UnitOfWork::commit`] on the success path; dropping the scope
/// without committing rolls every mutation back.
pub trait UnitOfWork {
    fn commit(&mut self);
    fn rollback(&mut self);
}

/// Repository contract the core consumes.
///
/// Implementations must provide strict serializability for the contents
/// of any one unit-of-work scope.
pub trait Database: Send + Sync {
    /// Strictly increasing id per table; never rewound by rollback.
    fn next_id(&self, table: &str) -> u64;

    /// Open a transactional scope.
    fn begin(&self) -> Box<dyn UnitOfWork + '_>;

    // Users
    fn insert_user(&self, user: User) -> User;
    fn user(&self, user_id: u64) -> Option<User>;
    fn user_by_email(&self, email: &str) -> Option<User>;

    // Accounts
    fn insert_account(&self, account: Account) -> Account;
    fn account(&self, account_id: u64) -> Option<Account>;
    fn update_account(&self, account: &Account);
    fn account_by_user(&self, user_id: u64) -> Option<Account>;

    // Balances (keyed by (account, asset))
    fn upsert_balance(&self, balance: Balance) -> Balance;
    fn find_balance(&self, account_id: u64, asset: Asset) -> Option<Balance>;
    fn balances_by_account(&self, account_id: u64) -> Vec<Balance>;

    // Orders
    fn insert_order(&self, order: Order) -> Order;
    fn update_order(&self, order: &Order);
    fn order(&self, order_id: u64) -> Option<Order>;
    fn orders_by_user(&self, user_id: u64) -> Vec<Order>;
    fn orders_by_account(&self, account_id: u64) -> Vec<Order>;

    // Trades
    fn insert_trade(&self, trade: Trade) -> Trade;
    fn trade(&self, trade_id: u64) -> Option<Trade>;
    fn trades_by_user(&self, user_id: u64) -> Vec<Trade>;
    fn recent_trades(&self, limit: usize) -> Vec<Trade>;

    // Transactions
    fn insert_transaction(&self, tx: Transaction) -> Transaction;
    fn update_transaction(&self, tx: &Transaction);
    fn transaction(&self, tx_id: u64) -> Option<Transaction>;
    fn transactions_by_user(&self, user_id: u64) -> Vec<Transaction>;
    fn all_transactions(&self) -> Vec<Transaction>;

    // Audit logs
    fn insert_audit_log(&self, log: AuditLog) -> AuditLog;
    fn audit_logs(&self, limit: usize) -> Vec<AuditLog>;
    fn all_audit_logs(&self) -> Vec<AuditLog>;
}
