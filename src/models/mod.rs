//! Domain model: entities and closed enums shared by all services.

mod balance;
mod order;
mod trade;
mod transaction;
mod user;

pub use balance::{Asset, Balance};
pub use order::{Order, OrderStatus, OrderType, Side, TimeInForce};
pub use trade::Trade;
pub use transaction::{AuditLog, Transaction, TransactionStatus, TransactionType};
pub use user::{Account, AccountStatus, KycLevel, User};
