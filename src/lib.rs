//! ALTX Exchange Core
//!
//! Single-market spot exchange engine for the ALT/USDT pair:
//!
//! ```text
//! REST / WS adapters (external)
//!   ↓
//! ExchangeContext
//!   ├→ AccountService (locks, settlement, deposits, withdrawals)
//!   │    └→ MatchingEngine (price-time priority, GTC/IOC/FOK, stop & OCO)
//!   │         └→ BookSide (per-side price level index)
//!   ├→ AdminService (two-eye withdrawal approval, account freeze, audit)
//!   ├→ WalletService (deposit addresses, withdrawal transmission)
//!   ├→ MarketDataService (rolling trade/order caches fed by the event bus)
//!   └→ Database port (in-memory reference store with unit-of-work scopes)
//! ```
//!
//! All monetary arithmetic uses `rust_decimal::Decimal`; JSON encodes
//! monetary fields as strings. State transitions are broadcast on the
//! in-process [`events::EventBus`].

pub mod config;
pub mod context;
pub mod errors;
pub mod events;
pub mod models;
pub mod services;
pub mod store;

pub use config::AppConfig;
pub use context::ExchangeContext;
pub use errors::{ExchangeError, Result};
