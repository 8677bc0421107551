//! Order Matching
//!
//! Price-time priority matching for a single market.
//!
//! ```text
//! AccountService
//!   ↓ submit / park_stop / register_oco_pair / cancel
//! MatchingEngine
//!   ├→ BookSide (bids)   price level index, FIFO within a level
//!   ├→ BookSide (asks)
//!   ├→ pending stop orders (triggered by trade prints)
//!   └→ OCO link map (bidirectional)
//! ```
//!
//! The engine persists order and trade records through the store port and
//! broadcasts `TradeExecuted` / `OrderStatusChanged` / `OrderAccepted` /
//! `OcoOrderCancelled` on the event bus as it goes.

mod engine;
mod orderbook;

pub use engine::MatchingEngine;
pub use orderbook::{BookLevel, BookSide, PriceLevel};
