//! In-Process Event Bus
//!
//! Synchronous typed publish/subscribe used to fan state transitions out
//! to observers (market data caches, broadcast adapters). Handlers run on
//! the publishing thread in registration order; a panicking handler is
//! logged and suppressed so the remaining handlers still run.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{Asset, OrderStatus, Side};

// ============================================================================
// Event Payloads
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct OrderAccepted {
    pub order_id: u64,
    pub market: String,
    pub side: Side,
    #[serde(with = "rust_decimal::serde::str")]
    pub remaining: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderStatusChanged {
    pub order_id: u64,
    pub status: OrderStatus,
    #[serde(with = "rust_decimal::serde::str")]
    pub filled: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub remaining: Decimal,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TradeExecuted {
    pub trade_id: u64,
    pub market: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub maker_order_id: u64,
    pub taker_order_id: u64,
    pub taker_side: Side,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceChanged {
    pub account_id: u64,
    pub asset: Asset,
    #[serde(with = "rust_decimal::serde::str")]
    pub available: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub locked: Decimal,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountFrozen {
    pub account_id: u64,
    pub user_id: u64,
    pub frozen_by: u64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountUnfrozen {
    pub account_id: u64,
    pub user_id: u64,
    pub unfrozen_by: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalApproved {
    pub transaction_id: u64,
    pub approver_id: u64,
    pub approved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalRejected {
    pub transaction_id: u64,
    pub approver_id: u64,
    pub rejected_at: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OcoOrderCancelled {
    pub order_id: u64,
    pub linked_order_id: u64,
}

// ============================================================================
// Event Envelope
// ============================================================================

/// All events the core publishes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExchangeEvent {
    OrderAccepted(OrderAccepted),
    OrderStatusChanged(OrderStatusChanged),
    TradeExecuted(TradeExecuted),
    BalanceChanged(BalanceChanged),
    AccountFrozen(AccountFrozen),
    AccountUnfrozen(AccountUnfrozen),
    WithdrawalApproved(WithdrawalApproved),
    WithdrawalRejected(WithdrawalRejected),
    OcoOrderCancelled(OcoOrderCancelled),
}

/// Subscription key: one kind per event variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    OrderAccepted,
    OrderStatusChanged,
    TradeExecuted,
    BalanceChanged,
    AccountFrozen,
    AccountUnfrozen,
    WithdrawalApproved,
    WithdrawalRejected,
    OcoOrderCancelled,
}

impl ExchangeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ExchangeEvent::OrderAccepted(_) => EventKind::OrderAccepted,
            ExchangeEvent::OrderStatusChanged(_) => EventKind::OrderStatusChanged,
            ExchangeEvent::TradeExecuted(_) => EventKind::TradeExecuted,
            ExchangeEvent::BalanceChanged(_) => EventKind::BalanceChanged,
            ExchangeEvent::AccountFrozen(_) => EventKind::AccountFrozen,
            ExchangeEvent::AccountUnfrozen(_) => EventKind::AccountUnfrozen,
            ExchangeEvent::WithdrawalApproved(_) => EventKind::WithdrawalApproved,
            ExchangeEvent::WithdrawalRejected(_) => EventKind::WithdrawalRejected,
            ExchangeEvent::OcoOrderCancelled(_) => EventKind::OcoOrderCancelled,
        }
    }
}

// ============================================================================
// Bus
// ============================================================================

type Handler = Box<dyn Fn(&ExchangeEvent) + Send + Sync>;

/// Type-keyed handler table. Handler lists are expected to be registered
/// at startup and must not be mutated concurrently with publication.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<EventKind, Vec<Handler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&ExchangeEvent) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .entry(kind)
            .or_default()
            .push(Box::new(handler));
    }

    /// Deliver `event` to every handler registered for its kind, in
    /// registration order.
    pub fn publish(&self, event: ExchangeEvent) {
        let handlers = self.handlers.read();
        let Some(registered) = handlers.get(&event.kind()) else {
            return;
        };
        for handler in registered {
            if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                tracing::error!(kind = ?event.kind(), "event handler panicked; continuing");
            }
        }
    }

    /// Number of handlers registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.read().get(&kind).map_or(0, Vec::len)
    }
}
