//! Market Data Fanout
//!
//! Bus-fed rolling caches of recent activity plus a pass-through order
//! book snapshot. Each cache is a bounded ring buffer; once capacity is
//! reached the oldest entry falls off.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::events::{
    EventBus, EventKind, ExchangeEvent, OrderAccepted, OrderStatusChanged, TradeExecuted,
};
use crate::services::matching::{BookLevel, MatchingEngine};

pub const DEFAULT_CAPACITY: usize = 100;

pub struct MarketDataService {
    capacity: usize,
    engine: Arc<Mutex<MatchingEngine>>,
    trades: RwLock<VecDeque<TradeExecuted>>,
    order_updates: RwLock<VecDeque<OrderStatusChanged>>,
    accepted_orders: RwLock<VecDeque<OrderAccepted>>,
}

impl MarketDataService {
    pub fn new(capacity: usize, engine: Arc<Mutex<MatchingEngine>>) -> Arc<Self> {
        Arc::new(Self {
            capacity: capacity.max(1),
            engine,
            trades: RwLock::new(VecDeque::new()),
            order_updates: RwLock::new(VecDeque::new()),
            accepted_orders: RwLock::new(VecDeque::new()),
        })
    }

    /// Wire the caches to the bus.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) {
        let service = Arc::clone(self);
        bus.subscribe(EventKind::TradeExecuted, move |event| {
            if let ExchangeEvent::TradeExecuted(trade) = event {
                push_bounded(&service.trades, service.capacity, trade.clone());
            }
        });

        let service = Arc::clone(self);
        bus.subscribe(EventKind::OrderStatusChanged, move |event| {
            if let ExchangeEvent::OrderStatusChanged(update) = event {
                push_bounded(&service.order_updates, service.capacity, update.clone());
            }
        });

        let service = Arc::clone(self);
        bus.subscribe(EventKind::OrderAccepted, move |event| {
            if let ExchangeEvent::OrderAccepted(accepted) = event {
                push_bounded(&service.accepted_orders, service.capacity, accepted.clone());
            }
        });
    }

    pub fn recent_trades(&self) -> Vec<TradeExecuted> {
        self.trades.read().iter().cloned().collect()
    }

    pub fn recent_order_updates(&self) -> Vec<OrderStatusChanged> {
        self.order_updates.read().iter().cloned().collect()
    }

    pub fn recent_accepted_orders(&self) -> Vec<OrderAccepted> {
        self.accepted_orders.read().iter().cloned().collect()
    }

    /// (bids best-to-worst, asks best-to-worst), straight from the engine.
    pub fn order_book_snapshot(&self) -> (Vec<BookLevel>, Vec<BookLevel>) {
        self.engine.lock().snapshot()
    }
}

fn push_bounded<T>(buffer: &RwLock<VecDeque<T>>, capacity: usize, item: T) {
    let mut buffer = buffer.write();
    if buffer.len() == capacity {
        buffer.pop_front();
    }
    buffer.push_back(item);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Order, OrderType, Side, TimeInForce};
    use crate::store::{tables, Database, InMemoryStore};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct Fixture {
        db: Arc<dyn Database>,
        bus: Arc<EventBus>,
        engine: Arc<Mutex<MatchingEngine>>,
        service: Arc<MarketDataService>,
    }

    fn fixture(capacity: usize) -> Fixture {
        let db: Arc<dyn Database> = Arc::new(InMemoryStore::new());
        let bus = Arc::new(EventBus::new());
        let engine = Arc::new(Mutex::new(MatchingEngine::new(
            "ALT/USDT",
            dec!(0.001),
            Arc::clone(&db),
            Arc::clone(&bus),
        )));
        let service = MarketDataService::new(capacity, Arc::clone(&engine));
        service.attach(&bus);
        Fixture {
            db,
            bus,
            engine,
            service,
        }
    }

    fn submit_limit(f: &Fixture, side: Side, price: Decimal, amount: Decimal) -> Order {
        let mut order = Order::new(
            f.db.next_id(tables::ORDERS),
            1,
            1,
            "ALT/USDT",
            side,
            OrderType::Limit,
            TimeInForce::Gtc,
            Some(price),
            amount,
        );
        f.db.insert_order(order.clone());
        f.engine.lock().submit(&mut order).unwrap();
        order
    }

    #[test]
    fn test_caches_fill_from_bus_events() {
        let f = fixture(DEFAULT_CAPACITY);
        submit_limit(&f, Side::Sell, dec!(100), dec!(2));
        submit_limit(&f, Side::Buy, dec!(100), dec!(2));

        let trades = f.service.recent_trades();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].price, dec!(100));

        assert_eq!(f.service.recent_accepted_orders().len(), 1);
        assert!(!f.service.recent_order_updates().is_empty());
    }

    #[test]
    fn test_ring_buffer_is_bounded() {
        let f = fixture(3);
        for _ in 0..5 {
            submit_limit(&f, Side::Sell, dec!(100), dec!(1));
            submit_limit(&f, Side::Buy, dec!(100), dec!(1));
        }

        let trades = f.service.recent_trades();
        assert_eq!(trades.len(), 3);
        // oldest entries were evicted
        let ids: Vec<u64> = trades.iter().map(|t| t.trade_id).collect();
        assert_eq!(ids, vec![3, 4, 5]);
    }

    #[test]
    fn test_snapshot_passthrough() {
        let f = fixture(DEFAULT_CAPACITY);
        submit_limit(&f, Side::Sell, dec!(101), dec!(4));
        submit_limit(&f, Side::Buy, dec!(99), dec!(2));

        let (bids, asks) = f.service.order_book_snapshot();
        assert_eq!(bids[0].price, dec!(99));
        assert_eq!(bids[0].amount, dec!(2));
        assert_eq!(asks[0].price, dec!(101));
        assert_eq!(asks[0].amount, dec!(4));
    }

    #[test]
    fn test_attach_registers_one_handler_per_kind() {
        let f = fixture(DEFAULT_CAPACITY);
        assert_eq!(f.bus.handler_count(EventKind::TradeExecuted), 1);
        assert_eq!(f.bus.handler_count(EventKind::OrderStatusChanged), 1);
        assert_eq!(f.bus.handler_count(EventKind::OrderAccepted), 1);
    }
}
