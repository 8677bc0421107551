//! Matching Engine
//!
//! Crosses incoming orders against resting liquidity under price-time
//! priority. Limit orders traverse the full cross-and-rest path; market
//! orders cross unconditionally and never rest; stop orders park until a
//! trade print reaches their trigger, then re-enter as limit orders; OCO
//! pairs are linked so that filling one leg cancels the other.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::errors::{ExchangeError, Result};
use crate::events::{
    EventBus, ExchangeEvent, OcoOrderCancelled, OrderAccepted, OrderStatusChanged, TradeExecuted,
};
use crate::models::{Order, OrderStatus, OrderType, Side, TimeInForce, Trade};
use crate::store::{tables, Database};

use super::orderbook::{BookLevel, BookSide};

/// A buy crosses a resting ask at or below its limit; a sell crosses a
/// resting bid at or above its limit; market orders cross anything.
fn price_crossed(order: &Order, resting_price: Decimal) -> bool {
    if order.order_type == OrderType::Market {
        return true;
    }
    let Some(limit) = order.price else {
        return true;
    };
    match order.side {
        Side::Buy => resting_price <= limit,
        Side::Sell => resting_price >= limit,
    }
}

pub struct MatchingEngine {
    market: String,
    fee_rate: Decimal,
    db: Arc<dyn Database>,
    bus: Arc<EventBus>,
    bids: BookSide,
    asks: BookSide,
    /// Parked stop orders awaiting their trigger price.
    stop_orders: Vec<Order>,
    /// OCO linkage, stored in both directions.
    oco_pairs: HashMap<u64, u64>,
}

impl MatchingEngine {
    pub fn new(
        market: impl Into<String>,
        fee_rate: Decimal,
        db: Arc<dyn Database>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            market: market.into(),
            fee_rate,
            db,
            bus,
            bids: BookSide::new(true),
            asks: BookSide::new(false),
            stop_orders: Vec::new(),
            oco_pairs: HashMap::new(),
        }
    }

    pub fn market(&self) -> &str {
        &self.market
    }

    pub fn fee_rate(&self) -> Decimal {
        self.fee_rate
    }

    pub fn bids(&self) -> &BookSide {
        &self.bids
    }

    pub fn asks(&self) -> &BookSide {
        &self.asks
    }

    pub fn stop_order_count(&self) -> usize {
        self.stop_orders.len()
    }

    pub fn oco_pair_count(&self) -> usize {
        self.oco_pairs.len() / 2
    }

    pub fn has_pending_stop(&self, order_id: u64) -> bool {
        self.stop_orders.iter().any(|o| o.id == order_id)
    }

    // ------------------------------------------------------------------
    // Order intake

    /// Match an incoming limit or market order, then run any stop orders
    /// triggered by the resulting prints. Returns every trade produced,
    /// in execution order.
    pub fn submit(&mut self, order: &mut Order) -> Result<Vec<Trade>> {
        if order.order_type == OrderType::Stop {
            return Err(
                ExchangeError::invalid_order("Stop orders are parked until triggered")
                    .with_detail("order_id", order.id),
            );
        }

        let db = Arc::clone(&self.db);
        let mut scope = db.begin();

        let mut trades = self.match_incoming(order)?;

        // Every print may trigger parked stops; triggered stops re-enter
        // as limit orders and may print further trades themselves.
        let mut index = 0;
        while index < trades.len() {
            let trigger_price = trades[index].price;
            for mut stop in self.take_triggered(trigger_price) {
                tracing::debug!(
                    order_id = stop.id,
                    trigger_price = %trigger_price,
                    "stop order triggered"
                );
                stop.order_type = OrderType::Limit;
                stop.updated_at = Utc::now();
                self.db.update_order(&stop);
                let more = self.match_incoming(&mut stop)?;
                trades.extend(more);
            }
            index += 1;
        }

        scope.commit();
        Ok(trades)
    }

    /// Park a stop order until its trigger price prints.
    pub fn park_stop(&mut self, order: Order) -> Result<()> {
        if order.stop_price.is_none() {
            return Err(ExchangeError::stop_order("Stop price is required")
                .with_detail("order_id", order.id));
        }
        if order.price.is_none() {
            return Err(
                ExchangeError::stop_order("Limit price is required for the triggered order")
                    .with_detail("order_id", order.id),
            );
        }
        tracing::debug!(order_id = order.id, side = %order.side, "stop order parked");
        self.stop_orders.push(order);
        Ok(())
    }

    /// Link two orders as an OCO pair.
    pub fn register_oco_pair(&mut self, order_id: u64, linked_order_id: u64) -> Result<()> {
        if order_id == linked_order_id {
            return Err(ExchangeError::order_link("Cannot link an order to itself")
                .with_detail("order_id", order_id));
        }
        if self.oco_pairs.contains_key(&order_id) || self.oco_pairs.contains_key(&linked_order_id)
        {
            return Err(
                ExchangeError::order_link("Order is already part of an OCO pair")
                    .with_detail("order_id", order_id)
                    .with_detail("linked_order_id", linked_order_id),
            );
        }
        self.oco_pairs.insert(order_id, linked_order_id);
        self.oco_pairs.insert(linked_order_id, order_id);
        Ok(())
    }

    /// Cancel a resting or parked order. Returns false when the order is
    /// unknown or already terminal.
    pub fn cancel(&mut self, order_id: u64) -> Result<bool> {
        let Some(mut order) = self.db.order(order_id) else {
            return Ok(false);
        };
        if !order.is_active() {
            return Ok(false);
        }

        let db = Arc::clone(&self.db);
        let mut scope = db.begin();

        if self.own_book_mut(order.side).remove(&order).is_none() {
            self.stop_orders.retain(|o| o.id != order_id);
        }
        // Explicit cancellation unlinks the pair; the peer keeps working.
        if let Some(peer_id) = self.oco_pairs.remove(&order_id) {
            self.oco_pairs.remove(&peer_id);
        }

        order.status = OrderStatus::Canceled;
        order.updated_at = Utc::now();
        self.db.update_order(&order);
        scope.commit();

        self.publish_status(&order, Some("user_canceled"));
        Ok(true)
    }

    /// Book snapshot: (bids best-to-worst, asks best-to-worst).
    pub fn snapshot(&self) -> (Vec<BookLevel>, Vec<BookLevel>) {
        (self.bids.aggregate_summary(), self.asks.aggregate_summary())
    }

    // ------------------------------------------------------------------
    // Matching internals

    fn match_incoming(&mut self, order: &mut Order) -> Result<Vec<Trade>> {
        if order.time_in_force == TimeInForce::Fok {
            let fillable = self.fillable_quantity(order);
            if fillable < order.remaining() {
                order.status = OrderStatus::Canceled;
                order.updated_at = Utc::now();
                self.db.update_order(order);
                self.publish_status(order, Some("FOK insufficient liquidity"));
                return Ok(Vec::new());
            }
        }

        let mut trades = Vec::new();
        let mut filled_order_ids: Vec<u64> = Vec::new();

        while order.remaining() > Decimal::ZERO {
            let now = Utc::now();

            // Consume the FIFO head at the best crossing price.
            let step = {
                let book = match order.side {
                    Side::Buy => &mut self.asks,
                    Side::Sell => &mut self.bids,
                };
                let Some(best_price) = book.best_price() else {
                    break;
                };
                if !price_crossed(order, best_price) {
                    break;
                }
                let (maker_snapshot, trade_amount) = {
                    let Some(resting) = book.peek_best_order_mut() else {
                        break;
                    };
                    let trade_amount = order.remaining().min(resting.remaining());
                    resting.filled += trade_amount;
                    resting.updated_at = now;
                    resting.status = if resting.remaining() <= Decimal::ZERO {
                        OrderStatus::Filled
                    } else {
                        OrderStatus::Partial
                    };
                    (resting.clone(), trade_amount)
                };
                if maker_snapshot.status == OrderStatus::Filled {
                    book.pop_best_order();
                }
                (maker_snapshot, trade_amount)
            };
            let (maker, trade_amount) = step;

            let trade_price = maker.price.ok_or_else(|| {
                ExchangeError::invalid_order("Unable to determine trade price")
                    .with_detail("maker_order_id", maker.id)
            })?;

            order.filled += trade_amount;
            order.updated_at = now;
            order.status = if order.remaining() <= Decimal::ZERO {
                OrderStatus::Filled
            } else {
                OrderStatus::Partial
            };

            let fee = trade_amount * self.fee_rate;
            let (buy_order_id, sell_order_id) = match order.side {
                Side::Buy => (order.id, maker.id),
                Side::Sell => (maker.id, order.id),
            };
            let trade = Trade {
                id: self.db.next_id(tables::TRADES),
                buy_order_id,
                sell_order_id,
                maker_order_id: maker.id,
                taker_order_id: order.id,
                taker_side: order.side,
                price: trade_price,
                amount: trade_amount,
                fee,
                created_at: now,
            };
            self.db.insert_trade(trade.clone());
            self.db.update_order(&maker);
            self.db.update_order(order);

            self.bus
                .publish(ExchangeEvent::TradeExecuted(TradeExecuted {
                    trade_id: trade.id,
                    market: self.market.clone(),
                    price: trade.price,
                    amount: trade.amount,
                    maker_order_id: maker.id,
                    taker_order_id: order.id,
                    taker_side: order.side,
                }));
            self.publish_status(&maker, None);

            if maker.status == OrderStatus::Filled {
                filled_order_ids.push(maker.id);
            }
            trades.push(trade);
        }

        if order.remaining() > Decimal::ZERO {
            let rests =
                order.order_type != OrderType::Market && order.time_in_force == TimeInForce::Gtc;
            if rests {
                order.status = if order.filled.is_zero() {
                    OrderStatus::Open
                } else {
                    OrderStatus::Partial
                };
                self.own_book_mut(order.side).add(order.clone())?;
                self.db.update_order(order);
                self.bus.publish(ExchangeEvent::OrderAccepted(OrderAccepted {
                    order_id: order.id,
                    market: self.market.clone(),
                    side: order.side,
                    remaining: order.remaining(),
                }));
                self.publish_status(order, None);
            } else {
                order.status = if order.filled.is_zero() {
                    OrderStatus::Canceled
                } else {
                    OrderStatus::Partial
                };
                order.updated_at = Utc::now();
                self.db.update_order(order);
                self.publish_status(order, Some("IOC remainder canceled"));
            }
        } else {
            order.status = OrderStatus::Filled;
            order.updated_at = Utc::now();
            self.db.update_order(order);
            self.publish_status(order, None);
        }

        if order.status == OrderStatus::Filled {
            filled_order_ids.push(order.id);
        }
        for order_id in filled_order_ids {
            self.resolve_oco(order_id);
        }

        Ok(trades)
    }

    fn fillable_quantity(&self, order: &Order) -> Decimal {
        let book = match order.side {
            Side::Buy => &self.asks,
            Side::Sell => &self.bids,
        };
        let mut to_fill = order.remaining();
        let mut fillable = Decimal::ZERO;
        for level in book.iter_price_levels() {
            if !price_crossed(order, level.price) {
                break;
            }
            let available = level.total_remaining();
            let fill = to_fill.min(available);
            fillable += fill;
            to_fill -= fill;
            if to_fill <= Decimal::ZERO {
                break;
            }
        }
        fillable
    }

    fn own_book_mut(&mut self, side: Side) -> &mut BookSide {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    fn take_triggered(&mut self, last_trade_price: Decimal) -> Vec<Order> {
        let mut triggered = Vec::new();
        self.stop_orders.retain(|order| {
            let hit = order.stop_price.is_some_and(|stop| match order.side {
                Side::Buy => last_trade_price >= stop,
                Side::Sell => last_trade_price <= stop,
            });
            if hit {
                triggered.push(order.clone());
            }
            !hit
        });
        triggered
    }

    fn resolve_oco(&mut self, order_id: u64) {
        let Some(peer_id) = self.oco_pairs.remove(&order_id) else {
            return;
        };
        self.oco_pairs.remove(&peer_id);

        let Some(mut peer) = self.db.order(peer_id) else {
            return;
        };
        if !peer.is_active() {
            return;
        }

        if self.own_book_mut(peer.side).remove(&peer).is_none() {
            self.stop_orders.retain(|o| o.id != peer_id);
        }
        peer.status = OrderStatus::Canceled;
        peer.updated_at = Utc::now();
        self.db.update_order(&peer);

        tracing::info!(
            order_id = peer_id,
            linked_order_id = order_id,
            "OCO peer cancelled"
        );
        self.bus
            .publish(ExchangeEvent::OcoOrderCancelled(OcoOrderCancelled {
                order_id: peer_id,
                linked_order_id: order_id,
            }));
        self.publish_status(&peer, Some("OCO peer filled"));
    }

    fn publish_status(&self, order: &Order, reason: Option<&str>) {
        self.bus
            .publish(ExchangeEvent::OrderStatusChanged(OrderStatusChanged {
                order_id: order.id,
                status: order.status,
                filled: order.filled,
                remaining: order.remaining(),
                reason: reason.map(str::to_string),
            }));
    }
}
