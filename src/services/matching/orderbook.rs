//! Order Book Side
//!
//! One side of the book: a price-to-level map paired with a sorted price
//! vector. The vector stays ascending; the best price is its last element
//! on the buy side and its first on the sell side. Orders within a level
//! queue FIFO, which is the time-priority tiebreaker.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};

use rust_decimal::Decimal;
use serde::Serialize;

use crate::errors::{ExchangeError, Result};
use crate::models::Order;

/// FIFO queue of resting orders at one price.
#[derive(Debug, Clone)]
pub struct PriceLevel {
    pub price: Decimal,
    pub orders: VecDeque<Order>,
}

impl PriceLevel {
    fn new(price: Decimal) -> Self {
        Self {
            price,
            orders: VecDeque::new(),
        }
    }

    /// Sum of unfilled quantity across the level.
    pub fn total_remaining(&self) -> Decimal {
        self.orders.iter().map(|o| o.remaining()).sum()
    }
}

/// Aggregated (price, remaining) pair for snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookLevel {
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
}

#[derive(Debug)]
pub struct BookSide {
    is_buy: bool,
    levels: HashMap<Decimal, PriceLevel>,
    /// Always sorted ascending; contains exactly the keys of `levels`.
    prices: Vec<Decimal>,
}

impl BookSide {
    pub fn new(is_buy: bool) -> Self {
        Self {
            is_buy,
            levels: HashMap::new(),
            prices: Vec::new(),
        }
    }

    pub fn is_buy(&self) -> bool {
        self.is_buy
    }

    /// Append a resting order to the FIFO for its price, creating the
    /// level if absent.
    pub fn add(&mut self, order: Order) -> Result<()> {
        let price = order.price.ok_or_else(|| {
            ExchangeError::invalid_order("Limit price is required for resting orders")
                .with_detail("order_id", order.id)
        })?;

        match self.levels.entry(price) {
            Entry::Occupied(mut level) => level.get_mut().orders.push_back(order),
            Entry::Vacant(slot) => {
                if let Err(index) = self.prices.binary_search(&price) {
                    self.prices.insert(index, price);
                }
                let level = slot.insert(PriceLevel::new(price));
                level.orders.push_back(order);
            }
        }
        Ok(())
    }

    /// Best price for this side, if any.
    pub fn best_price(&self) -> Option<Decimal> {
        if self.is_buy {
            self.prices.last().copied()
        } else {
            self.prices.first().copied()
        }
    }

    /// FIFO head at the best price.
    pub fn peek_best_order(&self) -> Option<&Order> {
        let best = self.best_price()?;
        self.levels.get(&best)?.orders.front()
    }

    pub fn peek_best_order_mut(&mut self) -> Option<&mut Order> {
        let best = self.best_price()?;
        self.levels.get_mut(&best)?.orders.front_mut()
    }

    /// Remove and return the FIFO head at the best price. Removing the
    /// last order at a price deletes the level.
    pub fn pop_best_order(&mut self) -> Option<Order> {
        let best = self.best_price()?;
        let order = self.levels.get_mut(&best)?.orders.pop_front();
        if self.levels.get(&best).is_some_and(|l| l.orders.is_empty()) {
            self.remove_price(best);
        }
        order
    }

    /// Levels from best to worst.
    pub fn iter_price_levels(&self) -> Box<dyn Iterator<Item = &PriceLevel> + '_> {
        let prices: Box<dyn Iterator<Item = &Decimal> + '_> = if self.is_buy {
            Box::new(self.prices.iter().rev())
        } else {
            Box::new(self.prices.iter())
        };
        Box::new(prices.filter_map(move |price| self.levels.get(price)))
    }

    /// Remove a specific resting order; O(level size). Deletes the level
    /// if it empties.
    pub fn remove(&mut self, order: &Order) -> Option<Order> {
        let price = order.price?;
        let level = self.levels.get_mut(&price)?;
        let position = level.orders.iter().position(|o| o.id == order.id)?;
        let removed = level.orders.remove(position);
        if self
            .levels
            .get(&price)
            .is_some_and(|l| l.orders.is_empty())
        {
            self.remove_price(price);
        }
        removed
    }

    /// (price, sum of remaining) pairs from best to worst.
    pub fn aggregate_summary(&self) -> Vec<BookLevel> {
        self.iter_price_levels()
            .map(|level| BookLevel {
                price: level.price,
                amount: level.total_remaining(),
            })
            .collect()
    }

    /// Total resting orders across all levels.
    pub fn order_count(&self) -> usize {
        self.levels.values().map(|l| l.orders.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn contains(&self, order_id: u64) -> bool {
        self.levels
            .values()
            .any(|l| l.orders.iter().any(|o| o.id == order_id))
    }

    fn remove_price(&mut self, price: Decimal) {
        if let Ok(index) = self.prices.binary_search(&price) {
            self.prices.remove(index);
        }
        self.levels.remove(&price);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderType, Side, TimeInForce};
    use rust_decimal_macros::dec;

    fn resting(id: u64, side: Side, price: Decimal, amount: Decimal) -> Order {
        Order::new(
            id,
            1,
            1,
            "ALT/USDT",
            side,
            OrderType::Limit,
            TimeInForce::Gtc,
            Some(price),
            amount,
        )
    }

    #[test]
    fn test_add_requires_price() {
        let mut side = BookSide::new(false);
        let mut order = resting(1, Side::Sell, dec!(100), dec!(1));
        order.price = None;
        assert!(matches!(
            side.add(order),
            Err(ExchangeError::InvalidOrder(_))
        ));
    }

    #[test]
    fn test_best_price_per_side() {
        let mut asks = BookSide::new(false);
        asks.add(resting(1, Side::Sell, dec!(101), dec!(1))).unwrap();
        asks.add(resting(2, Side::Sell, dec!(100), dec!(1))).unwrap();
        asks.add(resting(3, Side::Sell, dec!(102), dec!(1))).unwrap();
        assert_eq!(asks.best_price(), Some(dec!(100)));

        let mut bids = BookSide::new(true);
        bids.add(resting(4, Side::Buy, dec!(98), dec!(1))).unwrap();
        bids.add(resting(5, Side::Buy, dec!(99), dec!(1))).unwrap();
        assert_eq!(bids.best_price(), Some(dec!(99)));
    }

    #[test]
    fn test_fifo_within_level() {
        let mut asks = BookSide::new(false);
        asks.add(resting(1, Side::Sell, dec!(100), dec!(1))).unwrap();
        asks.add(resting(2, Side::Sell, dec!(100), dec!(2))).unwrap();

        assert_eq!(asks.peek_best_order().map(|o| o.id), Some(1));
        assert_eq!(asks.pop_best_order().map(|o| o.id), Some(1));
        assert_eq!(asks.pop_best_order().map(|o| o.id), Some(2));
        assert!(asks.is_empty());
    }

    #[test]
    fn test_pop_deletes_emptied_level() {
        let mut asks = BookSide::new(false);
        asks.add(resting(1, Side::Sell, dec!(100), dec!(1))).unwrap();
        asks.add(resting(2, Side::Sell, dec!(101), dec!(1))).unwrap();

        asks.pop_best_order();
        assert_eq!(asks.best_price(), Some(dec!(101)));
        assert_eq!(asks.order_count(), 1);
    }

    #[test]
    fn test_remove_specific_order() {
        let mut bids = BookSide::new(true);
        bids.add(resting(1, Side::Buy, dec!(99), dec!(1))).unwrap();
        bids.add(resting(2, Side::Buy, dec!(99), dec!(2))).unwrap();
        bids.add(resting(3, Side::Buy, dec!(98), dec!(1))).unwrap();

        let target = resting(2, Side::Buy, dec!(99), dec!(2));
        let removed = bids.remove(&target);
        assert_eq!(removed.map(|o| o.id), Some(2));
        assert!(bids.contains(1));
        assert!(!bids.contains(2));

        // emptying a level drops it from the index
        let target = resting(1, Side::Buy, dec!(99), dec!(1));
        bids.remove(&target);
        assert_eq!(bids.best_price(), Some(dec!(98)));
    }

    #[test]
    fn test_iter_levels_best_to_worst() {
        let mut bids = BookSide::new(true);
        bids.add(resting(1, Side::Buy, dec!(98), dec!(1))).unwrap();
        bids.add(resting(2, Side::Buy, dec!(100), dec!(1))).unwrap();
        bids.add(resting(3, Side::Buy, dec!(99), dec!(1))).unwrap();

        let prices: Vec<Decimal> = bids.iter_price_levels().map(|l| l.price).collect();
        assert_eq!(prices, vec![dec!(100), dec!(99), dec!(98)]);
    }

    #[test]
    fn test_aggregate_summary() {
        let mut asks = BookSide::new(false);
        asks.add(resting(1, Side::Sell, dec!(100), dec!(1))).unwrap();
        asks.add(resting(2, Side::Sell, dec!(100), dec!(2))).unwrap();
        asks.add(resting(3, Side::Sell, dec!(102), dec!(1.5))).unwrap();

        let summary = asks.aggregate_summary();
        assert_eq!(
            summary,
            vec![
                BookLevel {
                    price: dec!(100),
                    amount: dec!(3)
                },
                BookLevel {
                    price: dec!(102),
                    amount: dec!(1.5)
                },
            ]
        );
    }

    #[test]
    fn test_partially_filled_remaining_in_summary() {
        let mut asks = BookSide::new(false);
        let mut order = resting(1, Side::Sell, dec!(100), dec!(5));
        order.filled = dec!(2);
        asks.add(order).unwrap();

        let summary = asks.aggregate_summary();
        assert_eq!(summary[0].amount, dec!(3));
    }
}
