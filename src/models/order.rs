use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The opposing side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
    /// Parked until the stop price triggers, then re-enters as a limit.
    Stop,
    /// One leg of a one-cancels-other pair.
    Oco,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Limit => write!(f, "limit"),
            OrderType::Market => write!(f, "market"),
            OrderType::Stop => write!(f, "stop"),
            OrderType::Oco => write!(f, "oco"),
        }
    }
}

/// Time in force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    /// Good Till Cancel
    #[default]
    Gtc,
    /// Immediate or Cancel
    Ioc,
    /// Fill or Kill
    Fok,
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Resting or parked with no fills
    Open,
    /// Some quantity filled; for IOC this is terminal (remainder canceled)
    Partial,
    /// Fully filled
    Filled,
    /// Canceled before completion
    Canceled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Open => write!(f, "open"),
            OrderStatus::Partial => write!(f, "partial"),
            OrderStatus::Filled => write!(f, "filled"),
            OrderStatus::Canceled => write!(f, "canceled"),
        }
    }
}

/// An order record. The store's copy is authoritative for `status` and
/// `filled`; the book's copy is authoritative for queue position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub user_id: u64,
    pub account_id: u64,
    pub market: String,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub price: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub filled: Decimal,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub stop_price: Option<Decimal>,
    pub link_order_id: Option<u64>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        user_id: u64,
        account_id: u64,
        market: impl Into<String>,
        side: Side,
        order_type: OrderType,
        time_in_force: TimeInForce,
        price: Option<Decimal>,
        amount: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            account_id,
            market: market.into(),
            side,
            order_type,
            time_in_force,
            price,
            amount,
            filled: Decimal::ZERO,
            stop_price: None,
            link_order_id: None,
            status: OrderStatus::Open,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn remaining(&self) -> Decimal {
        self.amount - self.filled
    }

    /// Whether the order can still rest or fill.
    pub fn is_active(&self) -> bool {
        matches!(self.status, OrderStatus::Open | OrderStatus::Partial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_order() -> Order {
        Order::new(
            1,
            10,
            20,
            "ALT/USDT",
            Side::Buy,
            OrderType::Limit,
            TimeInForce::Gtc,
            Some(dec!(100)),
            dec!(5),
        )
    }

    #[test]
    fn test_remaining() {
        let mut order = sample_order();
        assert_eq!(order.remaining(), dec!(5));
        order.filled = dec!(2);
        assert_eq!(order.remaining(), dec!(3));
    }

    #[test]
    fn test_active_statuses() {
        let mut order = sample_order();
        assert!(order.is_active());
        order.status = OrderStatus::Partial;
        assert!(order.is_active());
        order.status = OrderStatus::Filled;
        assert!(!order.is_active());
        order.status = OrderStatus::Canceled;
        assert!(!order.is_active());
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn test_money_serialized_as_strings() {
        let order = sample_order();
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["price"], "100");
        assert_eq!(json["amount"], "5");
        assert_eq!(json["filled"], "0");
    }
}
