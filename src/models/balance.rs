use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Assets of the single ALT/USDT market: ALT is the base, USDT the quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Asset {
    Alt,
    Usdt,
}

impl Asset {
    pub const ALL: [Asset; 2] = [Asset::Alt, Asset::Usdt];

    /// Base asset of the market.
    pub fn base() -> Self {
        Asset::Alt
    }

    /// Quote asset of the market.
    pub fn quote() -> Self {
        Asset::Usdt
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Alt => write!(f, "ALT"),
            Asset::Usdt => write!(f, "USDT"),
        }
    }
}

/// Per-(account, asset) funds split into a spendable and a reserved leg.
///
/// `available + locked` only moves through deposits, withdrawals, trade
/// settlement and lock/release; neither leg may go negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub id: u64,
    pub account_id: u64,
    pub asset: Asset,
    #[serde(with = "rust_decimal::serde::str")]
    pub available: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub locked: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Balance {
    /// New zeroed balance row.
    pub fn new(id: u64, account_id: u64, asset: Asset) -> Self {
        Self {
            id,
            account_id,
            asset,
            available: Decimal::ZERO,
            locked: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }

    pub fn total(&self) -> Decimal {
        self.available + self.locked
    }
}
