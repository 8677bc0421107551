//! Application Configuration
//!
//! Defaults overridable through `ALTX_`-prefixed environment variables,
//! e.g. `ALTX_FEE_RATE=0.002` or `ALTX_STORE=memory`.

use config::{Config, ConfigError, Environment};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// "development" enables the demo session in the binary.
    pub environment: String,
    /// The single market this deployment serves.
    pub market: String,
    /// Flat taker fee coefficient.
    #[serde(with = "rust_decimal::serde::str")]
    pub fee_rate: Decimal,
    /// Ids below this threshold pass the reference admin predicate.
    pub admin_id_threshold: u64,
    /// "memory" selects the in-process store; anything else is a
    /// connection string for a store wired by the hosting service.
    pub store: String,
    /// Ring buffer capacity for the market data caches.
    pub market_data_capacity: usize,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("environment", "development")?
            .set_default("market", "ALT/USDT")?
            .set_default("fee_rate", "0.001")?
            .set_default("admin_id_threshold", 100)?
            .set_default("store", "memory")?
            .set_default("market_data_capacity", 100)?
            .add_source(Environment::with_prefix("ALTX"))
            .build()?
            .try_deserialize()
    }
}
