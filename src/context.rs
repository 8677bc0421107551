//! Exchange Context
//!
//! Explicit wiring of every core component, constructed once by the
//! binary entrypoint and handed to the transport adapters.

use std::sync::Arc;

use anyhow::bail;
use parking_lot::Mutex;

use crate::config::AppConfig;
use crate::events::EventBus;
use crate::services::account::AccountService;
use crate::services::admin::{AdminService, ThresholdAdminPolicy};
use crate::services::market_data::MarketDataService;
use crate::services::matching::MatchingEngine;
use crate::services::wallet::{MockWalletGateway, WalletService};
use crate::store::{Database, InMemoryStore};

pub struct ExchangeContext {
    pub config: AppConfig,
    pub db: Arc<dyn Database>,
    pub bus: Arc<EventBus>,
    pub engine: Arc<Mutex<MatchingEngine>>,
    pub accounts: Arc<AccountService>,
    pub wallet: Arc<WalletService>,
    pub admin: Arc<AdminService>,
    pub market_data: Arc<MarketDataService>,
}

impl ExchangeContext {
    pub fn build(config: AppConfig) -> anyhow::Result<Self> {
        if config.store != "memory" {
            bail!(
                "unsupported store backend '{}': external stores are wired by the hosting service",
                config.store
            );
        }
        let db: Arc<dyn Database> = Arc::new(InMemoryStore::new());
        let bus = Arc::new(EventBus::new());

        let engine = Arc::new(Mutex::new(MatchingEngine::new(
            config.market.clone(),
            config.fee_rate,
            Arc::clone(&db),
            Arc::clone(&bus),
        )));
        tracing::info!(market = %config.market, fee_rate = %config.fee_rate, "matching engine initialized");

        let accounts = Arc::new(AccountService::new(
            Arc::clone(&db),
            Arc::clone(&bus),
            Arc::clone(&engine),
        ));
        tracing::info!("account service initialized");

        let wallet = Arc::new(WalletService::new(
            Arc::new(MockWalletGateway::new()),
            Arc::clone(&accounts),
        ));
        tracing::info!("wallet service initialized");

        let admin = Arc::new(AdminService::new(
            Arc::clone(&db),
            Arc::clone(&bus),
            Arc::clone(&accounts),
            Arc::clone(&wallet),
            Arc::new(ThresholdAdminPolicy::new(config.admin_id_threshold)),
        ));
        tracing::info!(
            admin_id_threshold = config.admin_id_threshold,
            "admin service initialized"
        );

        let market_data = MarketDataService::new(config.market_data_capacity, Arc::clone(&engine));
        market_data.attach(&bus);
        tracing::info!(
            capacity = config.market_data_capacity,
            "market data service attached"
        );

        Ok(Self {
            config,
            db,
            bus,
            engine,
            accounts,
            wallet,
            admin,
            market_data,
        })
    }
}
