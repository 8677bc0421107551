//! Wallet Gateway
//!
//! Abstraction over external chain transmission. The core only needs
//! three things from a wallet backend: a stable deposit address per
//! (user, asset), a submit call returning an opaque transaction hash, and
//! an opaque status probe. `MockWalletGateway` is the in-process stand-in
//! used by tests and the development build.

use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sha3::{Digest, Sha3_256};
use uuid::Uuid;

use crate::errors::Result;
use crate::models::{Asset, Transaction};
use crate::services::account::AccountService;

pub trait WalletGateway: Send + Sync {
    /// Stable per (user, asset): the same call twice returns the same
    /// address.
    fn assign_deposit_address(&self, user_id: u64, asset: Asset) -> String;

    /// Transmit a withdrawal; returns an opaque transaction hash.
    fn submit_withdrawal(
        &self,
        user_id: u64,
        asset: Asset,
        amount: Decimal,
        address: &str,
    ) -> Result<String>;

    /// Opaque status record; the core does not interpret its fields.
    fn transaction_status(&self, tx_hash: &str) -> Value;
}

#[derive(Default)]
pub struct MockWalletGateway {
    addresses: DashMap<(u64, Asset), String>,
}

impl MockWalletGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WalletGateway for MockWalletGateway {
    fn assign_deposit_address(&self, user_id: u64, asset: Asset) -> String {
        self.addresses
            .entry((user_id, asset))
            .or_insert_with(|| {
                let digest = Sha3_256::digest(format!("deposit:{user_id}:{asset}").as_bytes());
                format!("0x{}", hex::encode(&digest[..20]))
            })
            .clone()
    }

    fn submit_withdrawal(
        &self,
        user_id: u64,
        asset: Asset,
        amount: Decimal,
        address: &str,
    ) -> Result<String> {
        let digest = Sha3_256::digest(Uuid::new_v4().as_bytes());
        let tx_hash = format!("0x{}", hex::encode(digest));
        tracing::info!(
            user_id,
            %asset,
            amount = %amount,
            address,
            tx_hash = %tx_hash,
            "withdrawal transmitted"
        );
        Ok(tx_hash)
    }

    fn transaction_status(&self, tx_hash: &str) -> Value {
        json!({
            "tx_hash": tx_hash,
            "status": "confirmed",
            "confirmations": 12,
        })
    }
}

/// Thin facade the transport adapters and the admin pipeline talk to.
pub struct WalletService {
    gateway: Arc<dyn WalletGateway>,
    accounts: Arc<AccountService>,
}

impl WalletService {
    pub fn new(gateway: Arc<dyn WalletGateway>, accounts: Arc<AccountService>) -> Self {
        Self { gateway, accounts }
    }

    pub fn deposit_address(&self, user_id: u64, asset: Asset) -> String {
        self.gateway.assign_deposit_address(user_id, asset)
    }

    pub fn request_withdrawal(
        &self,
        user_id: u64,
        asset: Asset,
        amount: Decimal,
        address: &str,
    ) -> Result<Transaction> {
        self.accounts
            .request_withdrawal(user_id, asset, amount, address)
    }

    /// Used by the admin approval pipeline once a withdrawal clears the
    /// two-eye check.
    pub fn send_withdrawal(
        &self,
        user_id: u64,
        asset: Asset,
        amount: Decimal,
        address: &str,
    ) -> Result<String> {
        self.gateway
            .submit_withdrawal(user_id, asset, amount, address)
    }

    pub fn transaction_status(&self, tx_hash: &str) -> Value {
        self.gateway.transaction_status(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_deposit_address_is_idempotent_per_pair() {
        let gateway = MockWalletGateway::new();
        let first = gateway.assign_deposit_address(1, Asset::Usdt);
        let second = gateway.assign_deposit_address(1, Asset::Usdt);
        assert_eq!(first, second);
        assert!(first.starts_with("0x"));

        let other_asset = gateway.assign_deposit_address(1, Asset::Alt);
        let other_user = gateway.assign_deposit_address(2, Asset::Usdt);
        assert_ne!(first, other_asset);
        assert_ne!(first, other_user);
    }

    #[test]
    fn test_submit_returns_opaque_hash() {
        let gateway = MockWalletGateway::new();
        let hash = gateway
            .submit_withdrawal(1, Asset::Usdt, dec!(10), "0xdest")
            .unwrap();
        assert!(hash.starts_with("0x"));
        assert_eq!(hash.len(), 2 + 64);
    }

    #[test]
    fn test_status_probe_shape() {
        let gateway = MockWalletGateway::new();
        let status = gateway.transaction_status("0xabc");
        assert_eq!(status["tx_hash"], "0xabc");
        assert_eq!(status["status"], "confirmed");
    }
}
