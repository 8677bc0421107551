use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Asset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdraw,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Deposit => write!(f, "deposit"),
            TransactionType::Withdraw => write!(f, "withdraw"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Failed,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "pending"),
            TransactionStatus::Confirmed => write!(f, "confirmed"),
            TransactionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// On/off-ramp movement of funds. Deposits are credited CONFIRMED;
/// withdrawals start PENDING and end CONFIRMED or FAILED through the
/// admin approval pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub user_id: u64,
    pub asset: Asset,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub address: Option<String>,
    pub tx_hash: Option<String>,
    pub confirmations: u32,
    pub approver_id: Option<u64>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub chain: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn deposit(
        id: u64,
        user_id: u64,
        asset: Asset,
        amount: Decimal,
        tx_hash: Option<String>,
    ) -> Self {
        Self {
            id,
            user_id,
            asset,
            tx_type: TransactionType::Deposit,
            status: TransactionStatus::Confirmed,
            amount,
            address: None,
            tx_hash,
            confirmations: 12,
            approver_id: None,
            approved_at: None,
            rejected_at: None,
            chain: "BSC".to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn withdrawal(
        id: u64,
        user_id: u64,
        asset: Asset,
        amount: Decimal,
        address: String,
    ) -> Self {
        Self {
            id,
            user_id,
            asset,
            tx_type: TransactionType::Withdraw,
            status: TransactionStatus::Pending,
            amount,
            address: Some(address),
            tx_hash: None,
            confirmations: 0,
            approver_id: None,
            approved_at: None,
            rejected_at: None,
            chain: "BSC".to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Append-only audit trail entry for administrative actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: u64,
    pub actor: String,
    pub action: String,
    pub entity: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_deposit_defaults() {
        let tx = Transaction::deposit(1, 2, Asset::Usdt, dec!(50), Some("0xabc".into()));
        assert_eq!(tx.status, TransactionStatus::Confirmed);
        assert_eq!(tx.confirmations, 12);
        assert_eq!(tx.chain, "BSC");
        assert!(tx.address.is_none());
    }

    #[test]
    fn test_withdrawal_defaults() {
        let tx = Transaction::withdrawal(1, 2, Asset::Alt, dec!(5), "0xdef".into());
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.confirmations, 0);
        assert!(tx.tx_hash.is_none());
        assert_eq!(tx.address.as_deref(), Some("0xdef"));
    }
}
