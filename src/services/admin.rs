//! Admin Service
//!
//! Administrative operations: the two-eye withdrawal approval state
//! machine, account freeze/unfreeze, and the audit/monitoring reads. Two
//! distinct administrators must approve a pending withdrawal before funds
//! move; the wallet transmission runs after the approval record is
//! committed and before the transaction turns CONFIRMED, so a wallet
//! failure leaves a retryable PENDING transaction instead of a lost lock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;

use crate::errors::{ExchangeError, Result};
use crate::events::{
    AccountFrozen, AccountUnfrozen, EventBus, ExchangeEvent, WithdrawalApproved,
    WithdrawalRejected,
};
use crate::models::{
    Account, AccountStatus, AuditLog, Balance, Transaction, TransactionStatus, TransactionType,
    User,
};
use crate::services::account::AccountService;
use crate::services::matching::BookLevel;
use crate::services::wallet::WalletService;
use crate::store::{tables, Database};

/// Deployment-supplied admin predicate.
pub trait AdminPolicy: Send + Sync {
    fn is_admin(&self, user_id: u64) -> bool;
}

/// Reference predicate: ids below a configured threshold are admins.
pub struct ThresholdAdminPolicy {
    threshold: u64,
}

impl ThresholdAdminPolicy {
    pub fn new(threshold: u64) -> Self {
        Self { threshold }
    }
}

impl AdminPolicy for ThresholdAdminPolicy {
    fn is_admin(&self, user_id: u64) -> bool {
        user_id < self.threshold
    }
}

/// Optional filters for audit log reads.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Substring match on the actor field.
    pub actor: Option<String>,
    /// Exact match on the action field.
    pub action: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountInfo {
    pub account: Account,
    pub user: User,
    pub balances: Vec<Balance>,
    pub recent_transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketOverview {
    pub market: String,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub recent_trades: Vec<crate::models::Trade>,
    pub stop_orders_count: usize,
    pub oco_pairs_count: usize,
}

pub struct AdminService {
    db: Arc<dyn Database>,
    bus: Arc<EventBus>,
    accounts: Arc<AccountService>,
    wallet: Arc<WalletService>,
    policy: Arc<dyn AdminPolicy>,
    /// tx_id -> ids of admins who have approved it so far.
    approvals: Mutex<HashMap<u64, Vec<u64>>>,
}

impl AdminService {
    pub fn new(
        db: Arc<dyn Database>,
        bus: Arc<EventBus>,
        accounts: Arc<AccountService>,
        wallet: Arc<WalletService>,
        policy: Arc<dyn AdminPolicy>,
    ) -> Self {
        Self {
            db,
            bus,
            accounts,
            wallet,
            policy,
            approvals: Mutex::new(HashMap::new()),
        }
    }

    // ------------------------------------------------------------------
    // Withdrawal approval state machine

    pub fn list_pending_withdrawals(&self, admin_id: u64) -> Result<Vec<Transaction>> {
        self.require_admin(admin_id)?;
        let mut pending: Vec<Transaction> = self
            .db
            .all_transactions()
            .into_iter()
            .filter(|tx| {
                tx.tx_type == TransactionType::Withdraw && tx.status == TransactionStatus::Pending
            })
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(pending)
    }

    pub fn approve_withdrawal(&self, admin_id: u64, tx_id: u64) -> Result<Transaction> {
        self.require_admin(admin_id)?;
        let mut tx = self.pending_withdrawal(tx_id)?;

        let approval_count = {
            let mut approvals = self.approvals.lock();
            let entry = approvals.entry(tx_id).or_default();
            if entry.contains(&admin_id) {
                return Err(ExchangeError::withdrawal_approval(
                    "Admin has already approved this withdrawal",
                )
                .with_detail("transaction_id", tx_id)
                .with_detail("admin_id", admin_id));
            }
            entry.push(admin_id);
            entry.len()
        };

        let now = Utc::now();

        // Record the approval before anything leaves the building.
        {
            let mut scope = self.db.begin();
            tx.approver_id = Some(admin_id);
            tx.approved_at = Some(now);
            self.db.update_transaction(&tx);
            scope.commit();
        }

        if approval_count < 2 {
            self.log_admin_action(
                admin_id,
                "withdrawal_first_approval",
                "transaction",
                tx_id,
                json!({ "amount": tx.amount.to_string(), "asset": tx.asset.to_string() }),
            );
            return Ok(tx);
        }

        // Second distinct approval: transmit first, confirm after. On a
        // wallet failure the transaction stays PENDING with its recorded
        // approvals; a further distinct approver retries the submit.
        let address = tx.address.clone().unwrap_or_default();
        let tx_hash = self
            .wallet
            .send_withdrawal(tx.user_id, tx.asset, tx.amount, &address)
            .map_err(|err| {
                tracing::error!(transaction_id = tx_id, error = %err, "wallet submit failed");
                ExchangeError::withdrawal_approval("Wallet submission failed")
                    .with_detail("transaction_id", tx_id)
                    .with_detail("cause", err)
            })?;

        let tx = self.accounts.complete_withdrawal(tx_id, &tx_hash, 12)?;
        self.approvals.lock().remove(&tx_id);

        self.bus
            .publish(ExchangeEvent::WithdrawalApproved(WithdrawalApproved {
                transaction_id: tx_id,
                approver_id: admin_id,
                approved_at: now,
            }));
        self.log_admin_action(
            admin_id,
            "withdrawal_approved",
            "transaction",
            tx_id,
            json!({
                "amount": tx.amount.to_string(),
                "asset": tx.asset.to_string(),
                "tx_hash": tx_hash,
            }),
        );
        Ok(tx)
    }

    pub fn reject_withdrawal(
        &self,
        admin_id: u64,
        tx_id: u64,
        reason: &str,
    ) -> Result<Transaction> {
        self.require_admin(admin_id)?;
        let mut tx = self.pending_withdrawal(tx_id)?;

        let now = Utc::now();
        {
            let mut scope = self.db.begin();
            tx.status = TransactionStatus::Failed;
            tx.approver_id = Some(admin_id);
            tx.rejected_at = Some(now);
            self.db.update_transaction(&tx);
            scope.commit();
        }

        self.accounts
            .release_withdrawal_lock(tx.user_id, tx.asset, tx.amount)?;
        self.approvals.lock().remove(&tx_id);

        self.bus
            .publish(ExchangeEvent::WithdrawalRejected(WithdrawalRejected {
                transaction_id: tx_id,
                approver_id: admin_id,
                rejected_at: now,
                reason: reason.to_string(),
            }));
        self.log_admin_action(
            admin_id,
            "withdrawal_rejected",
            "transaction",
            tx_id,
            json!({
                "amount": tx.amount.to_string(),
                "asset": tx.asset.to_string(),
                "reason": reason,
            }),
        );
        Ok(tx)
    }

    // ------------------------------------------------------------------
    // Account freeze / unfreeze

    pub fn freeze_account(&self, admin_id: u64, account_id: u64, reason: &str) -> Result<Account> {
        self.require_admin(admin_id)?;
        let mut account = self.existing_account(account_id)?;
        if account.frozen {
            return Err(ExchangeError::admin_permission("Account is already frozen")
                .with_detail("account_id", account_id));
        }

        let mut scope = self.db.begin();
        account.frozen = true;
        account.status = AccountStatus::Frozen;
        self.db.update_account(&account);
        scope.commit();

        self.bus.publish(ExchangeEvent::AccountFrozen(AccountFrozen {
            account_id,
            user_id: account.user_id,
            frozen_by: admin_id,
            reason: reason.to_string(),
        }));
        self.log_admin_action(
            admin_id,
            "account_frozen",
            "account",
            account_id,
            json!({ "user_id": account.user_id, "reason": reason }),
        );
        Ok(account)
    }

    pub fn unfreeze_account(&self, admin_id: u64, account_id: u64) -> Result<Account> {
        self.require_admin(admin_id)?;
        let mut account = self.existing_account(account_id)?;
        if !account.frozen {
            return Err(ExchangeError::admin_permission("Account is not frozen")
                .with_detail("account_id", account_id));
        }

        let mut scope = self.db.begin();
        account.frozen = false;
        account.status = AccountStatus::Active;
        self.db.update_account(&account);
        scope.commit();

        self.bus
            .publish(ExchangeEvent::AccountUnfrozen(AccountUnfrozen {
                account_id,
                user_id: account.user_id,
                unfrozen_by: admin_id,
            }));
        self.log_admin_action(
            admin_id,
            "account_unfrozen",
            "account",
            account_id,
            json!({ "user_id": account.user_id }),
        );
        Ok(account)
    }

    // ------------------------------------------------------------------
    // Reads

    pub fn get_audit_logs(
        &self,
        admin_id: u64,
        filter: &AuditLogFilter,
        limit: usize,
    ) -> Result<Vec<AuditLog>> {
        self.require_admin(admin_id)?;
        let mut logs: Vec<AuditLog> = self
            .db
            .all_audit_logs()
            .into_iter()
            .filter(|log| {
                filter.start_date.map_or(true, |start| log.created_at >= start)
                    && filter.end_date.map_or(true, |end| log.created_at <= end)
                    && filter
                        .actor
                        .as_ref()
                        .map_or(true, |actor| log.actor.contains(actor))
                    && filter
                        .action
                        .as_ref()
                        .map_or(true, |action| &log.action == action)
            })
            .collect();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        logs.truncate(limit);
        Ok(logs)
    }

    pub fn get_account_info(&self, admin_id: u64, account_id: u64) -> Result<AccountInfo> {
        self.require_admin(admin_id)?;
        let account = self.existing_account(account_id)?;
        let user = self.db.user(account.user_id).ok_or_else(|| {
            ExchangeError::entity_not_found(format!("User {} not found", account.user_id))
                .with_detail("user_id", account.user_id)
        })?;

        let balances = self.db.balances_by_account(account_id);
        let mut recent_transactions = self.db.transactions_by_user(account.user_id);
        recent_transactions
            .sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        recent_transactions.truncate(10);

        Ok(AccountInfo {
            account,
            user,
            balances,
            recent_transactions,
        })
    }

    pub fn get_market_overview(&self, admin_id: u64) -> Result<MarketOverview> {
        self.require_admin(admin_id)?;
        let (mut bids, mut asks) = self.accounts.order_book_snapshot();
        bids.truncate(10);
        asks.truncate(10);
        let (stop_orders_count, oco_pairs_count) = self.accounts.matching_stats();

        Ok(MarketOverview {
            market: self.accounts.market().to_string(),
            bids,
            asks,
            recent_trades: self.db.recent_trades(20),
            stop_orders_count,
            oco_pairs_count,
        })
    }

    // ------------------------------------------------------------------
    // Internals

    fn require_admin(&self, admin_id: u64) -> Result<()> {
        if self.policy.is_admin(admin_id) {
            Ok(())
        } else {
            Err(ExchangeError::admin_permission("Insufficient permissions")
                .with_detail("admin_id", admin_id))
        }
    }

    fn pending_withdrawal(&self, tx_id: u64) -> Result<Transaction> {
        let tx = self.db.transaction(tx_id).ok_or_else(|| {
            ExchangeError::entity_not_found(format!("Transaction {tx_id} not found"))
                .with_detail("transaction_id", tx_id)
        })?;
        if tx.tx_type != TransactionType::Withdraw {
            return Err(
                ExchangeError::withdrawal_approval("Transaction is not a withdrawal")
                    .with_detail("transaction_id", tx_id),
            );
        }
        if tx.status != TransactionStatus::Pending {
            return Err(ExchangeError::withdrawal_approval("Transaction is not pending")
                .with_detail("transaction_id", tx_id)
                .with_detail("status", tx.status));
        }
        Ok(tx)
    }

    fn existing_account(&self, account_id: u64) -> Result<Account> {
        self.db.account(account_id).ok_or_else(|| {
            ExchangeError::entity_not_found(format!("Account {account_id} not found"))
                .with_detail("account_id", account_id)
        })
    }

    fn log_admin_action(
        &self,
        admin_id: u64,
        action: &str,
        entity: &str,
        entity_id: u64,
        mut metadata: serde_json::Value,
    ) {
        if let Some(map) = metadata.as_object_mut() {
            map.insert("entity_id".to_string(), json!(entity_id));
        }
        self.db.insert_audit_log(AuditLog {
            id: self.db.next_id(tables::AUDIT_LOGS),
            actor: format!("admin_{admin_id}"),
            action: action.to_string(),
            entity: entity.to_string(),
            metadata,
            created_at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::models::{Asset, Side, TimeInForce};
    use crate::services::matching::MatchingEngine;
    use crate::services::wallet::MockWalletGateway;
    use crate::store::InMemoryStore;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        db: Arc<dyn Database>,
        bus: Arc<EventBus>,
        accounts: Arc<AccountService>,
        admin: AdminService,
    }

    fn fixture() -> Fixture {
        let db: Arc<dyn Database> = Arc::new(InMemoryStore::new());
        let bus = Arc::new(EventBus::new());
        let engine = Arc::new(Mutex::new(MatchingEngine::new(
            "ALT/USDT",
            dec!(0.001),
            Arc::clone(&db),
            Arc::clone(&bus),
        )));
        let accounts = Arc::new(AccountService::new(
            Arc::clone(&db),
            Arc::clone(&bus),
            engine,
        ));
        let wallet = Arc::new(WalletService::new(
            Arc::new(MockWalletGateway::new()),
            Arc::clone(&accounts),
        ));
        let admin = AdminService::new(
            Arc::clone(&db),
            Arc::clone(&bus),
            Arc::clone(&accounts),
            wallet,
            Arc::new(ThresholdAdminPolicy::new(100)),
        );
        Fixture {
            db,
            bus,
            accounts,
            admin,
        }
    }

    /// User with 500 USDT and a pending 200 USDT withdrawal.
    fn pending_withdrawal(f: &Fixture) -> (u64, Transaction) {
        let user = f.accounts.create_user("u@example.com", "secret").unwrap();
        f.accounts
            .credit_deposit(user.id, Asset::Usdt, dec!(500), None)
            .unwrap();
        let tx = f
            .accounts
            .request_withdrawal(user.id, Asset::Usdt, dec!(200), "0xdest")
            .unwrap();
        (user.id, tx)
    }

    #[test]
    fn test_non_admin_is_rejected() {
        let f = fixture();
        let err = f.admin.list_pending_withdrawals(500).unwrap_err();
        assert!(matches!(err, ExchangeError::AdminPermission(_)));
    }

    #[test]
    fn test_two_eye_withdrawal_approval() {
        let f = fixture();
        let (user_id, tx) = pending_withdrawal(&f);

        let approved = Arc::new(AtomicUsize::new(0));
        {
            let approved = Arc::clone(&approved);
            f.bus.subscribe(EventKind::WithdrawalApproved, move |_| {
                approved.fetch_add(1, Ordering::SeqCst);
            });
        }

        // first approval keeps the transaction pending
        let after_first = f.admin.approve_withdrawal(1, tx.id).unwrap();
        assert_eq!(after_first.status, TransactionStatus::Pending);
        assert_eq!(after_first.approver_id, Some(1));
        assert_eq!(approved.load(Ordering::SeqCst), 0);

        // the same admin cannot approve twice
        let err = f.admin.approve_withdrawal(1, tx.id).unwrap_err();
        assert!(matches!(err, ExchangeError::WithdrawalApproval(_)));

        // a second distinct admin completes it
        let after_second = f.admin.approve_withdrawal(2, tx.id).unwrap();
        assert_eq!(after_second.status, TransactionStatus::Confirmed);
        assert!(after_second.tx_hash.is_some());
        assert_eq!(approved.load(Ordering::SeqCst), 1);
        assert_eq!(
            f.db.transaction(tx.id).unwrap().status,
            TransactionStatus::Confirmed
        );

        let balance = f.accounts.get_balance(user_id, Asset::Usdt).unwrap();
        assert_eq!(balance.available, dec!(300));
        assert_eq!(balance.locked, dec!(0));

        // approval bookkeeping is gone; a third approve fails on status
        let err = f.admin.approve_withdrawal(3, tx.id).unwrap_err();
        assert!(matches!(err, ExchangeError::WithdrawalApproval(_)));
    }

    #[test]
    fn test_wallet_failure_keeps_transaction_pending() {
        struct FailingGateway;
        impl crate::services::wallet::WalletGateway for FailingGateway {
            fn assign_deposit_address(&self, _: u64, _: Asset) -> String {
                "0x0".to_string()
            }
            fn submit_withdrawal(
                &self,
                _: u64,
                _: Asset,
                _: Decimal,
                _: &str,
            ) -> crate::errors::Result<String> {
                Err(ExchangeError::withdrawal_approval("chain unreachable"))
            }
            fn transaction_status(&self, _: &str) -> serde_json::Value {
                json!({})
            }
        }

        let db: Arc<dyn Database> = Arc::new(InMemoryStore::new());
        let bus = Arc::new(EventBus::new());
        let engine = Arc::new(Mutex::new(MatchingEngine::new(
            "ALT/USDT",
            dec!(0.001),
            Arc::clone(&db),
            Arc::clone(&bus),
        )));
        let accounts = Arc::new(AccountService::new(
            Arc::clone(&db),
            Arc::clone(&bus),
            engine,
        ));
        let wallet = Arc::new(WalletService::new(
            Arc::new(FailingGateway),
            Arc::clone(&accounts),
        ));
        let admin = AdminService::new(
            Arc::clone(&db),
            Arc::clone(&bus),
            Arc::clone(&accounts),
            wallet,
            Arc::new(ThresholdAdminPolicy::new(100)),
        );

        let user = accounts.create_user("u@example.com", "secret").unwrap();
        accounts
            .credit_deposit(user.id, Asset::Usdt, dec!(500), None)
            .unwrap();
        let tx = accounts
            .request_withdrawal(user.id, Asset::Usdt, dec!(200), "0xdest")
            .unwrap();

        admin.approve_withdrawal(1, tx.id).unwrap();
        let err = admin.approve_withdrawal(2, tx.id).unwrap_err();
        assert!(matches!(err, ExchangeError::WithdrawalApproval(_)));

        // still pending, lock untouched, retryable by a further approver
        let stored = db.transaction(tx.id).unwrap();
        assert_eq!(stored.status, TransactionStatus::Pending);
        let balance = accounts.get_balance(user.id, Asset::Usdt).unwrap();
        assert_eq!(balance.locked, dec!(200));
    }

    #[test]
    fn test_reject_reverses_lock() {
        let f = fixture();
        let (user_id, tx) = pending_withdrawal(&f);

        let rejected = f
            .admin
            .reject_withdrawal(1, tx.id, "suspicious destination")
            .unwrap();
        assert_eq!(rejected.status, TransactionStatus::Failed);
        assert!(rejected.rejected_at.is_some());

        let balance = f.accounts.get_balance(user_id, Asset::Usdt).unwrap();
        assert_eq!(balance.available, dec!(500));
        assert_eq!(balance.locked, dec!(0));

        // a rejected transaction cannot be approved
        let err = f.admin.approve_withdrawal(1, tx.id).unwrap_err();
        assert!(matches!(err, ExchangeError::WithdrawalApproval(_)));
    }

    #[test]
    fn test_list_pending_withdrawals_sorted_ascending() {
        let f = fixture();
        let user = f.accounts.create_user("u@example.com", "secret").unwrap();
        f.accounts
            .credit_deposit(user.id, Asset::Usdt, dec!(500), None)
            .unwrap();
        let first = f
            .accounts
            .request_withdrawal(user.id, Asset::Usdt, dec!(10), "0xa")
            .unwrap();
        let second = f
            .accounts
            .request_withdrawal(user.id, Asset::Usdt, dec!(20), "0xb")
            .unwrap();

        let pending = f.admin.list_pending_withdrawals(1).unwrap();
        assert_eq!(
            pending.iter().map(|tx| tx.id).collect::<Vec<_>>(),
            vec![first.id, second.id]
        );
    }

    #[test]
    fn test_freeze_and_unfreeze_account() {
        let f = fixture();
        let user = f.accounts.create_user("u@example.com", "secret").unwrap();
        f.accounts
            .credit_deposit(user.id, Asset::Usdt, dec!(1000), None)
            .unwrap();
        let account = f.accounts.get_account(user.id).unwrap();

        let frozen = f
            .admin
            .freeze_account(1, account.id, "compliance review")
            .unwrap();
        assert!(frozen.frozen);
        assert_eq!(frozen.status, AccountStatus::Frozen);

        // frozen accounts cannot place orders
        let err = f
            .accounts
            .place_limit_order(user.id, Side::Buy, dec!(100), dec!(1), TimeInForce::Gtc)
            .unwrap_err();
        assert_eq!(err.to_string(), "Account is frozen");

        // double freeze is refused
        let err = f.admin.freeze_account(1, account.id, "again").unwrap_err();
        assert!(matches!(err, ExchangeError::AdminPermission(_)));

        let unfrozen = f.admin.unfreeze_account(2, account.id).unwrap();
        assert!(!unfrozen.frozen);
        f.accounts
            .place_limit_order(user.id, Side::Buy, dec!(100), dec!(1), TimeInForce::Gtc)
            .unwrap();
    }

    #[test]
    fn test_audit_logs_filtering_and_order() {
        let f = fixture();
        let (_, tx) = pending_withdrawal(&f);
        f.admin.approve_withdrawal(1, tx.id).unwrap();
        f.admin.approve_withdrawal(2, tx.id).unwrap();

        let all = f
            .admin
            .get_audit_logs(1, &AuditLogFilter::default(), 100)
            .unwrap();
        assert_eq!(all.len(), 2);
        // newest first
        assert_eq!(all[0].action, "withdrawal_approved");
        assert_eq!(all[1].action, "withdrawal_first_approval");

        let filtered = f
            .admin
            .get_audit_logs(
                1,
                &AuditLogFilter {
                    action: Some("withdrawal_approved".to_string()),
                    ..Default::default()
                },
                100,
            )
            .unwrap();
        assert_eq!(filtered.len(), 1);

        let by_actor = f
            .admin
            .get_audit_logs(
                1,
                &AuditLogFilter {
                    actor: Some("admin_2".to_string()),
                    ..Default::default()
                },
                100,
            )
            .unwrap();
        assert_eq!(by_actor.len(), 1);
        assert_eq!(by_actor[0].actor, "admin_2");

        let limited = f
            .admin
            .get_audit_logs(1, &AuditLogFilter::default(), 1)
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_account_info_includes_balances_and_recent_transactions() {
        let f = fixture();
        let user = f.accounts.create_user("u@example.com", "secret").unwrap();
        for index in 0..12 {
            f.accounts
                .credit_deposit(user.id, Asset::Usdt, Decimal::from(index + 1), None)
                .unwrap();
        }
        let account = f.accounts.get_account(user.id).unwrap();

        let info = f.admin.get_account_info(1, account.id).unwrap();
        assert_eq!(info.user.id, user.id);
        assert_eq!(info.balances.len(), Asset::ALL.len());
        assert_eq!(info.recent_transactions.len(), 10);
        // newest first
        assert!(info.recent_transactions[0].id > info.recent_transactions[9].id);
    }

    #[test]
    fn test_market_overview_counts_and_depth() {
        let f = fixture();
        let buyer = f.accounts.create_user("buyer@example.com", "secret").unwrap();
        let seller = f
            .accounts
            .create_user("seller@example.com", "secret")
            .unwrap();
        f.accounts
            .credit_deposit(buyer.id, Asset::Usdt, dec!(100000), None)
            .unwrap();
        f.accounts
            .credit_deposit(seller.id, Asset::Alt, dec!(1000), None)
            .unwrap();

        for step in 0..12u32 {
            let price = dec!(90) - Decimal::from(step);
            f.accounts
                .place_limit_order(buyer.id, Side::Buy, price, dec!(1), TimeInForce::Gtc)
                .unwrap();
        }
        f.accounts
            .place_limit_order(seller.id, Side::Sell, dec!(120), dec!(5), TimeInForce::Gtc)
            .unwrap();
        f.accounts
            .place_stop_order(seller.id, Side::Sell, dec!(80), dec!(1), dec!(82))
            .unwrap();

        let overview = f.admin.get_market_overview(1).unwrap();
        assert_eq!(overview.market, "ALT/USDT");
        assert_eq!(overview.bids.len(), 10); // capped
        assert_eq!(overview.bids[0].price, dec!(90)); // best first
        assert_eq!(overview.asks.len(), 1);
        assert_eq!(overview.stop_orders_count, 1);
        assert_eq!(overview.oco_pairs_count, 0);
    }
}
