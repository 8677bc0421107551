//! Account & Settlement Service
//!
//! Owns the balance lifecycle: reserves funds when orders enter, feeds the
//! matching engine, settles the trades it prints, and runs the post-order
//! rebalancing pass that returns surplus locks to the spendable leg. Also
//! handles user/account creation, deposits and the two-stage withdrawal
//! flow.
//!
//! Lock rule: a BUY reserves `price x amount x (1 + fee_rate)` in the
//! quote asset (fee headroom, since fills happen at the maker's price); a
//! SELL reserves `amount` in the base asset.
//!
//! The engine mutex doubles as the per-market balance lock: every
//! balance-mutating entry point below holds it for the operation's full
//! duration, so matching and settlement never interleave with concurrent
//! balance updates for the market.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use sha3::{Digest, Sha3_256};

use crate::errors::{ExchangeError, Result};
use crate::events::{BalanceChanged, EventBus, ExchangeEvent};
use crate::models::{
    Account, Asset, Balance, Order, OrderStatus, OrderType, Side, TimeInForce, Trade, Transaction,
    TransactionType, User,
};
use crate::services::matching::{BookLevel, MatchingEngine};
use crate::store::{tables, Database};

pub struct AccountService {
    db: Arc<dyn Database>,
    bus: Arc<EventBus>,
    engine: Arc<Mutex<MatchingEngine>>,
    market: String,
    fee_rate: Decimal,
}

impl AccountService {
    pub fn new(
        db: Arc<dyn Database>,
        bus: Arc<EventBus>,
        engine: Arc<Mutex<MatchingEngine>>,
    ) -> Self {
        let (market, fee_rate) = {
            let engine = engine.lock();
            (engine.market().to_string(), engine.fee_rate())
        };
        Self {
            db,
            bus,
            engine,
            market,
            fee_rate,
        }
    }

    pub fn market(&self) -> &str {
        &self.market
    }

    // ------------------------------------------------------------------
    // User & account lifecycle

    /// Register a user with a primary account and zeroed balances for
    /// every asset.
    pub fn create_user(&self, email: &str, password: &str) -> Result<User> {
        let _market = self.engine.lock();
        if self.db.user_by_email(email).is_some() {
            return Err(ExchangeError::invalid_order("Email is already registered")
                .with_detail("email", email));
        }

        let password_hash = hex::encode(Sha3_256::digest(password.as_bytes()));
        let mut scope = self.db.begin();

        let user = self
            .db
            .insert_user(User::new(self.db.next_id(tables::USERS), email, password_hash));
        let account = self
            .db
            .insert_account(Account::new(self.db.next_id(tables::ACCOUNTS), user.id));
        for asset in Asset::ALL {
            self.db.upsert_balance(Balance::new(
                self.db.next_id(tables::BALANCES),
                account.id,
                asset,
            ));
        }

        scope.commit();
        tracing::info!(user_id = user.id, account_id = account.id, "user created");
        Ok(user)
    }

    pub fn get_account(&self, user_id: u64) -> Result<Account> {
        self.db.account_by_user(user_id).ok_or_else(|| {
            ExchangeError::entity_not_found(format!("Account for user {user_id} not found"))
                .with_detail("user_id", user_id)
        })
    }

    pub fn get_balance(&self, user_id: u64, asset: Asset) -> Result<Balance> {
        let account = self.get_account(user_id)?;
        self.db.find_balance(account.id, asset).ok_or_else(|| {
            ExchangeError::entity_not_found(format!(
                "Balance for account {} {asset} not found",
                account.id
            ))
            .with_detail("account_id", account.id)
            .with_detail("asset", asset)
        })
    }

    // ------------------------------------------------------------------
    // Deposits & withdrawals

    pub fn credit_deposit(
        &self,
        user_id: u64,
        asset: Asset,
        amount: Decimal,
        tx_hash: Option<String>,
    ) -> Result<Transaction> {
        if amount <= Decimal::ZERO {
            return Err(ExchangeError::invalid_order("Amount must be positive"));
        }
        let _market = self.engine.lock();
        let account = self.get_account(user_id)?;

        let (tx, balance) = {
            let mut scope = self.db.begin();
            let mut balance = self.ensure_balance(account.id, asset);
            balance.available += amount;
            balance.updated_at = Utc::now();
            let balance = self.db.upsert_balance(balance);

            let tx = self.db.insert_transaction(Transaction::deposit(
                self.db.next_id(tables::TRANSACTIONS),
                user_id,
                asset,
                amount,
                tx_hash,
            ));
            scope.commit();
            (tx, balance)
        };

        self.publish_balance(&balance, "deposit");
        tracing::info!(user_id, %asset, amount = %amount, "deposit credited");
        Ok(tx)
    }

    pub fn request_withdrawal(
        &self,
        user_id: u64,
        asset: Asset,
        amount: Decimal,
        address: &str,
    ) -> Result<Transaction> {
        if amount <= Decimal::ZERO {
            return Err(ExchangeError::invalid_order("Amount must be positive"));
        }
        let _market = self.engine.lock();
        let account = self.get_account(user_id)?;

        let (tx, balance) = {
            let mut scope = self.db.begin();
            let mut balance = self.ensure_balance(account.id, asset);
            if balance.available < amount {
                return Err(
                    ExchangeError::insufficient_balance("Insufficient funds for withdrawal")
                        .with_detail("asset", asset)
                        .with_detail("required", amount)
                        .with_detail("available", balance.available),
                );
            }
            balance.available -= amount;
            balance.locked += amount;
            balance.updated_at = Utc::now();
            let balance = self.db.upsert_balance(balance);

            let tx = self.db.insert_transaction(Transaction::withdrawal(
                self.db.next_id(tables::TRANSACTIONS),
                user_id,
                asset,
                amount,
                address.to_string(),
            ));
            scope.commit();
            (tx, balance)
        };

        self.publish_balance(&balance, "withdrawal_lock");
        tracing::info!(user_id, %asset, amount = %amount, "withdrawal requested");
        Ok(tx)
    }

    /// Release the withdrawal lock and mark the transaction transmitted.
    pub fn complete_withdrawal(
        &self,
        tx_id: u64,
        tx_hash: &str,
        confirmations: u32,
    ) -> Result<Transaction> {
        let _market = self.engine.lock();
        let mut tx = self.db.transaction(tx_id).ok_or_else(|| {
            ExchangeError::entity_not_found(format!("Transaction {tx_id} not found"))
                .with_detail("transaction_id", tx_id)
        })?;
        if tx.tx_type != TransactionType::Withdraw {
            return Err(ExchangeError::invalid_order("Transaction is not a withdrawal")
                .with_detail("transaction_id", tx_id));
        }
        let account = self.get_account(tx.user_id)?;

        let balance = {
            let mut scope = self.db.begin();
            let mut balance = self.ensure_balance(account.id, tx.asset);
            if balance.locked < tx.amount {
                return Err(ExchangeError::settlement(
                    "Locked balance lower than withdrawal amount",
                )
                .with_detail("transaction_id", tx_id)
                .with_detail("account_id", account.id));
            }
            balance.locked -= tx.amount;
            balance.updated_at = Utc::now();
            let balance = self.db.upsert_balance(balance);

            tx.status = crate::models::TransactionStatus::Confirmed;
            tx.tx_hash = Some(tx_hash.to_string());
            tx.confirmations = confirmations;
            self.db.update_transaction(&tx);
            scope.commit();
            balance
        };

        self.publish_balance(&balance, "withdrawal_release");
        Ok(tx)
    }

    /// Move a withdrawal lock back to the spendable leg (admin rejection).
    pub(crate) fn release_withdrawal_lock(
        &self,
        user_id: u64,
        asset: Asset,
        amount: Decimal,
    ) -> Result<Balance> {
        let _market = self.engine.lock();
        let account = self.get_account(user_id)?;
        let mut scope = self.db.begin();
        let mut balance = self.ensure_balance(account.id, asset);
        if balance.locked < amount {
            return Err(
                ExchangeError::settlement("Locked balance lower than reversal amount")
                    .with_detail("account_id", account.id)
                    .with_detail("asset", asset),
            );
        }
        balance.locked -= amount;
        balance.available += amount;
        balance.updated_at = Utc::now();
        let balance = self.db.upsert_balance(balance);
        scope.commit();
        Ok(balance)
    }

    // ------------------------------------------------------------------
    // Order placement

    pub fn place_limit_order(
        &self,
        user_id: u64,
        side: Side,
        price: Decimal,
        amount: Decimal,
        time_in_force: TimeInForce,
    ) -> Result<Order> {
        let mut engine = self.engine.lock();
        let account = self.validated_account(user_id, price, amount)?;
        let order_id = self.lock_and_insert_order(
            &account,
            side,
            OrderType::Limit,
            time_in_force,
            price,
            amount,
            price,
        )?;

        let mut order = self.stored_order(order_id)?;
        let trades = engine.submit(&mut order)?;
        if !trades.is_empty() {
            self.settle_trades(&trades)?;
        }

        let order = self.stored_order(order_id)?;
        self.rebalance_after_order(&order)?;
        self.stored_order(order_id)
    }

    /// Park a stop order; funds are reserved against its limit price.
    pub fn place_stop_order(
        &self,
        user_id: u64,
        side: Side,
        price: Decimal,
        amount: Decimal,
        stop_price: Decimal,
    ) -> Result<Order> {
        if stop_price <= Decimal::ZERO {
            return Err(ExchangeError::stop_order("Stop price must be positive"));
        }
        let mut engine = self.engine.lock();
        let account = self.validated_account(user_id, price, amount)?;

        let order_id = {
            let mut scope = self.db.begin();
            let lock_asset = self.lock_asset(side);
            let lock_required = self.lock_required(side, price, amount);
            let balance = self.reserve(&account, lock_asset, lock_required)?;

            let mut order = Order::new(
                self.db.next_id(tables::ORDERS),
                user_id,
                account.id,
                &self.market,
                side,
                OrderType::Stop,
                TimeInForce::Gtc,
                Some(price),
                amount,
            );
            order.stop_price = Some(stop_price);
            let order = self.db.insert_order(order);
            scope.commit();

            self.publish_balance(&balance, "order_lock");
            order.id
        };

        let order = self.stored_order(order_id)?;
        engine.park_stop(order.clone())?;
        Ok(order)
    }

    /// Place a one-cancels-other pair: a limit leg that goes to the book
    /// and a stop leg that parks. The pair shares a single lock, sized by
    /// the costlier leg.
    #[allow(clippy::too_many_arguments)]
    pub fn place_oco_order(
        &self,
        user_id: u64,
        side: Side,
        price: Decimal,
        amount: Decimal,
        stop_price: Decimal,
        stop_limit_price: Decimal,
    ) -> Result<(Order, Order)> {
        if stop_price <= Decimal::ZERO || stop_limit_price <= Decimal::ZERO {
            return Err(ExchangeError::stop_order("Stop prices must be positive"));
        }
        let mut engine = self.engine.lock();
        let account = self.validated_account(user_id, price, amount)?;

        let (limit_id, stop_id) = {
            let mut scope = self.db.begin();
            let lock_asset = self.lock_asset(side);
            let lock_price = price.max(stop_limit_price);
            let lock_required = self.lock_required(side, lock_price, amount);
            let balance = self.reserve(&account, lock_asset, lock_required)?;

            let mut limit_leg = Order::new(
                self.db.next_id(tables::ORDERS),
                user_id,
                account.id,
                &self.market,
                side,
                OrderType::Oco,
                TimeInForce::Gtc,
                Some(price),
                amount,
            );
            let mut stop_leg = Order::new(
                self.db.next_id(tables::ORDERS),
                user_id,
                account.id,
                &self.market,
                side,
                OrderType::Oco,
                TimeInForce::Gtc,
                Some(stop_limit_price),
                amount,
            );
            stop_leg.stop_price = Some(stop_price);
            limit_leg.link_order_id = Some(stop_leg.id);
            stop_leg.link_order_id = Some(limit_leg.id);

            let limit_leg = self.db.insert_order(limit_leg);
            let stop_leg = self.db.insert_order(stop_leg);
            scope.commit();

            self.publish_balance(&balance, "order_lock");
            (limit_leg.id, stop_leg.id)
        };

        engine.register_oco_pair(limit_id, stop_id)?;
        let stop_leg = self.stored_order(stop_id)?;
        engine.park_stop(stop_leg)?;
        let mut limit_leg = self.stored_order(limit_id)?;
        let trades = engine.submit(&mut limit_leg)?;
        // Settlement rebalances the touched legs; while both legs rest the
        // shared lock stays at the size reserved above.
        if !trades.is_empty() {
            self.settle_trades(&trades)?;
        }
        Ok((self.stored_order(limit_id)?, self.stored_order(stop_id)?))
    }

    /// Cancel a resting order and return its lock to the spendable leg.
    /// Returns false when the order is unknown, foreign or terminal.
    pub fn cancel_order(&self, user_id: u64, order_id: u64) -> Result<bool> {
        let mut engine = self.engine.lock();
        let Some(order) = self.db.order(order_id) else {
            return Ok(false);
        };
        if order.user_id != user_id {
            return Ok(false);
        }

        let cancelled = engine.cancel(order_id)?;
        if cancelled {
            let order = self.stored_order(order_id)?;
            self.rebalance_after_order(&order)?;
        }
        Ok(cancelled)
    }

    // ------------------------------------------------------------------
    // Queries

    pub fn get_user_orders(&self, user_id: u64, status: Option<OrderStatus>) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .db
            .orders_by_user(user_id)
            .into_iter()
            .filter(|o| status.map_or(true, |s| o.status == s))
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        orders
    }

    pub fn get_user_trades(&self, user_id: u64, limit: usize) -> Vec<Trade> {
        let mut trades = self.db.trades_by_user(user_id);
        trades.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        trades.truncate(limit);
        trades
    }

    pub fn order_book_snapshot(&self) -> (Vec<BookLevel>, Vec<BookLevel>) {
        self.engine.lock().snapshot()
    }

    /// (parked stop orders, registered OCO pairs) for monitoring.
    pub fn matching_stats(&self) -> (usize, usize) {
        let engine = self.engine.lock();
        (engine.stop_order_count(), engine.oco_pair_count())
    }

    // ------------------------------------------------------------------
    // Settlement

    /// Apply the balance legs of a trade batch, then rebalance every
    /// touched order.
    fn settle_trades(&self, trades: &[Trade]) -> Result<()> {
        let now = Utc::now();
        let mut events: Vec<ExchangeEvent> = Vec::new();

        {
            let mut scope = self.db.begin();
            for trade in trades {
                let buy_order = self.stored_order(trade.buy_order_id)?;
                let sell_order = self.stored_order(trade.sell_order_id)?;
                let notional = trade.price * trade.amount;

                // Buyer: locked quote burns down by the reserved slice,
                // full base amount lands in available.
                let mut buy_quote = self.ensure_balance(buy_order.account_id, Asset::quote());
                buy_quote.locked -= self.lock_required(Side::Buy, trade.price, trade.amount);
                if buy_quote.locked < Decimal::ZERO {
                    return Err(
                        ExchangeError::settlement("Negative locked balance for buyer")
                            .with_detail("trade_id", trade.id)
                            .with_detail("account_id", buy_order.account_id),
                    );
                }
                buy_quote.updated_at = now;
                let buy_quote = self.db.upsert_balance(buy_quote);

                let mut buy_base = self.ensure_balance(buy_order.account_id, Asset::base());
                buy_base.available += trade.amount;
                buy_base.updated_at = now;
                let buy_base = self.db.upsert_balance(buy_base);

                // Seller: locked base burns down, quote proceeds arrive
                // net of the fee.
                let mut sell_base = self.ensure_balance(sell_order.account_id, Asset::base());
                sell_base.locked -= trade.amount;
                if sell_base.locked < Decimal::ZERO {
                    return Err(
                        ExchangeError::settlement("Negative locked balance for seller")
                            .with_detail("trade_id", trade.id)
                            .with_detail("account_id", sell_order.account_id),
                    );
                }
                sell_base.updated_at = now;
                let sell_base = self.db.upsert_balance(sell_base);

                let mut sell_quote = self.ensure_balance(sell_order.account_id, Asset::quote());
                sell_quote.available += notional * (Decimal::ONE - self.fee_rate);
                sell_quote.updated_at = now;
                let sell_quote = self.db.upsert_balance(sell_quote);

                for balance in [&buy_quote, &buy_base, &sell_base, &sell_quote] {
                    events.push(balance_event(balance, "trade_settlement"));
                }
                for order in [&buy_order, &sell_order] {
                    events.push(ExchangeEvent::OrderStatusChanged(
                        crate::events::OrderStatusChanged {
                            order_id: order.id,
                            status: order.status,
                            filled: order.filled,
                            remaining: order.remaining(),
                            reason: None,
                        },
                    ));
                }
            }
            scope.commit();
        }

        for event in events {
            self.bus.publish(event);
        }

        let mut touched: Vec<u64> = trades
            .iter()
            .flat_map(|t| [t.buy_order_id, t.sell_order_id])
            .collect();
        touched.sort_unstable();
        touched.dedup();
        for order_id in touched {
            let order = self.stored_order(order_id)?;
            self.rebalance_after_order(&order)?;
        }
        Ok(())
    }

    /// Reconcile the account's locked leg with what the order still
    /// requires, releasing any surplus.
    fn rebalance_after_order(&self, order: &Order) -> Result<()> {
        let asset = self.lock_asset(order.side);
        let expected_locked = self.expected_locked(order);

        let released = {
            let mut scope = self.db.begin();
            let mut balance = self.ensure_balance(order.account_id, asset);
            let delta = balance.locked - expected_locked;
            if delta < Decimal::ZERO {
                return Err(
                    ExchangeError::settlement("Locked balance below expected level")
                        .with_detail("order_id", order.id)
                        .with_detail("account_id", order.account_id),
                );
            }
            let released = if delta > Decimal::ZERO {
                balance.locked -= delta;
                balance.available += delta;
                balance.updated_at = Utc::now();
                Some(self.db.upsert_balance(balance))
            } else {
                None
            };
            scope.commit();
            released
        };

        if let Some(balance) = released {
            self.publish_balance(&balance, "lock_release");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals

    fn validated_account(&self, user_id: u64, price: Decimal, amount: Decimal) -> Result<Account> {
        let account = self.get_account(user_id)?;
        if account.frozen {
            return Err(ExchangeError::invalid_order("Account is frozen")
                .with_detail("account_id", account.id));
        }
        if amount <= Decimal::ZERO {
            return Err(ExchangeError::invalid_order("Amount must be positive"));
        }
        if price <= Decimal::ZERO {
            return Err(ExchangeError::invalid_order("Price must be positive"));
        }
        Ok(account)
    }

    /// Reserve `lock_required` and insert the order record, all in one
    /// scope. Returns the new order id.
    #[allow(clippy::too_many_arguments)]
    fn lock_and_insert_order(
        &self,
        account: &Account,
        side: Side,
        order_type: OrderType,
        time_in_force: TimeInForce,
        price: Decimal,
        amount: Decimal,
        lock_price: Decimal,
    ) -> Result<u64> {
        let mut scope = self.db.begin();
        let lock_asset = self.lock_asset(side);
        let lock_required = self.lock_required(side, lock_price, amount);
        let balance = self.reserve(account, lock_asset, lock_required)?;

        let order = self.db.insert_order(Order::new(
            self.db.next_id(tables::ORDERS),
            account.user_id,
            account.id,
            &self.market,
            side,
            order_type,
            time_in_force,
            Some(price),
            amount,
        ));
        scope.commit();

        self.publish_balance(&balance, "order_lock");
        Ok(order.id)
    }

    fn reserve(&self, account: &Account, asset: Asset, lock_required: Decimal) -> Result<Balance> {
        let mut balance = self.ensure_balance(account.id, asset);
        if balance.available < lock_required {
            return Err(
                ExchangeError::insufficient_balance("Insufficient available balance for order")
                    .with_detail("account_id", account.id)
                    .with_detail("asset", asset)
                    .with_detail("required", lock_required)
                    .with_detail("available", balance.available),
            );
        }
        balance.available -= lock_required;
        balance.locked += lock_required;
        balance.updated_at = Utc::now();
        Ok(self.db.upsert_balance(balance))
    }

    fn ensure_balance(&self, account_id: u64, asset: Asset) -> Balance {
        match self.db.find_balance(account_id, asset) {
            Some(balance) => balance,
            None => self.db.upsert_balance(Balance::new(
                self.db.next_id(tables::BALANCES),
                account_id,
                asset,
            )),
        }
    }

    fn lock_asset(&self, side: Side) -> Asset {
        match side {
            Side::Buy => Asset::quote(),
            Side::Sell => Asset::base(),
        }
    }

    fn lock_required(&self, side: Side, price: Decimal, amount: Decimal) -> Decimal {
        match side {
            Side::Buy => price * amount * (Decimal::ONE + self.fee_rate),
            Side::Sell => amount,
        }
    }

    fn expected_locked(&self, order: &Order) -> Decimal {
        let mut remaining = order.remaining();
        if matches!(order.status, OrderStatus::Canceled | OrderStatus::Filled) {
            remaining = Decimal::ZERO;
        } else if order.status == OrderStatus::Partial && order.time_in_force != TimeInForce::Gtc {
            // terminally partial: the remainder was cancelled
            remaining = Decimal::ZERO;
        }
        match order.side {
            Side::Buy => {
                let price = order.price.unwrap_or(Decimal::ZERO);
                price * remaining * (Decimal::ONE + self.fee_rate)
            }
            Side::Sell => remaining,
        }
    }

    fn stored_order(&self, order_id: u64) -> Result<Order> {
        self.db.order(order_id).ok_or_else(|| {
            ExchangeError::entity_not_found(format!("Order {order_id} not found"))
                .with_detail("order_id", order_id)
        })
    }

    fn publish_balance(&self, balance: &Balance, reason: &str) {
        self.bus.publish(balance_event(balance, reason));
    }
}

fn balance_event(balance: &Balance, reason: &str) -> ExchangeEvent {
    ExchangeEvent::BalanceChanged(BalanceChanged {
        account_id: balance.account_id,
        asset: balance.asset,
        available: balance.available,
        locked: balance.locked,
        reason: reason.to_string(),
    })
}
