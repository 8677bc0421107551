use std::str::FromStr;

use rust_decimal::Decimal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use altx_exchange::models::{Asset, Side, TimeInForce};
use altx_exchange::{AppConfig, ExchangeContext};

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "altx_exchange=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;

    tracing::info!("Starting ALTX exchange core v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.environment);

    let environment = config.environment.clone();
    let context = ExchangeContext::build(config)?;
    tracing::info!("Exchange context ready; transport adapters attach here");

    if environment == "development" {
        run_demo_session(&context)?;
    }

    Ok(())
}

/// Seed a pair of users and run one cross so a development build has
/// something to look at.
fn run_demo_session(context: &ExchangeContext) -> anyhow::Result<()> {
    tracing::info!("Running development demo session");

    let alice = context.accounts.create_user("alice@example.com", "demo-pass")?;
    let bob = context.accounts.create_user("bob@example.com", "demo-pass")?;

    context
        .accounts
        .credit_deposit(alice.id, Asset::Usdt, Decimal::from_str("10000")?, None)?;
    context
        .accounts
        .credit_deposit(bob.id, Asset::Alt, Decimal::from_str("100")?, None)?;
    tracing::info!(
        alice_deposit_address = %context.wallet.deposit_address(alice.id, Asset::Usdt),
        bob_deposit_address = %context.wallet.deposit_address(bob.id, Asset::Alt),
        "demo users funded"
    );

    let price = Decimal::from_str("100")?;
    let amount = Decimal::from_str("10")?;
    context
        .accounts
        .place_limit_order(bob.id, Side::Sell, price, amount, TimeInForce::Gtc)?;
    let order = context
        .accounts
        .place_limit_order(alice.id, Side::Buy, price, amount, TimeInForce::Gtc)?;
    tracing::info!(order_id = order.id, status = %order.status, "demo cross placed");

    for trade in context.market_data.recent_trades() {
        tracing::info!(
            trade_id = trade.trade_id,
            price = %trade.price,
            amount = %trade.amount,
            "demo trade"
        );
    }
    for user in [&alice, &bob] {
        for asset in Asset::ALL {
            let balance = context.accounts.get_balance(user.id, asset)?;
            tracing::info!(
                user = %user.email,
                asset = %asset,
                available = %balance.available,
                locked = %balance.locked,
                "demo balance"
            );
        }
    }

    Ok(())
}
