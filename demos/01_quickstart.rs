//! Resolve a few symbols, read mids and place a resting order far from the
//! market on testnet.
//!
//! Reads `HYPERLIQUID_PRIVATE_KEY` (and optionally `HYPERLIQUID_CONFIG`, a TOML
//! file) from the environment or a `.env` file.

use anyhow::{Context, Result};
use hyperliquid_client::{ClientConfig, HyperliquidClient};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match std::env::var("HYPERLIQUID_CONFIG") {
        Ok(path) => ClientConfig::load(path)?,
        Err(_) => {
            let mut config = ClientConfig::from_env()?;
            config.testnet = true;
            config
        }
    };
    let private_key =
        std::env::var("HYPERLIQUID_PRIVATE_KEY").context("HYPERLIQUID_PRIVATE_KEY not set")?;

    let client = HyperliquidClient::builder()
        .config(config)
        .private_key(private_key)
        .build()
        .context("failed to build client")?;

    let assets = client.symbols().list_assets().await?;
    println!(
        "{} perp and {} spot markets",
        assets.perp.len(),
        assets.spot.len()
    );

    let mids = client.info().all_mids().await?;
    let mid: Decimal = mids
        .get("ETH")
        .context("no ETH mid")?
        .parse()
        .context("unparseable ETH mid")?;
    println!("ETH mid: {mid}");

    let exchange = client.exchange()?;
    let price = (mid * dec!(0.5)).round_dp(1);
    let submission = exchange
        .order("ETH-PERP")
        .buy()
        .size(dec!(0.01))
        .limit(price)
        .post_only()
        .auto_cloid()
        .submit()
        .await?;
    println!("order response: {:?}", submission.response());

    if let Some(cancelled) = client
        .custom()?
        .cancel_all_orders(Some("ETH-PERP"))
        .await?
    {
        println!("cancel response: {:?}", cancelled.response());
    }

    println!("limiter stats: {:?}", client.limiter_stats().await);
    Ok(())
}
