//! Flatten every open perp position with IOC orders 1% through the mid.

use anyhow::{Context, Result};
use hyperliquid_client::{ClientConfig, HyperliquidClient};
use rust_decimal_macros::dec;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let private_key =
        std::env::var("HYPERLIQUID_PRIVATE_KEY").context("HYPERLIQUID_PRIVATE_KEY not set")?;
    let client = HyperliquidClient::builder()
        .config(ClientConfig::from_env()?)
        .private_key(private_key)
        .live_volume()
        .build()?;

    let closed = client
        .custom()?
        .close_all_positions(Some(dec!(0.01)))
        .await?;
    if closed.is_empty() {
        println!("nothing to close");
    }
    for submission in closed {
        println!(
            "nonce {}: {:?}",
            submission.payload().nonce.into_inner(),
            submission.response()
        );
    }
    Ok(())
}
