//! Compound conveniences built from single exchange operations.

use futures_util::future::join_all;
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::{
    errors::{Error, Result},
    exchange::{ExchangeClient, Submission},
    orders::{CancelRequest, OrderKind, OrderRequest},
};
use crate::{
    actions::Tif,
    models::PositionData,
    symbols::AssetList,
    trading_helpers::{closing_order, parse_decimal, price_with_slippage},
    types::{Cloid, Side},
};

/// Market-style helpers. Obtained through
/// [`HyperliquidClient::custom`](super::HyperliquidClient::custom), so it is
/// only reachable with a valid key.
#[derive(Clone)]
pub struct CustomOperations {
    exchange: ExchangeClient,
}

impl CustomOperations {
    pub(crate) fn new(exchange: ExchangeClient) -> Self {
        Self { exchange }
    }

    /// Immediate-or-cancel order priced `slippage` through the mid (or `px`).
    pub async fn market_open(
        &self,
        symbol: &str,
        side: Side,
        size: Decimal,
        px: Option<Decimal>,
        slippage: Option<Decimal>,
        cloid: Option<Cloid>,
    ) -> Result<Submission> {
        let limit_px = self.slippage_price(symbol, side, slippage, px).await?;
        let order = market_order(symbol, side, size, limit_px, false, cloid);
        self.exchange.place_order(order).await
    }

    /// Flatten (or reduce by `size`) the position in `symbol`.
    pub async fn market_close(
        &self,
        symbol: &str,
        size: Option<Decimal>,
        px: Option<Decimal>,
        slippage: Option<Decimal>,
        cloid: Option<Cloid>,
    ) -> Result<Submission> {
        let coin = self.exchange.symbols().to_exchange_name(symbol).await?;
        let position = self
            .positions()
            .await?
            .into_iter()
            .find(|position| position.coin == coin)
            .ok_or_else(|| Error::NoMatch(format!("no position found for {symbol}")))?;
        let szi = parse_decimal("szi", &position.szi)?;
        self.close(symbol, szi, size, px, slippage, cloid).await
    }

    /// Close every open position concurrently. Nothing open is a success with
    /// no submissions; the first failed close fails the whole call. Positions
    /// on coins missing from the metadata are skipped, as in
    /// [`cancel_all_orders`](Self::cancel_all_orders).
    pub async fn close_all_positions(&self, slippage: Option<Decimal>) -> Result<Vec<Submission>> {
        let mut targets = Vec::new();
        for position in self.positions().await? {
            let szi = parse_decimal("szi", &position.szi)?;
            if szi.is_zero() {
                continue;
            }
            let symbol = match self.exchange.symbols().to_external(&position.coin).await {
                Ok(symbol) => symbol,
                Err(Error::UnknownAsset(_)) => {
                    debug!(coin = %position.coin, "skipping position on unknown coin");
                    continue;
                }
                Err(err) => return Err(err),
            };
            targets.push((symbol, szi));
        }

        if targets.is_empty() {
            debug!("no open positions to close");
            return Ok(Vec::new());
        }
        info!(count = targets.len(), "closing all positions");

        let closes = targets
            .iter()
            .map(|(symbol, szi)| self.close(symbol, *szi, None, None, slippage, None));
        join_all(closes).await.into_iter().collect()
    }

    /// Cancel every open order, or only those on `symbol`. `Ok(None)` when
    /// nothing matched.
    pub async fn cancel_all_orders(&self, symbol: Option<&str>) -> Result<Option<Submission>> {
        let account = self.exchange.account_address();
        let open_orders = self.exchange.info().open_orders(account).await?;

        let mut cancels = Vec::new();
        for order in open_orders {
            let external = match self.exchange.symbols().to_external(&order.coin).await {
                Ok(external) => external,
                Err(Error::UnknownAsset(_)) => {
                    debug!(coin = %order.coin, "skipping order on unknown coin");
                    continue;
                }
                Err(err) => return Err(err),
            };
            if symbol.is_some_and(|wanted| wanted != external) {
                continue;
            }
            cancels.push(CancelRequest::new(external, order.oid));
        }

        if cancels.is_empty() {
            debug!(?symbol, "no open orders to cancel");
            return Ok(None);
        }
        self.exchange.cancel_orders(cancels).await.map(Some)
    }

    pub async fn all_assets(&self) -> Result<AssetList> {
        self.exchange.symbols().list_assets().await
    }

    async fn positions(&self) -> Result<Vec<PositionData>> {
        let state = self
            .exchange
            .info()
            .clearinghouse_state(self.exchange.account_address())
            .await?;
        Ok(state
            .asset_positions
            .into_iter()
            .map(|entry| entry.position)
            .collect())
    }

    async fn close(
        &self,
        symbol: &str,
        szi: Decimal,
        size: Option<Decimal>,
        px: Option<Decimal>,
        slippage: Option<Decimal>,
        cloid: Option<Cloid>,
    ) -> Result<Submission> {
        let (side, open_size) = closing_order(szi)
            .ok_or_else(|| Error::NoMatch(format!("no position to close for {symbol}")))?;
        let limit_px = self.slippage_price(symbol, side, slippage, px).await?;
        let order = market_order(symbol, side, size.unwrap_or(open_size), limit_px, true, cloid);
        self.exchange.place_order(order).await
    }

    async fn slippage_price(
        &self,
        symbol: &str,
        side: Side,
        slippage: Option<Decimal>,
        px: Option<Decimal>,
    ) -> Result<Decimal> {
        let reference = match px {
            Some(px) => px,
            None => self.exchange.mid_price(symbol, &mut None).await?,
        };
        let is_spot = self.exchange.resolve(symbol).await?.is_spot();
        let slippage = slippage.unwrap_or_else(|| self.exchange.default_slippage());
        Ok(price_with_slippage(reference, slippage, side, is_spot))
    }
}

fn market_order(
    symbol: &str,
    side: Side,
    size: Decimal,
    limit_px: Decimal,
    reduce_only: bool,
    cloid: Option<Cloid>,
) -> OrderRequest {
    OrderRequest {
        symbol: symbol.to_string(),
        side,
        size,
        limit_px: Some(limit_px),
        kind: OrderKind::Limit { tif: Tif::Ioc },
        reduce_only,
        cloid,
    }
}
