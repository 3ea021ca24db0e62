use std::marker::PhantomData;

use alloy::primitives::Address;
use rust_decimal::Decimal;

use super::{
    errors::{Error, Result},
    exchange::{ExchangeClient, Submission},
};
use crate::{
    actions::{BuilderInfo, Grouping, LimitWire, OrderTypeWire, Tif, Tpsl, TriggerWire, WireOrder},
    types::{AssetIndex, Cloid, OrderId, Side},
};

/// Most fractional digits the exchange accepts in a price or size string.
pub const MAX_WIRE_DECIMALS: u32 = 8;

/// Order type, with the fields each variant needs on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    Limit {
        tif: Tif,
    },
    Trigger {
        trigger_px: Decimal,
        is_market: bool,
        tpsl: Tpsl,
    },
}

/// One order as a caller describes it.
///
/// A missing `limit_px` means "price it off the mid": the exchange client
/// fills it in with the configured default slippage before signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub size: Decimal,
    pub limit_px: Option<Decimal>,
    pub kind: OrderKind,
    pub reduce_only: bool,
    pub cloid: Option<Cloid>,
}

impl OrderRequest {
    pub fn limit(symbol: impl Into<String>, side: Side, size: Decimal, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            size,
            limit_px: Some(price),
            kind: OrderKind::Limit { tif: Tif::Gtc },
            reduce_only: false,
            cloid: None,
        }
    }

    /// Convert to the wire entry for `asset`, priced at `limit_px`.
    pub fn to_wire(&self, asset: AssetIndex, limit_px: Decimal) -> Result<WireOrder> {
        let order_type = match self.kind {
            OrderKind::Limit { tif } => OrderTypeWire::Limit(LimitWire { tif }),
            OrderKind::Trigger {
                trigger_px,
                is_market,
                tpsl,
            } => OrderTypeWire::Trigger(TriggerWire {
                is_market,
                trigger_px: decimal_to_wire("trigger price", trigger_px)?,
                tpsl,
            }),
        };
        Ok(WireOrder {
            asset,
            is_buy: self.side.is_buy(),
            limit_px: decimal_to_wire("limit price", limit_px)?,
            sz: decimal_to_wire("size", self.size)?,
            reduce_only: self.reduce_only,
            order_type,
            cloid: self.cloid,
        })
    }
}

/// Batch of orders plus the metadata that applies to the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceOrderRequest {
    pub orders: Vec<OrderRequest>,
    pub grouping: Grouping,
    pub builder: Option<BuilderInfo>,
    /// Overrides the client's configured vault for this batch.
    pub vault_address: Option<Address>,
}

impl PlaceOrderRequest {
    pub fn new(orders: Vec<OrderRequest>) -> Self {
        Self {
            orders,
            ..Self::default()
        }
    }

    pub fn with_grouping(mut self, grouping: Grouping) -> Self {
        self.grouping = grouping;
        self
    }

    pub fn with_builder(mut self, builder: BuilderInfo) -> Self {
        self.builder = Some(builder);
        self
    }

    pub fn with_vault(mut self, vault: Address) -> Self {
        self.vault_address = Some(vault);
        self
    }
}

impl From<OrderRequest> for PlaceOrderRequest {
    fn from(order: OrderRequest) -> Self {
        Self::new(vec![order])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelRequest {
    pub symbol: String,
    pub oid: OrderId,
}

impl CancelRequest {
    pub fn new(symbol: impl Into<String>, oid: impl Into<OrderId>) -> Self {
        Self {
            symbol: symbol.into(),
            oid: oid.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyRequest {
    pub oid: OrderId,
    pub order: OrderRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeverageMode {
    Cross,
    Isolated,
}

impl LeverageMode {
    pub const fn is_cross(self) -> bool {
        matches!(self, LeverageMode::Cross)
    }
}

/// Render a decimal the way the exchange expects: no exponent, no trailing
/// zeros, at most eight fractional digits. Negative values are rejected.
pub fn decimal_to_wire(field: &str, value: Decimal) -> Result<String> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(Error::InvalidOrder(format!("{field} must not be negative: {value}")));
    }
    let normalized = value.normalize();
    if normalized.scale() > MAX_WIRE_DECIMALS {
        return Err(Error::InvalidOrder(format!(
            "{field} {value} has more than {MAX_WIRE_DECIMALS} decimal places"
        )));
    }
    Ok(normalized.abs().to_string())
}

/// Order builder typestates.
pub struct OrderStateInit;
pub struct OrderStateSide;
pub struct OrderStateQty;
pub struct OrderStateReady;

struct OrderBuilderState<'a> {
    client: &'a ExchangeClient,
    symbol: String,
    side: Side,
    size: Decimal,
    limit_px: Option<Decimal>,
    tif: Tif,
    trigger: Option<(Decimal, bool, Tpsl)>,
    reduce_only: bool,
    cloid: Option<Cloid>,
}

impl OrderBuilderState<'_> {
    fn request(&self) -> OrderRequest {
        let kind = match self.trigger {
            Some((trigger_px, is_market, tpsl)) => OrderKind::Trigger {
                trigger_px,
                is_market,
                tpsl,
            },
            None => OrderKind::Limit { tif: self.tif },
        };
        OrderRequest {
            symbol: self.symbol.clone(),
            side: self.side,
            size: self.size,
            limit_px: self.limit_px,
            kind,
            reduce_only: self.reduce_only,
            cloid: self.cloid,
        }
    }
}

/// Fluent order builder that enforces side, size and type at compile time.
pub struct OrderBuilder<'a, S> {
    state: OrderBuilderState<'a>,
    _marker: PhantomData<S>,
}

impl<'a, S> OrderBuilder<'a, S> {
    fn transition<T>(self) -> OrderBuilder<'a, T> {
        OrderBuilder {
            state: self.state,
            _marker: PhantomData,
        }
    }

    pub fn reduce_only(mut self) -> Self {
        self.state.reduce_only = true;
        self
    }

    pub fn with_cloid(mut self, cloid: Cloid) -> Self {
        self.state.cloid = Some(cloid);
        self
    }

    pub fn auto_cloid(self) -> Self {
        self.with_cloid(Cloid::random())
    }

    pub fn ioc(mut self) -> Self {
        self.state.tif = Tif::Ioc;
        self
    }

    pub fn post_only(mut self) -> Self {
        self.state.tif = Tif::Alo;
        self
    }

    pub fn gtc(mut self) -> Self {
        self.state.tif = Tif::Gtc;
        self
    }
}

impl<'a> OrderBuilder<'a, OrderStateInit> {
    pub(crate) fn new(client: &'a ExchangeClient, symbol: impl Into<String>) -> Self {
        Self {
            state: OrderBuilderState {
                client,
                symbol: symbol.into(),
                side: Side::Buy,
                size: Decimal::ZERO,
                limit_px: None,
                tif: Tif::Gtc,
                trigger: None,
                reduce_only: false,
                cloid: None,
            },
            _marker: PhantomData,
        }
    }

    pub fn buy(mut self) -> OrderBuilder<'a, OrderStateSide> {
        self.state.side = Side::Buy;
        self.transition()
    }

    pub fn sell(mut self) -> OrderBuilder<'a, OrderStateSide> {
        self.state.side = Side::Sell;
        self.transition()
    }
}

impl<'a> OrderBuilder<'a, OrderStateSide> {
    pub fn size(mut self, size: Decimal) -> OrderBuilder<'a, OrderStateQty> {
        self.state.size = size;
        self.transition()
    }
}

impl<'a> OrderBuilder<'a, OrderStateQty> {
    pub fn limit(mut self, price: Decimal) -> OrderBuilder<'a, OrderStateReady> {
        self.state.limit_px = Some(price);
        self.transition()
    }

    /// Immediate-or-cancel priced off the mid with the default slippage.
    pub fn market(mut self) -> OrderBuilder<'a, OrderStateReady> {
        self.state.tif = Tif::Ioc;
        self.state.limit_px = None;
        self.transition()
    }

    pub fn take_profit(self, trigger: Decimal) -> OrderBuilder<'a, OrderStateReady> {
        self.trigger(trigger, None, Tpsl::Tp)
    }

    pub fn take_profit_limit(
        self,
        trigger: Decimal,
        price: Decimal,
    ) -> OrderBuilder<'a, OrderStateReady> {
        self.trigger(trigger, Some(price), Tpsl::Tp)
    }

    pub fn stop_loss(self, trigger: Decimal) -> OrderBuilder<'a, OrderStateReady> {
        self.trigger(trigger, None, Tpsl::Sl)
    }

    pub fn stop_loss_limit(
        self,
        trigger: Decimal,
        price: Decimal,
    ) -> OrderBuilder<'a, OrderStateReady> {
        self.trigger(trigger, Some(price), Tpsl::Sl)
    }

    // Market triggers still carry a limit price; the trigger price is the
    // natural bound when the caller gives none.
    fn trigger(
        mut self,
        trigger: Decimal,
        price: Option<Decimal>,
        tpsl: Tpsl,
    ) -> OrderBuilder<'a, OrderStateReady> {
        self.state.trigger = Some((trigger, price.is_none(), tpsl));
        self.state.limit_px = Some(price.unwrap_or(trigger));
        self.transition()
    }
}

impl<'a> OrderBuilder<'a, OrderStateReady> {
    pub fn into_request(self) -> OrderRequest {
        self.state.request()
    }

    pub async fn submit(self) -> Result<Submission> {
        let request = self.state.request();
        self.state.client.place_order(request).await
    }
}
