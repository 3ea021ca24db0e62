mod client;
mod custom;
mod errors;
mod exchange;
mod orders;

pub use client::{HyperliquidClient, HyperliquidClientBuilder};
pub use custom::CustomOperations;
pub use errors::{Error, Result};
pub use exchange::{ExchangeClient, ExchangePayload, ExchangeResponse, Submission};
pub use orders::{
    decimal_to_wire, CancelRequest, LeverageMode, ModifyRequest, OrderBuilder, OrderKind,
    OrderRequest, OrderStateInit, OrderStateQty, OrderStateReady, OrderStateSide,
    PlaceOrderRequest, MAX_WIRE_DECIMALS,
};
