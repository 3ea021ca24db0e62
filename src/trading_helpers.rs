//! Trading helper utilities
//!
//! Price and position arithmetic used by the market-order conveniences. All of
//! it is done in `Decimal` so values reach the wire exactly as computed.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::{
    hyperliquid_client::{Error, Result},
    types::Side,
};

/// Fractional digits kept for spot prices after applying slippage.
pub const SPOT_PRICE_DECIMALS: u32 = 8;

/// Calculate the mid-price from bid and ask prices
pub fn mid_price(bid: Decimal, ask: Decimal) -> Decimal {
    (bid + ask) / Decimal::TWO
}

/// Spread between bid and ask in basis points of the mid-price
pub fn spread_bps(bid: Decimal, ask: Decimal) -> Option<Decimal> {
    let mid = mid_price(bid, ask);
    if mid.is_zero() {
        return None;
    }
    Some((ask - bid) / mid * Decimal::from(10_000))
}

/// Calculate an aggressive limit price around `reference`
///
/// # Arguments
/// * `reference` - Mid or caller-supplied price
/// * `slippage` - Fraction, e.g. `0.05` for 5%
/// * `side` - Buys pay up, sells give down
/// * `is_spot` - Spot prices keep 8 decimals; perp prices keep one decimal
///   fewer than `reference` carries
pub fn price_with_slippage(
    reference: Decimal,
    slippage: Decimal,
    side: Side,
    is_spot: bool,
) -> Decimal {
    let decimals = if is_spot {
        SPOT_PRICE_DECIMALS
    } else {
        reference.normalize().scale().saturating_sub(1)
    };
    let factor = if side.is_buy() {
        Decimal::ONE + slippage
    } else {
        Decimal::ONE - slippage
    };
    (reference * factor)
        .round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

/// Side and size of the order that flattens a position of signed size `szi`.
/// Returns `None` for a flat position.
pub fn closing_order(szi: Decimal) -> Option<(Side, Decimal)> {
    if szi.is_zero() {
        return None;
    }
    let side = if szi.is_sign_negative() {
        Side::Buy
    } else {
        Side::Sell
    };
    Some((side, szi.abs()))
}

/// Parse a decimal string from an API response.
pub fn parse_decimal(field: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value)
        .map_err(|err| Error::InvalidOrder(format!("invalid {field} `{value}`: {err}")))
}
