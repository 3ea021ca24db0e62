//! Response shapes returned by the info endpoint.

use std::collections::HashMap;

use serde::Deserialize;

/// Perpetual universe.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Meta {
    pub universe: Vec<AssetMeta>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AssetMeta {
    pub name: String,
    pub sz_decimals: u32,
    #[serde(default)]
    pub max_leverage: Option<u32>,
    #[serde(default)]
    pub only_isolated: Option<bool>,
    #[serde(default)]
    pub is_delisted: Option<bool>,
}

/// Spot universe and its token table.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct SpotMeta {
    pub universe: Vec<SpotMarket>,
    pub tokens: Vec<SpotToken>,
}

impl SpotMeta {
    /// Token name at `index` in the token table.
    pub fn token_name(&self, index: usize) -> Option<&str> {
        self.tokens
            .iter()
            .find(|token| token.index == index)
            .map(|token| token.name.as_str())
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SpotMarket {
    /// Exchange coin name, e.g. `PURR/USDC` or `@107`.
    pub name: String,
    pub tokens: Vec<usize>,
    pub index: u32,
    #[serde(default)]
    pub is_canonical: bool,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SpotToken {
    pub name: String,
    pub index: usize,
    pub sz_decimals: u32,
    #[serde(default)]
    pub wei_decimals: Option<u32>,
}

/// Coin name to mid price string.
pub type AllMids = HashMap<String, String>;

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ClearinghouseState {
    pub asset_positions: Vec<AssetPosition>,
    #[serde(default)]
    pub withdrawable: Option<String>,
    #[serde(default)]
    pub time: Option<u64>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AssetPosition {
    pub position: PositionData,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PositionData {
    pub coin: String,
    /// Signed size; negative for shorts.
    pub szi: String,
    #[serde(default)]
    pub entry_px: Option<String>,
    #[serde(default)]
    pub unrealized_pnl: Option<String>,
    #[serde(default)]
    pub liquidation_px: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrder {
    pub coin: String,
    pub oid: u64,
    pub side: String,
    pub limit_px: String,
    pub sz: String,
    pub timestamp: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserRateLimit {
    pub cum_vlm: String,
    pub n_requests_used: u64,
    pub n_requests_cap: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SpotClearinghouseState {
    pub balances: Vec<SpotBalance>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SpotBalance {
    pub coin: String,
    pub total: String,
    pub hold: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct L2Book {
    pub coin: String,
    pub levels: Vec<Vec<BookLevel>>,
    pub time: u64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BookLevel {
    pub px: String,
    pub sz: String,
    pub n: u32,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserFill {
    pub coin: String,
    pub px: String,
    pub sz: String,
    pub side: String,
    pub time: u64,
    pub oid: u64,
    #[serde(default)]
    pub fee: Option<String>,
}
