use std::{fmt, str::FromStr};

use alloy::primitives::B128;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::{Duration, OffsetDateTime};

/// Offset added to a spot market's index to form its wire asset index.
pub const SPOT_ASSET_OFFSET: u32 = 10_000;

/// Wire-level identifier for a tradable instrument.
#[repr(transparent)]
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AssetIndex(pub u32);

impl AssetIndex {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn spot(market_index: u32) -> Self {
        Self(SPOT_ASSET_OFFSET + market_index)
    }

    pub const fn into_inner(self) -> u32 {
        self.0
    }

    pub const fn is_spot(self) -> bool {
        self.0 >= SPOT_ASSET_OFFSET
    }
}

impl From<u32> for AssetIndex {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<AssetIndex> for u32 {
    fn from(value: AssetIndex) -> Self {
        value.into_inner()
    }
}

impl fmt::Display for AssetIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Exchange assigned order identifier.
#[repr(transparent)]
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl OrderId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn into_inner(self) -> u64 {
        self.0
    }
}

impl From<u64> for OrderId {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Millisecond nonce attached to every signed action.
#[repr(transparent)]
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Nonce(u64);

impl Nonce {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn into_inner(self) -> u64 {
        self.0
    }
}

impl From<u64> for Nonce {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl From<Nonce> for u64 {
    fn from(value: Nonce) -> Self {
        value.into_inner()
    }
}

/// 128-bit client order id, rendered as `0x`-prefixed hex on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cloid(B128);

impl Cloid {
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(B128::new(bytes))
    }

    pub fn random() -> Self {
        Self::new(rand::random())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0 .0
    }
}

impl fmt::Display for Cloid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Cloid {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.len() != 32 {
            return Err(format!("cloid must be 16 bytes of hex, got `{s}`"));
        }
        B128::from_str(digits)
            .map(Self)
            .map_err(|err| format!("invalid cloid `{s}`: {err}"))
    }
}

impl Serialize for Cloid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Cloid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub const fn is_buy(self) -> bool {
        matches!(self, Side::Buy)
    }

    pub const fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "Buy"),
            Side::Sell => write!(f, "Sell"),
        }
    }
}

/// Network the client signs for. Fixed for the lifetime of a signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub const fn from_testnet_flag(testnet: bool) -> Self {
        if testnet {
            Network::Testnet
        } else {
            Network::Mainnet
        }
    }

    pub const fn is_mainnet(self) -> bool {
        matches!(self, Network::Mainnet)
    }

    /// Value of the `hyperliquidChain` field in user-signed actions.
    pub const fn chain_name(self) -> &'static str {
        match self {
            Network::Mainnet => "Mainnet",
            Network::Testnet => "Testnet",
        }
    }

    pub const fn default_base_url(self) -> &'static str {
        match self {
            Network::Mainnet => "https://api.hyperliquid.xyz",
            Network::Testnet => "https://api.hyperliquid-testnet.xyz",
        }
    }
}

/// Deadline used by `scheduleCancel`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Expiry(OffsetDateTime);

impl Expiry {
    pub fn unix_millis(timestamp: u64) -> Result<Self, time::error::ComponentRange> {
        let nanos = i128::from(timestamp) * 1_000_000;
        OffsetDateTime::from_unix_timestamp_nanos(nanos).map(Self)
    }

    pub fn from_now(duration: Duration) -> Self {
        Self(OffsetDateTime::now_utc() + duration)
    }

    pub fn into_unix_millis(self) -> u64 {
        let millis = self.0.unix_timestamp_nanos() / 1_000_000;
        u64::try_from(millis).unwrap_or_default()
    }

    pub fn as_datetime(self) -> OffsetDateTime {
        self.0
    }
}

impl From<OffsetDateTime> for Expiry {
    fn from(value: OffsetDateTime) -> Self {
        Self(value)
    }
}
