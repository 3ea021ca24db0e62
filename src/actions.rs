//! Canonical action shapes as the exchange expects them on the wire.
//!
//! Field order and names matter: L1 actions are hashed from their msgpack
//! encoding, so every struct here serializes exactly as the exchange decodes it.

use serde::{Deserialize, Serialize, Serializer};

use crate::types::{AssetIndex, Cloid, Nonce, OrderId};

/// Chain id advertised in user-signed actions (Arbitrum One, `0xa4b1`).
pub const SIGNATURE_CHAIN_ID: u64 = 0xa4b1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Tif {
    Alo,
    Ioc,
    Gtc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tpsl {
    Tp,
    Sl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Grouping {
    #[default]
    Na,
    NormalTpsl,
    PositionTpsl,
}

impl Tif {
    pub const fn as_str(self) -> &'static str {
        match self {
            Tif::Alo => "Alo",
            Tif::Ioc => "Ioc",
            Tif::Gtc => "Gtc",
        }
    }
}

impl Tpsl {
    pub const fn as_str(self) -> &'static str {
        match self {
            Tpsl::Tp => "tp",
            Tpsl::Sl => "sl",
        }
    }
}

impl Grouping {
    pub const fn as_str(self) -> &'static str {
        match self {
            Grouping::Na => "na",
            Grouping::NormalTpsl => "normalTpsl",
            Grouping::PositionTpsl => "positionTpsl",
        }
    }
}

// Unit enums go out as plain strings so msgpack and JSON agree.
macro_rules! serialize_as_str {
    ($($ty:ty),*) => {
        $(
            impl Serialize for $ty {
                fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.serialize_str(self.as_str())
                }
            }
        )*
    };
}

serialize_as_str!(Tif, Tpsl, Grouping);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitWire {
    pub tif: Tif,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerWire {
    pub is_market: bool,
    pub trigger_px: String,
    pub tpsl: Tpsl,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderTypeWire {
    Limit(LimitWire),
    Trigger(TriggerWire),
}

/// Order entry inside an `order` or modify action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireOrder {
    #[serde(rename = "a")]
    pub asset: AssetIndex,
    #[serde(rename = "b")]
    pub is_buy: bool,
    #[serde(rename = "p")]
    pub limit_px: String,
    #[serde(rename = "s")]
    pub sz: String,
    #[serde(rename = "r")]
    pub reduce_only: bool,
    #[serde(rename = "t")]
    pub order_type: OrderTypeWire,
    #[serde(rename = "c", skip_serializing_if = "Option::is_none", default)]
    pub cloid: Option<Cloid>,
}

/// Builder fee attached to a whole order batch. `fee` is in tenths of a basis point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderInfo {
    #[serde(rename = "b")]
    pub builder: String,
    #[serde(rename = "f")]
    pub fee: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkOrder {
    pub orders: Vec<WireOrder>,
    pub grouping: Grouping,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builder: Option<BuilderInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelWire {
    #[serde(rename = "a")]
    pub asset: AssetIndex,
    #[serde(rename = "o")]
    pub oid: OrderId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkCancel {
    pub cancels: Vec<CancelWire>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelByCloidWire {
    pub asset: AssetIndex,
    pub cloid: Cloid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkCancelByCloid {
    pub cancels: Vec<CancelByCloidWire>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifyWire {
    pub oid: OrderId,
    pub order: WireOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkModify {
    pub modifies: Vec<ModifyWire>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeverage {
    pub asset: AssetIndex,
    pub is_cross: bool,
    pub leverage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIsolatedMargin {
    pub asset: AssetIndex,
    pub is_buy: bool,
    pub ntli: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsdSend {
    pub hyperliquid_chain: String,
    pub signature_chain_id: String,
    pub destination: String,
    pub amount: String,
    pub time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotSend {
    pub hyperliquid_chain: String,
    pub signature_chain_id: String,
    pub destination: String,
    pub token: String,
    pub amount: String,
    pub time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdraw3 {
    pub hyperliquid_chain: String,
    pub signature_chain_id: String,
    pub destination: String,
    pub amount: String,
    pub time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassTransfer {
    /// Micro-USDC.
    pub usdc: u64,
    pub to_perp: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotUser {
    pub class_transfer: ClassTransfer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleCancel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultTransfer {
    /// Lowercase `0x` hex; msgpack must see a string, not raw bytes.
    pub vault_address: String,
    pub is_deposit: bool,
    pub usd: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetReferrer {
    pub code: String,
}

/// Every action the client can sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    Order(BulkOrder),
    Cancel(BulkCancel),
    CancelByCloid(BulkCancelByCloid),
    Modify(ModifyWire),
    BatchModify(BulkModify),
    UpdateLeverage(UpdateLeverage),
    UpdateIsolatedMargin(UpdateIsolatedMargin),
    UsdSend(UsdSend),
    SpotSend(SpotSend),
    Withdraw3(Withdraw3),
    SpotUser(SpotUser),
    ScheduleCancel(ScheduleCancel),
    VaultTransfer(VaultTransfer),
    SetReferrer(SetReferrer),
}

impl Action {
    /// Wire name carried in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Order(_) => "order",
            Action::Cancel(_) => "cancel",
            Action::CancelByCloid(_) => "cancelByCloid",
            Action::Modify(_) => "modify",
            Action::BatchModify(_) => "batchModify",
            Action::UpdateLeverage(_) => "updateLeverage",
            Action::UpdateIsolatedMargin(_) => "updateIsolatedMargin",
            Action::UsdSend(_) => "usdSend",
            Action::SpotSend(_) => "spotSend",
            Action::Withdraw3(_) => "withdraw3",
            Action::SpotUser(_) => "spotUser",
            Action::ScheduleCancel(_) => "scheduleCancel",
            Action::VaultTransfer(_) => "vaultTransfer",
            Action::SetReferrer(_) => "setReferrer",
        }
    }

    /// Entries in a batched action; 1 for anything unbatched.
    pub fn batch_len(&self) -> usize {
        match self {
            Action::Order(bulk) => bulk.orders.len(),
            Action::Cancel(bulk) => bulk.cancels.len(),
            Action::CancelByCloid(bulk) => bulk.cancels.len(),
            Action::BatchModify(bulk) => bulk.modifies.len(),
            _ => 1,
        }
    }

    pub fn is_cancel(&self) -> bool {
        matches!(self, Action::Cancel(_) | Action::CancelByCloid(_))
    }

    /// Typed-data schema for actions signed under the user-signed domain.
    pub fn user_signed_schema(&self) -> Option<&'static UserSignedSchema> {
        match self {
            Action::UsdSend(_) => Some(&USD_SEND_SCHEMA),
            Action::SpotSend(_) => Some(&SPOT_SEND_SCHEMA),
            Action::Withdraw3(_) => Some(&WITHDRAW_SCHEMA),
            _ => None,
        }
    }

    /// Writes the nonce into the `time` field of user-signed actions, whose
    /// nonce is their timestamp. No-op for every other action.
    pub fn stamp_nonce(&mut self, nonce: Nonce) {
        let time = nonce.into_inner();
        match self {
            Action::UsdSend(send) => send.time = time,
            Action::SpotSend(send) => send.time = time,
            Action::Withdraw3(withdraw) => withdraw.time = time,
            _ => {}
        }
    }
}

/// Solidity type of a field in a user-signed schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Uint64,
    Address,
    Bool,
}

impl FieldKind {
    pub const fn solidity_name(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Uint64 => "uint64",
            FieldKind::Address => "address",
            FieldKind::Bool => "bool",
        }
    }
}

/// Ordered EIP-712 field list plus the primary type name.
#[derive(Debug, PartialEq, Eq)]
pub struct UserSignedSchema {
    pub primary_type: &'static str,
    pub fields: &'static [(&'static str, FieldKind)],
}

impl UserSignedSchema {
    /// Canonical EIP-712 type string, e.g. `Name(string a,uint64 b)`.
    pub fn encode_type(&self) -> String {
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|(name, kind)| format!("{} {}", kind.solidity_name(), name))
            .collect();
        format!("{}({})", self.primary_type, fields.join(","))
    }
}

pub static USD_SEND_SCHEMA: UserSignedSchema = UserSignedSchema {
    primary_type: "HyperliquidTransaction:UsdSend",
    fields: &[
        ("hyperliquidChain", FieldKind::String),
        ("destination", FieldKind::String),
        ("amount", FieldKind::String),
        ("time", FieldKind::Uint64),
    ],
};

pub static SPOT_SEND_SCHEMA: UserSignedSchema = UserSignedSchema {
    primary_type: "HyperliquidTransaction:SpotSend",
    fields: &[
        ("hyperliquidChain", FieldKind::String),
        ("destination", FieldKind::String),
        ("token", FieldKind::String),
        ("amount", FieldKind::String),
        ("time", FieldKind::Uint64),
    ],
};

pub static WITHDRAW_SCHEMA: UserSignedSchema = UserSignedSchema {
    primary_type: "HyperliquidTransaction:Withdraw",
    fields: &[
        ("hyperliquidChain", FieldKind::String),
        ("destination", FieldKind::String),
        ("amount", FieldKind::String),
        ("time", FieldKind::Uint64),
    ],
};
