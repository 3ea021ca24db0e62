use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use alloy::primitives::{hex, Address};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{
    errors::{Error, Result},
    orders::{
        decimal_to_wire, CancelRequest, LeverageMode, ModifyRequest, OrderBuilder, OrderRequest,
        OrderStateInit, PlaceOrderRequest,
    },
};
use crate::{
    actions::{
        Action, BulkCancel, BulkCancelByCloid, BulkModify, BulkOrder, CancelByCloidWire,
        CancelWire, ClassTransfer, ModifyWire, ScheduleCancel, SetReferrer, SpotSend, SpotUser,
        UpdateIsolatedMargin, UpdateLeverage, UsdSend, VaultTransfer, Withdraw3,
        SIGNATURE_CHAIN_ID,
    },
    info::InfoClient,
    nonce_manager::NonceManager,
    rate_limit::AddressRateLimiter,
    signer::{ActionSigner, WireSignature},
    symbols::SymbolResolver,
    timings,
    trading_helpers::{parse_decimal, price_with_slippage},
    transport::{Dispatcher, Endpoint},
    types::{AssetIndex, Cloid, Expiry, Nonce},
};

/// Body posted to the exchange endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangePayload {
    pub action: Action,
    pub nonce: Nonce,
    pub signature: WireSignature,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault_address: Option<String>,
}

/// Envelope of every exchange reply. The inner payload is left opaque.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "status", content = "response", rename_all = "lowercase")]
pub enum ExchangeResponse {
    Ok(Value),
    Err(String),
}

impl ExchangeResponse {
    pub fn is_ok(&self) -> bool {
        matches!(self, ExchangeResponse::Ok(_))
    }
}

/// Signed payload together with the exchange's reply to it.
#[derive(Debug, Clone)]
pub struct Submission {
    payload: ExchangePayload,
    response: ExchangeResponse,
}

impl Submission {
    fn new(payload: ExchangePayload, response: ExchangeResponse) -> Self {
        Self { payload, response }
    }

    pub fn payload(&self) -> &ExchangePayload {
        &self.payload
    }

    pub fn response(&self) -> &ExchangeResponse {
        &self.response
    }

    pub fn into_parts(self) -> (ExchangePayload, ExchangeResponse) {
        (self.payload, self.response)
    }
}

pub(crate) struct ExchangeParts {
    pub signer: ActionSigner,
    pub dispatcher: Dispatcher,
    pub info: InfoClient,
    pub symbols: Arc<SymbolResolver>,
    pub l1_limiter: AddressRateLimiter,
    pub nonces: Arc<dyn NonceManager>,
    pub account_address: String,
    pub vault: Option<Address>,
    pub referral_code: Option<String>,
    pub default_slippage: Decimal,
}

struct ExchangeInner {
    parts: ExchangeParts,
    referral_sent: AtomicBool,
}

/// Privileged handle. Only exists when a signing key validated, so holding one
/// is proof the client can sign.
#[derive(Clone)]
pub struct ExchangeClient {
    inner: Arc<ExchangeInner>,
}

impl ExchangeClient {
    pub(crate) fn new(parts: ExchangeParts) -> Self {
        Self {
            inner: Arc::new(ExchangeInner {
                parts,
                referral_sent: AtomicBool::new(false),
            }),
        }
    }

    fn parts(&self) -> &ExchangeParts {
        &self.inner.parts
    }

    /// Address whose positions and L1 allowance this client acts on.
    pub fn account_address(&self) -> &str {
        &self.parts().account_address
    }

    pub fn signer_address(&self) -> Address {
        self.parts().signer.address()
    }

    pub fn info(&self) -> &InfoClient {
        &self.parts().info
    }

    pub fn symbols(&self) -> &Arc<SymbolResolver> {
        &self.parts().symbols
    }

    pub fn default_slippage(&self) -> Decimal {
        self.parts().default_slippage
    }

    /// Create a fluent order builder for `symbol`.
    pub fn order(&self, symbol: impl Into<String>) -> OrderBuilder<'_, OrderStateInit> {
        OrderBuilder::new(self, symbol)
    }

    pub async fn place_order(&self, request: impl Into<PlaceOrderRequest>) -> Result<Submission> {
        let request = request.into();
        let mut assets = AssetCache::new(self);
        let mut mids = None;
        let mut orders = Vec::with_capacity(request.orders.len());
        for order in &request.orders {
            let asset = assets.get(&order.symbol).await?;
            let limit_px = match order.limit_px {
                Some(px) => px,
                None => self.mid_price_for(order, asset, &mut mids).await?,
            };
            orders.push(order.to_wire(asset, limit_px)?);
        }

        let action = Action::Order(BulkOrder {
            orders,
            grouping: request.grouping,
            builder: request.builder,
        });
        let vault = request.vault_address.or(self.parts().vault);
        self.submit(action, vault).await
    }

    pub async fn cancel_order(&self, request: CancelRequest) -> Result<Submission> {
        self.cancel_orders(vec![request]).await
    }

    pub async fn cancel_orders(&self, requests: Vec<CancelRequest>) -> Result<Submission> {
        let mut assets = AssetCache::new(self);
        let mut cancels = Vec::with_capacity(requests.len());
        for request in requests {
            cancels.push(CancelWire {
                asset: assets.get(&request.symbol).await?,
                oid: request.oid,
            });
        }
        self.submit(Action::Cancel(BulkCancel { cancels }), self.parts().vault)
            .await
    }

    pub async fn cancel_by_cloid(&self, symbol: &str, cloid: Cloid) -> Result<Submission> {
        let asset = self.resolve(symbol).await?;
        let action = Action::CancelByCloid(BulkCancelByCloid {
            cancels: vec![CancelByCloidWire { asset, cloid }],
        });
        self.submit(action, self.parts().vault).await
    }

    /// Replace a resting order. Issued unbatched, so it weighs 1.
    pub async fn modify_order(&self, request: ModifyRequest) -> Result<Submission> {
        let mut assets = AssetCache::new(self);
        let mut mids = None;
        let modify = self.modify_wire(&request, &mut assets, &mut mids).await?;
        self.submit(Action::Modify(modify), self.parts().vault)
            .await
    }

    pub async fn batch_modify_orders(&self, requests: Vec<ModifyRequest>) -> Result<Submission> {
        let mut assets = AssetCache::new(self);
        let mut mids = None;
        let mut modifies = Vec::with_capacity(requests.len());
        for request in &requests {
            modifies.push(self.modify_wire(request, &mut assets, &mut mids).await?);
        }
        self.submit(
            Action::BatchModify(BulkModify { modifies }),
            self.parts().vault,
        )
        .await
    }

    pub async fn update_leverage(
        &self,
        symbol: &str,
        mode: LeverageMode,
        leverage: u32,
    ) -> Result<Submission> {
        let asset = self.resolve(symbol).await?;
        let action = Action::UpdateLeverage(UpdateLeverage {
            asset,
            is_cross: mode.is_cross(),
            leverage,
        });
        self.submit(action, self.parts().vault).await
    }

    /// Add (`ntli > 0`) or remove margin, in micro-USDC, on an isolated position.
    pub async fn update_isolated_margin(
        &self,
        symbol: &str,
        is_buy: bool,
        ntli: i64,
    ) -> Result<Submission> {
        let asset = self.resolve(symbol).await?;
        let action = Action::UpdateIsolatedMargin(UpdateIsolatedMargin {
            asset,
            is_buy,
            ntli,
        });
        self.submit(action, self.parts().vault).await
    }

    pub async fn usd_transfer(&self, destination: &str, amount: Decimal) -> Result<Submission> {
        let network = self.parts().signer.network();
        let action = Action::UsdSend(UsdSend {
            hyperliquid_chain: network.chain_name().to_string(),
            signature_chain_id: signature_chain_id(),
            destination: destination.to_string(),
            amount: decimal_to_wire("amount", amount)?,
            time: 0,
        });
        self.submit(action, None).await
    }

    /// `token` is `NAME:0x<token id>` as listed in the spot token table.
    pub async fn spot_transfer(
        &self,
        destination: &str,
        token: &str,
        amount: Decimal,
    ) -> Result<Submission> {
        let network = self.parts().signer.network();
        let action = Action::SpotSend(SpotSend {
            hyperliquid_chain: network.chain_name().to_string(),
            signature_chain_id: signature_chain_id(),
            destination: destination.to_string(),
            token: token.to_string(),
            amount: decimal_to_wire("amount", amount)?,
            time: 0,
        });
        self.submit(action, None).await
    }

    /// Withdraw USDC through the bridge.
    pub async fn withdraw(&self, destination: &str, amount: Decimal) -> Result<Submission> {
        let network = self.parts().signer.network();
        let action = Action::Withdraw3(Withdraw3 {
            hyperliquid_chain: network.chain_name().to_string(),
            signature_chain_id: signature_chain_id(),
            destination: destination.to_string(),
            amount: decimal_to_wire("amount", amount)?,
            time: 0,
        });
        self.submit(action, None).await
    }

    /// Move USDC between the spot and perp balances.
    pub async fn transfer_between_spot_and_perp(
        &self,
        amount: Decimal,
        to_perp: bool,
    ) -> Result<Submission> {
        let micros = (amount * Decimal::from(1_000_000)).normalize();
        let usdc = if micros.is_sign_negative() || micros.scale() > 0 {
            None
        } else {
            micros.to_u64()
        }
        .ok_or_else(|| {
            Error::InvalidOrder(format!(
                "usdc amount {amount} must be non-negative with at most 6 decimals"
            ))
        })?;
        let action = Action::SpotUser(SpotUser {
            class_transfer: ClassTransfer { usdc, to_perp },
        });
        self.submit(action, None).await
    }

    /// Arm (or with `None`, clear) the dead man's switch that cancels every
    /// open order at `at`.
    pub async fn schedule_cancel(&self, at: Option<Expiry>) -> Result<Submission> {
        let action = Action::ScheduleCancel(ScheduleCancel {
            time: at.map(Expiry::into_unix_millis),
        });
        self.submit(action, self.parts().vault).await
    }

    /// Deposit into or withdraw from a vault. `usd` is in micro-USDC.
    pub async fn vault_transfer(
        &self,
        vault: Address,
        is_deposit: bool,
        usd: u64,
    ) -> Result<Submission> {
        let action = Action::VaultTransfer(VaultTransfer {
            vault_address: hex::encode_prefixed(vault),
            is_deposit,
            usd,
        });
        self.submit(action, None).await
    }

    pub async fn set_referrer(&self, code: &str) -> Result<Submission> {
        let action = Action::SetReferrer(SetReferrer {
            code: code.to_string(),
        });
        self.submit(action, None).await
    }

    pub(crate) async fn resolve(&self, symbol: &str) -> Result<AssetIndex> {
        let asset = self.parts().symbols.resolve(symbol).await?;
        self.announce_referral();
        Ok(asset)
    }

    /// Gate, sign and dispatch one action.
    async fn submit(&self, mut action: Action, vault: Option<Address>) -> Result<Submission> {
        let parts = self.parts();
        parts
            .l1_limiter
            .check_and_consume(&parts.account_address, action.is_cancel(), action.batch_len())
            .await;

        let nonce = parts.nonces.next_nonce();
        action.stamp_nonce(nonce);
        let signature = {
            let _timer = timings::stage("sign");
            parts.signer.sign(&action, vault, nonce)?
        };

        let payload = ExchangePayload {
            action,
            nonce,
            signature,
            vault_address: vault.map(hex::encode_prefixed),
        };
        let body = serde_json::to_value(&payload)?;
        let kind = payload.action.kind();
        debug!(action = kind, nonce = nonce.into_inner(), "submitting action");

        let reply = parts.dispatcher.dispatch(Endpoint::Exchange, &body).await?;
        let response: ExchangeResponse = serde_json::from_value(reply)?;
        if let ExchangeResponse::Err(reason) = &response {
            warn!(action = kind, %reason, "exchange rejected action");
        }
        Ok(Submission::new(payload, response))
    }

    // Fire-and-forget; a failed announcement is only logged.
    fn announce_referral(&self) {
        let Some(code) = self.parts().referral_code.clone() else {
            return;
        };
        if self.inner.referral_sent.swap(true, Ordering::AcqRel) {
            return;
        }
        let client = self.clone();
        tokio::spawn(async move {
            if let Err(err) = client.set_referrer(&code).await {
                debug!(error = %err, "setting referrer failed");
            }
        });
    }

    async fn modify_wire(
        &self,
        request: &ModifyRequest,
        assets: &mut AssetCache<'_>,
        mids: &mut Option<HashMap<String, String>>,
    ) -> Result<ModifyWire> {
        let asset = assets.get(&request.order.symbol).await?;
        let limit_px = match request.order.limit_px {
            Some(px) => px,
            None => self.mid_price_for(&request.order, asset, mids).await?,
        };
        Ok(ModifyWire {
            oid: request.oid,
            order: request.order.to_wire(asset, limit_px)?,
        })
    }

    /// Limit price for an order submitted without one: mid +/- default slippage.
    /// Mids are fetched at most once per call.
    async fn mid_price_for(
        &self,
        order: &OrderRequest,
        asset: AssetIndex,
        mids: &mut Option<HashMap<String, String>>,
    ) -> Result<Decimal> {
        let mid = self.mid_price(&order.symbol, mids).await?;
        Ok(price_with_slippage(
            mid,
            self.default_slippage(),
            order.side,
            asset.is_spot(),
        ))
    }

    pub(crate) async fn mid_price(
        &self,
        symbol: &str,
        mids: &mut Option<HashMap<String, String>>,
    ) -> Result<Decimal> {
        let coin = self.parts().symbols.to_exchange_name(symbol).await?;
        if mids.is_none() {
            *mids = Some(self.parts().info.all_mids().await?);
        }
        let raw = mids
            .as_ref()
            .and_then(|mids| mids.get(&coin))
            .ok_or_else(|| Error::NoMatch(format!("no mid price for {symbol}")))?;
        parse_decimal("mid price", raw)
    }
}

fn signature_chain_id() -> String {
    format!("{SIGNATURE_CHAIN_ID:#x}")
}

/// Resolves each symbol at most once for the lifetime of one call.
pub(crate) struct AssetCache<'a> {
    client: &'a ExchangeClient,
    resolved: HashMap<String, AssetIndex>,
}

impl<'a> AssetCache<'a> {
    pub(crate) fn new(client: &'a ExchangeClient) -> Self {
        Self {
            client,
            resolved: HashMap::new(),
        }
    }

    pub(crate) async fn get(&mut self, symbol: &str) -> Result<AssetIndex> {
        if let Some(asset) = self.resolved.get(symbol) {
            return Ok(*asset);
        }
        let asset = self.client.resolve(symbol).await?;
        self.resolved.insert(symbol.to_string(), asset);
        Ok(asset)
    }
}
