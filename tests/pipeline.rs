use std::sync::{Arc, Mutex};

use alloy::primitives::Address;
use async_trait::async_trait;
use hyperliquid_client::{
    errors::TransportResult, nonce_manager::NonceManager, AssetIndex, CancelRequest,
    ClientConfig, Cloid, Endpoint, Expiry, FixedVolume, HyperliquidClient,
    HyperliquidClientBuilder, HyperliquidError, LeverageMode, ModifyRequest, Nonce, OrderId,
    OrderRequest, PlaceOrderRequest, Side, Transport,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tokio::time::Instant;

const TEST_KEY: &str = "e908f86dbb4d55ac876378565aafeabc187f6690f046459397b17d9b9a19688e";
const WALLET: &str = "0x00000000000000000000000000000000000000aa";

/// Answers info queries from fixed fixtures and records every payload.
struct MockExchange {
    positions: Value,
    open_orders: Value,
    sent: Mutex<Vec<(Endpoint, Value, Instant)>>,
}

impl MockExchange {
    fn new(positions: Value, open_orders: Value) -> Arc<Self> {
        Arc::new(Self {
            positions,
            open_orders,
            sent: Mutex::new(Vec::new()),
        })
    }

    fn actions(&self) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(endpoint, _, _)| *endpoint == Endpoint::Exchange)
            .map(|(_, payload, _)| payload.clone())
            .collect()
    }

    fn exchange_sends(&self) -> Vec<(Value, Instant)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(endpoint, _, _)| *endpoint == Endpoint::Exchange)
            .map(|(_, payload, at)| (payload.clone(), *at))
            .collect()
    }

    fn actions_of(&self, kind: &str) -> Vec<Value> {
        self.actions()
            .into_iter()
            .filter(|payload| payload["action"]["type"] == kind)
            .collect()
    }
}

#[async_trait]
impl Transport for MockExchange {
    async fn send(&self, endpoint: Endpoint, payload: &Value) -> TransportResult<Value> {
        self.sent
            .lock()
            .unwrap()
            .push((endpoint, payload.clone(), Instant::now()));
        if endpoint == Endpoint::Exchange {
            return Ok(json!({
                "status": "ok",
                "response": { "type": payload["action"]["type"], "data": { "statuses": ["success"] } }
            }));
        }
        let response = match payload["type"].as_str() {
            Some("meta") => json!({
                "universe": [
                    { "name": "BTC", "szDecimals": 5 },
                    { "name": "ETH", "szDecimals": 4 }
                ]
            }),
            Some("spotMeta") => json!({
                "universe": [
                    { "name": "PURR/USDC", "tokens": [1, 0], "index": 0, "isCanonical": true }
                ],
                "tokens": [
                    { "name": "USDC", "index": 0, "szDecimals": 8, "weiDecimals": 8 },
                    { "name": "PURR", "index": 1, "szDecimals": 0, "weiDecimals": 5 }
                ]
            }),
            Some("allMids") => json!({ "BTC": "65000.5", "ETH": "3120.25", "PURR/USDC": "0.21" }),
            Some("clearinghouseState") => self.positions.clone(),
            Some("openOrders") => self.open_orders.clone(),
            other => panic!("unexpected info query {other:?}"),
        };
        Ok(response)
    }
}

fn position(coin: &str, szi: &str) -> Value {
    json!({ "type": "oneWay", "position": { "coin": coin, "szi": szi, "entryPx": "1.0" } })
}

fn flat_account() -> Arc<MockExchange> {
    MockExchange::new(json!({ "assetPositions": [] }), json!([]))
}

fn builder(mock: &Arc<MockExchange>) -> HyperliquidClientBuilder {
    HyperliquidClient::builder()
        .transport(Arc::clone(mock) as Arc<dyn Transport>)
        .wallet_address(WALLET)
}

fn authenticated(mock: &Arc<MockExchange>) -> HyperliquidClient {
    builder(mock).private_key(TEST_KEY).build().unwrap()
}

#[tokio::test]
async fn privileged_calls_need_a_key() {
    let mock = flat_account();
    let client = builder(&mock).build().unwrap();
    assert!(matches!(client.exchange(), Err(HyperliquidError::Authentication)));
    assert!(matches!(client.custom(), Err(HyperliquidError::Authentication)));
    assert!(mock.actions().is_empty());

    let client = authenticated(&mock);
    let submission = client
        .exchange()
        .unwrap()
        .place_order(OrderRequest::limit("ETH-PERP", Side::Buy, dec!(1), dec!(3000)))
        .await
        .unwrap();
    assert!(submission.response().is_ok());
    assert_eq!(mock.actions_of("order").len(), 1);
}

#[tokio::test]
async fn close_all_with_no_positions_is_empty() {
    let mock = flat_account();
    let client = authenticated(&mock);
    let closed = client
        .custom()
        .unwrap()
        .close_all_positions(None)
        .await
        .unwrap();
    assert!(closed.is_empty());
    assert!(mock.actions().is_empty());
}

#[tokio::test]
async fn close_all_closes_each_position_once() {
    let mock = MockExchange::new(
        json!({ "assetPositions": [
            position("BTC", "0.5"),
            position("ETH", "-2.0"),
            position("PURR/USDC", "0.0")
        ] }),
        json!([]),
    );
    let client = authenticated(&mock);
    let closed = client
        .custom()
        .unwrap()
        .close_all_positions(Some(dec!(0.01)))
        .await
        .unwrap();
    assert_eq!(closed.len(), 2);

    let mut orders: Vec<Value> = mock
        .actions_of("order")
        .into_iter()
        .map(|payload| payload["action"]["orders"][0].clone())
        .collect();
    orders.sort_by_key(|order| order["a"].as_u64());
    assert_eq!(orders.len(), 2);

    assert_eq!(orders[0]["a"], 0);
    assert_eq!(orders[0]["b"], false);
    assert_eq!(orders[0]["s"], "0.5");
    assert_eq!(orders[0]["p"], "64350");
    assert_eq!(orders[0]["r"], true);
    assert_eq!(orders[0]["t"], json!({ "limit": { "tif": "Ioc" } }));

    assert_eq!(orders[1]["a"], 1);
    assert_eq!(orders[1]["b"], true);
    assert_eq!(orders[1]["s"], "2");
    assert_eq!(orders[1]["p"], "3151.5");
}

#[tokio::test]
async fn market_close_without_position_is_no_match() {
    let mock = MockExchange::new(json!({ "assetPositions": [position("BTC", "0.5")] }), json!([]));
    let client = authenticated(&mock);
    let custom = client.custom().unwrap();

    assert!(matches!(
        custom.market_close("ETH-PERP", None, None, None, None).await,
        Err(HyperliquidError::NoMatch(_))
    ));
    assert!(matches!(
        custom.market_close("DOGE-PERP", None, None, None, None).await,
        Err(HyperliquidError::UnknownAsset(_))
    ));
    assert!(mock.actions().is_empty());
}

#[tokio::test]
async fn cancel_all_filters_by_symbol() {
    let mock = MockExchange::new(
        json!({ "assetPositions": [] }),
        json!([
            { "coin": "BTC", "oid": 11, "side": "B", "limitPx": "60000", "sz": "0.1", "timestamp": 1 },
            { "coin": "ETH", "oid": 12, "side": "A", "limitPx": "4000", "sz": "1", "timestamp": 2 },
            { "coin": "BTC", "oid": 13, "side": "A", "limitPx": "70000", "sz": "0.1", "timestamp": 3 }
        ]),
    );
    let client = authenticated(&mock);
    let custom = client.custom().unwrap();

    assert!(custom
        .cancel_all_orders(Some("PURR-SPOT"))
        .await
        .unwrap()
        .is_none());

    let submission = custom.cancel_all_orders(Some("BTC-PERP")).await.unwrap();
    assert!(submission.is_some());
    let cancels = mock.actions_of("cancel");
    assert_eq!(
        cancels[0]["action"]["cancels"],
        json!([{ "a": 0, "o": 11 }, { "a": 0, "o": 13 }])
    );
}

#[tokio::test]
async fn wire_orders_carry_the_resolved_index() {
    let mock = flat_account();
    let client = authenticated(&mock);
    let symbols = client.symbols();

    let index = symbols.resolve("PURR-SPOT").await.unwrap();
    assert_eq!(index, AssetIndex::new(10_000));
    assert_eq!(symbols.symbol_for_index(index).await.unwrap(), "PURR-SPOT");

    client
        .exchange()
        .unwrap()
        .place_order(OrderRequest::limit("PURR-SPOT", Side::Sell, dec!(100), dec!(0.25)))
        .await
        .unwrap();
    let order = &mock.actions_of("order")[0]["action"]["orders"][0];
    assert_eq!(order["a"], json!(index.into_inner()));
    assert_eq!(symbols.resolve("PURR-SPOT").await.unwrap(), index);
}

#[tokio::test]
async fn large_batches_pay_batch_weight() {
    let mock = flat_account();
    let client = authenticated(&mock);
    client.symbols().resolve("BTC-PERP").await.unwrap();
    let before = client.limiter_stats().await.consumed;

    let orders = (0..45)
        .map(|i| {
            let price = dec!(50000) + Decimal::from(i);
            OrderRequest::limit("BTC-PERP", Side::Buy, dec!(0.001), price)
        })
        .collect();
    client
        .exchange()
        .unwrap()
        .place_order(PlaceOrderRequest::new(orders))
        .await
        .unwrap();

    assert_eq!(client.limiter_stats().await.consumed - before, 2);
    let payload = &mock.actions_of("order")[0];
    assert_eq!(payload["action"]["orders"].as_array().unwrap().len(), 45);
}

#[tokio::test]
async fn transfers_are_stamped_with_their_nonce() {
    let mock = flat_account();
    let client = authenticated(&mock);
    client
        .exchange()
        .unwrap()
        .usd_transfer("0x0d1d9635d0640821d15e323ac8adadfa9c111414", dec!(12.50))
        .await
        .unwrap();

    let payload = &mock.actions_of("usdSend")[0];
    assert_eq!(payload["action"]["time"], payload["nonce"]);
    assert_eq!(payload["action"]["amount"], "12.5");
    assert_eq!(payload["action"]["hyperliquidChain"], "Mainnet");
    assert_eq!(payload["action"]["signatureChainId"], "0xa4b1");
    assert!(payload.get("vaultAddress").is_none());
}

#[tokio::test]
async fn orders_for_a_vault_carry_its_address() {
    let mock = flat_account();
    let client = builder(&mock)
        .private_key(TEST_KEY)
        .vault_address("0x1719884eb866cb12b2287399b15f7db5e7d775ea")
        .build()
        .unwrap();
    let exchange = client.exchange().unwrap();
    exchange
        .cancel_order(CancelRequest::new("ETH-PERP", 5u64))
        .await
        .unwrap();

    let payload = &mock.actions_of("cancel")[0];
    assert_eq!(
        payload["vaultAddress"],
        "0x1719884eb866cb12b2287399b15f7db5e7d775ea"
    );
}

#[tokio::test]
async fn referral_is_announced_once() {
    let mock = flat_account();
    let client = builder(&mock)
        .private_key(TEST_KEY)
        .referral_code("FRIEND")
        .build()
        .unwrap();
    let exchange = client.exchange().unwrap();
    for oid in [1u64, 2, 3] {
        exchange
            .cancel_order(CancelRequest::new("BTC-PERP", oid))
            .await
            .unwrap();
    }
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let referrals = mock.actions_of("setReferrer");
    assert_eq!(referrals.len(), 1);
    assert_eq!(referrals[0]["action"]["code"], "FRIEND");
}

#[tokio::test]
async fn close_all_skips_coins_missing_from_metadata() {
    let mock = MockExchange::new(
        json!({ "assetPositions": [position("BTC", "0.5"), position("DOGE", "100")] }),
        json!([]),
    );
    let client = authenticated(&mock);
    let closed = client
        .custom()
        .unwrap()
        .close_all_positions(None)
        .await
        .unwrap();
    assert_eq!(closed.len(), 1);
    let orders = mock.actions_of("order");
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["action"]["orders"][0]["a"], 0);
}

async fn warmed(mock: &Arc<MockExchange>) -> HyperliquidClient {
    let client = authenticated(mock);
    client.symbols().resolve("BTC-PERP").await.unwrap();
    client
}

#[tokio::test]
async fn single_modify_weighs_one() {
    let mock = flat_account();
    let client = warmed(&mock).await;
    let before = client.limiter_stats().await.consumed;

    client
        .exchange()
        .unwrap()
        .modify_order(ModifyRequest {
            oid: OrderId::new(7),
            order: OrderRequest::limit("ETH-PERP", Side::Buy, dec!(1), dec!(3000.0)),
        })
        .await
        .unwrap();

    assert_eq!(client.limiter_stats().await.consumed - before, 1);
    let action = &mock.actions_of("modify")[0]["action"];
    assert_eq!(action["oid"], 7);
    assert_eq!(action["order"]["a"], 1);
    assert_eq!(action["order"]["p"], "3000");
    assert!(mock.actions_of("batchModify").is_empty());
}

#[tokio::test]
async fn batch_modify_pays_batch_weight() {
    let mock = flat_account();
    let client = warmed(&mock).await;
    let before = client.limiter_stats().await.consumed;

    let modifies = (0..40u64)
        .map(|oid| ModifyRequest {
            oid: OrderId::new(oid),
            order: OrderRequest::limit("BTC-PERP", Side::Sell, dec!(0.01), dec!(70000)),
        })
        .collect();
    client
        .exchange()
        .unwrap()
        .batch_modify_orders(modifies)
        .await
        .unwrap();

    assert_eq!(client.limiter_stats().await.consumed - before, 2);
    let action = &mock.actions_of("batchModify")[0]["action"];
    assert_eq!(action["modifies"].as_array().unwrap().len(), 40);
    assert_eq!(action["modifies"][39]["oid"], 39);
}

#[tokio::test]
async fn cancel_by_cloid_names_asset_and_cloid() {
    let mock = flat_account();
    let client = authenticated(&mock);
    let cloid: Cloid = "0x1e60610f0b3d420597c88c1fed2ad5ee".parse().unwrap();
    client
        .exchange()
        .unwrap()
        .cancel_by_cloid("ETH-PERP", cloid)
        .await
        .unwrap();

    let action = &mock.actions_of("cancelByCloid")[0]["action"];
    assert_eq!(
        action["cancels"],
        json!([{ "asset": 1, "cloid": "0x1e60610f0b3d420597c88c1fed2ad5ee" }])
    );
}

#[tokio::test]
async fn leverage_and_margin_updates_use_the_asset_index() {
    let mock = flat_account();
    let client = authenticated(&mock);
    let exchange = client.exchange().unwrap();
    exchange
        .update_leverage("ETH-PERP", LeverageMode::Isolated, 5)
        .await
        .unwrap();
    exchange
        .update_isolated_margin("BTC-PERP", true, 1_000_000)
        .await
        .unwrap();

    assert_eq!(
        mock.actions_of("updateLeverage")[0]["action"],
        json!({ "type": "updateLeverage", "asset": 1, "isCross": false, "leverage": 5 })
    );
    assert_eq!(
        mock.actions_of("updateIsolatedMargin")[0]["action"],
        json!({ "type": "updateIsolatedMargin", "asset": 0, "isBuy": true, "ntli": 1_000_000 })
    );
}

#[tokio::test]
async fn spot_transfers_and_withdrawals_are_user_signed() {
    let mock = flat_account();
    let client = authenticated(&mock);
    let exchange = client.exchange().unwrap();
    let destination = "0x0d1d9635d0640821d15e323ac8adadfa9c111414";
    exchange
        .spot_transfer(destination, "PURR:0xc1fb593aeffbeb02f85e0308e9956a90", dec!(2.50))
        .await
        .unwrap();
    exchange.withdraw(destination, dec!(10)).await.unwrap();

    let send = &mock.actions_of("spotSend")[0];
    assert_eq!(send["action"]["token"], "PURR:0xc1fb593aeffbeb02f85e0308e9956a90");
    assert_eq!(send["action"]["amount"], "2.5");
    assert_eq!(send["action"]["time"], send["nonce"]);
    assert_eq!(send["action"]["signatureChainId"], "0xa4b1");

    let withdraw = &mock.actions_of("withdraw3")[0];
    assert_eq!(withdraw["action"]["destination"], destination);
    assert_eq!(withdraw["action"]["amount"], "10");
    assert_eq!(withdraw["action"]["time"], withdraw["nonce"]);
    assert_eq!(withdraw["action"]["hyperliquidChain"], "Mainnet");
}

#[tokio::test]
async fn class_transfers_are_sent_in_micro_usdc() {
    let mock = flat_account();
    let client = authenticated(&mock);
    let exchange = client.exchange().unwrap();
    exchange
        .transfer_between_spot_and_perp(dec!(12.345678), true)
        .await
        .unwrap();
    assert_eq!(
        mock.actions_of("spotUser")[0]["action"]["classTransfer"],
        json!({ "usdc": 12_345_678u64, "toPerp": true })
    );

    for amount in [dec!(1.0000001), dec!(-1)] {
        assert!(matches!(
            exchange.transfer_between_spot_and_perp(amount, false).await,
            Err(HyperliquidError::InvalidOrder(_))
        ));
    }
    assert_eq!(mock.actions_of("spotUser").len(), 1);
}

#[tokio::test]
async fn schedule_cancel_sets_and_clears_the_deadline() {
    let mock = flat_account();
    let client = authenticated(&mock);
    let exchange = client.exchange().unwrap();
    exchange
        .schedule_cancel(Some(Expiry::unix_millis(1_700_000_000_123).unwrap()))
        .await
        .unwrap();
    exchange.schedule_cancel(None).await.unwrap();

    let actions = mock.actions_of("scheduleCancel");
    assert_eq!(
        actions[0]["action"],
        json!({ "type": "scheduleCancel", "time": 1_700_000_000_123u64 })
    );
    assert_eq!(actions[1]["action"], json!({ "type": "scheduleCancel" }));
}

#[tokio::test]
async fn vault_transfer_names_the_vault_in_the_action() {
    let mock = flat_account();
    let client = authenticated(&mock);
    let vault: Address = "0x1719884eb866cb12b2287399b15f7db5e7d775ea".parse().unwrap();
    client
        .exchange()
        .unwrap()
        .vault_transfer(vault, true, 5_000_000)
        .await
        .unwrap();

    let payload = &mock.actions_of("vaultTransfer")[0];
    assert_eq!(
        payload["action"],
        json!({
            "type": "vaultTransfer",
            "vaultAddress": "0x1719884eb866cb12b2287399b15f7db5e7d775ea",
            "isDeposit": true,
            "usd": 5_000_000u64
        })
    );
    assert!(payload.get("vaultAddress").is_none());
}

/// Nonces measured in milliseconds of (paused) tokio time.
struct ElapsedNonces {
    origin: Instant,
}

impl NonceManager for ElapsedNonces {
    fn next_nonce(&self) -> Nonce {
        Nonce::new(self.origin.elapsed().as_millis() as u64)
    }
}

#[tokio::test(start_paused = true)]
async fn l1_cooldown_is_served_before_the_nonce_is_taken() {
    let mock = flat_account();
    let origin = Instant::now();
    let mut config = ClientConfig::default();
    config.l1_limit.initial_buffer = 0.0;
    let client = HyperliquidClient::builder()
        .config(config)
        .transport(Arc::clone(&mock) as Arc<dyn Transport>)
        .wallet_address(WALLET)
        .private_key(TEST_KEY)
        .volume_source(Arc::new(FixedVolume(0.0)))
        .nonce_manager(Arc::new(ElapsedNonces { origin }))
        .build()
        .unwrap();
    let exchange = client.exchange().unwrap();
    for oid in [1u64, 2] {
        exchange
            .cancel_order(CancelRequest::new("BTC-PERP", oid))
            .await
            .unwrap();
    }

    let sent = mock.exchange_sends();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].0["nonce"], 0);
    let nonce = sent[1].0["nonce"].as_u64().unwrap();
    assert!(nonce >= 10_000, "nonce {nonce} taken before the cool-down ended");
    let dispatched_ms = (sent[1].1 - origin).as_millis() as u64;
    assert!(nonce <= dispatched_ms);
}
