//! Typed queries against the info endpoint.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    errors::TransportResult,
    models::{
        AllMids, ClearinghouseState, L2Book, Meta, OpenOrder, SpotClearinghouseState, SpotMeta,
        UserFill, UserRateLimit,
    },
    rate_limit::VolumeSource,
    symbols::{MetadataSource, Universe},
    transport::{Dispatcher, Endpoint},
    types::OrderId,
};

/// Request bodies accepted by the info endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InfoRequest {
    Meta,
    SpotMeta,
    AllMids,
    ClearinghouseState { user: String },
    SpotClearinghouseState { user: String },
    OpenOrders { user: String },
    OrderStatus { user: String, oid: OrderId },
    L2Book { coin: String },
    UserRateLimit { user: String },
    UserFills { user: String },
}

/// Read-only client; every query pays its weight to the shared limiter.
#[derive(Clone)]
pub struct InfoClient {
    dispatcher: Dispatcher,
}

impl InfoClient {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub async fn request<T: DeserializeOwned>(&self, request: &InfoRequest) -> TransportResult<T> {
        let payload = serde_json::to_value(request)?;
        let response = self.dispatcher.dispatch(Endpoint::Info, &payload).await?;
        Ok(serde_json::from_value(response)?)
    }

    pub async fn meta(&self) -> TransportResult<Meta> {
        self.request(&InfoRequest::Meta).await
    }

    pub async fn spot_meta(&self) -> TransportResult<SpotMeta> {
        self.request(&InfoRequest::SpotMeta).await
    }

    pub async fn all_mids(&self) -> TransportResult<AllMids> {
        self.request(&InfoRequest::AllMids).await
    }

    pub async fn clearinghouse_state(&self, user: &str) -> TransportResult<ClearinghouseState> {
        self.request(&InfoRequest::ClearinghouseState { user: user.into() })
            .await
    }

    pub async fn spot_clearinghouse_state(
        &self,
        user: &str,
    ) -> TransportResult<SpotClearinghouseState> {
        self.request(&InfoRequest::SpotClearinghouseState { user: user.into() })
            .await
    }

    pub async fn open_orders(&self, user: &str) -> TransportResult<Vec<OpenOrder>> {
        self.request(&InfoRequest::OpenOrders { user: user.into() })
            .await
    }

    /// Raw status payload; its shape varies with the order's lifecycle.
    pub async fn order_status(&self, user: &str, oid: OrderId) -> TransportResult<Value> {
        self.request(&InfoRequest::OrderStatus {
            user: user.into(),
            oid,
        })
        .await
    }

    pub async fn l2_book(&self, coin: &str) -> TransportResult<L2Book> {
        self.request(&InfoRequest::L2Book { coin: coin.into() })
            .await
    }

    pub async fn user_rate_limit(&self, user: &str) -> TransportResult<UserRateLimit> {
        self.request(&InfoRequest::UserRateLimit { user: user.into() })
            .await
    }

    pub async fn user_fills(&self, user: &str) -> TransportResult<Vec<UserFill>> {
        self.request(&InfoRequest::UserFills { user: user.into() })
            .await
    }
}

#[async_trait]
impl MetadataSource for InfoClient {
    async fn fetch_universe(&self) -> TransportResult<Universe> {
        let (meta, spot_meta) = tokio::try_join!(self.meta(), self.spot_meta())?;
        Ok(Universe { meta, spot_meta })
    }
}

/// Reads an address's cumulative volume from the `userRateLimit` query.
#[derive(Clone)]
pub struct InfoVolumeSource {
    info: InfoClient,
}

impl InfoVolumeSource {
    pub fn new(info: InfoClient) -> Self {
        Self { info }
    }
}

#[async_trait]
impl VolumeSource for InfoVolumeSource {
    async fn traded_volume(&self, address: &str) -> TransportResult<f64> {
        let limits = self.info.user_rate_limit(address).await?;
        Ok(limits.cum_vlm.parse::<f64>().unwrap_or_else(|_| {
            tracing::warn!(%address, cum_vlm = %limits.cum_vlm, "unparseable volume, assuming none");
            0.0
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;
    use crate::{
        config::GlobalLimitConfig, rate_limit::GlobalRateLimiter, transport::Transport,
    };

    struct CannedTransport {
        responses: Mutex<Vec<Value>>,
        seen: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl Transport for CannedTransport {
        async fn send(&self, endpoint: Endpoint, payload: &Value) -> TransportResult<Value> {
            assert_eq!(endpoint, Endpoint::Info);
            self.seen.lock().unwrap().push(payload.clone());
            Ok(self.responses.lock().unwrap().remove(0))
        }
    }

    fn client(responses: Vec<Value>) -> (InfoClient, Arc<CannedTransport>) {
        let transport = Arc::new(CannedTransport {
            responses: Mutex::new(responses),
            seen: Mutex::new(Vec::new()),
        });
        let limiter = GlobalRateLimiter::new(GlobalLimitConfig::default());
        let dispatcher = Dispatcher::new(Arc::clone(&transport) as Arc<dyn Transport>, limiter);
        (InfoClient::new(dispatcher), transport)
    }

    #[test]
    fn requests_serialize_with_type_tag() {
        assert_eq!(
            serde_json::to_value(InfoRequest::AllMids).unwrap(),
            json!({ "type": "allMids" })
        );
        assert_eq!(
            serde_json::to_value(InfoRequest::L2Book { coin: "BTC".into() }).unwrap(),
            json!({ "type": "l2Book", "coin": "BTC" })
        );
        assert_eq!(
            serde_json::to_value(InfoRequest::OrderStatus {
                user: "0xabc".into(),
                oid: OrderId::new(7),
            })
            .unwrap(),
            json!({ "type": "orderStatus", "user": "0xabc", "oid": 7 })
        );
    }

    #[tokio::test]
    async fn query_weights_are_charged() {
        let (info, _) = client(vec![json!({ "BTC": "65000.5" }), json!([])]);
        let limiter = info.dispatcher.limiter().clone();

        let mids = info.all_mids().await.unwrap();
        assert_eq!(mids["BTC"], "65000.5");
        assert_eq!(limiter.stats().await.consumed, 2);

        info.user_fills("0xabc").await.unwrap();
        assert_eq!(limiter.stats().await.consumed, 22);
    }

    #[tokio::test]
    async fn volume_source_reads_cumulative_volume() {
        let (info, transport) = client(vec![json!({
            "cumVlm": "2854574.593578",
            "nRequestsUsed": 2890,
            "nRequestsCap": 2864574
        })]);
        let volume = InfoVolumeSource::new(info)
            .traded_volume("0xabc")
            .await
            .unwrap();
        assert!((volume - 2_854_574.593578).abs() < 1e-6);
        assert_eq!(
            transport.seen.lock().unwrap()[0],
            json!({ "type": "userRateLimit", "user": "0xabc" })
        );
    }
}
