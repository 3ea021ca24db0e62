use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::{
    errors::{TransportError, TransportResult},
    rate_limit::{weights::weight_for, GlobalRateLimiter},
    timings,
};

/// Endpoint category a payload is posted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Info,
    Exchange,
    Explorer,
}

impl Endpoint {
    pub const fn path(self) -> &'static str {
        match self {
            Endpoint::Info => "info",
            Endpoint::Exchange => "exchange",
            Endpoint::Explorer => "explorer",
        }
    }
}

/// Network round-trip collaborator.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, endpoint: Endpoint, payload: &Value) -> TransportResult<Value>;
}

/// JSON-over-HTTPS transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> TransportResult<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, endpoint: Endpoint, payload: &Value) -> TransportResult<Value> {
        let url = self.base_url.join(endpoint.path())?;
        let response = self.client.post(url).json(payload).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TransportError::with_http_status(status, &body));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// Couples a transport with the shared weighted limiter so every payload pays
/// its weight before it leaves the process.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    limiter: GlobalRateLimiter,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, limiter: GlobalRateLimiter) -> Self {
        Self { transport, limiter }
    }

    pub fn limiter(&self) -> &GlobalRateLimiter {
        &self.limiter
    }

    pub async fn dispatch(&self, endpoint: Endpoint, payload: &Value) -> TransportResult<Value> {
        let weight = weight_for(endpoint, payload);
        self.limiter.consume(weight).await;
        debug!(endpoint = endpoint.path(), weight, "dispatching payload");
        timings::time_async_block(endpoint.path(), self.transport.send(endpoint, payload)).await
    }
}
