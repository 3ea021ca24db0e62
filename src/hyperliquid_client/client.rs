use std::sync::Arc;

use alloy::primitives::{hex, Address};
use tracing::{debug, warn};

use super::{
    custom::CustomOperations,
    errors::{Error, Result},
    exchange::{ExchangeClient, ExchangeParts},
};
use crate::{
    config::ClientConfig,
    info::{InfoClient, InfoVolumeSource},
    nonce_manager::{ClockNonceManager, NonceManager},
    rate_limit::{AddressRateLimiter, FixedVolume, GlobalRateLimiter, LimiterStats, VolumeSource},
    signer::ActionSigner,
    symbols::{MetadataSource, SymbolResolver},
    transport::{Dispatcher, HttpTransport, Transport},
    types::Network,
};

/// Top level client. Queries are always available; privileged operations are
/// reached through [`exchange`](Self::exchange) and [`custom`](Self::custom),
/// which fail with [`Error::Authentication`] unless a valid key was supplied.
pub struct HyperliquidClient {
    config: ClientConfig,
    dispatcher: Dispatcher,
    info: InfoClient,
    symbols: Arc<SymbolResolver>,
    exchange: Option<ExchangeClient>,
}

impl HyperliquidClient {
    /// Create a new builder used to configure a [`HyperliquidClient`].
    pub fn builder() -> HyperliquidClientBuilder {
        HyperliquidClientBuilder::new(ClientConfig::default())
    }

    /// Read-only client with default settings for `network`.
    pub fn new(network: Network) -> Result<Self> {
        Self::builder()
            .testnet(!network.is_mainnet())
            .build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn network(&self) -> Network {
        self.config.network()
    }

    pub fn info(&self) -> &InfoClient {
        &self.info
    }

    pub fn symbols(&self) -> &Arc<SymbolResolver> {
        &self.symbols
    }

    pub fn is_authenticated(&self) -> bool {
        self.exchange.is_some()
    }

    /// Signed trading and transfer operations.
    pub fn exchange(&self) -> Result<&ExchangeClient> {
        self.exchange.as_ref().ok_or(Error::Authentication)
    }

    /// Market-style conveniences built on [`exchange`](Self::exchange).
    pub fn custom(&self) -> Result<CustomOperations> {
        self.exchange().cloned().map(CustomOperations::new)
    }

    /// Counters of the shared weighted limiter.
    pub async fn limiter_stats(&self) -> LimiterStats {
        self.dispatcher.limiter().stats().await
    }
}

/// Builder returned by [`HyperliquidClient::builder`].
pub struct HyperliquidClientBuilder {
    config: ClientConfig,
    private_key: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    metadata: Option<Arc<dyn MetadataSource>>,
    volume: Option<Arc<dyn VolumeSource>>,
    live_volume: bool,
    nonces: Option<Arc<dyn NonceManager>>,
}

impl HyperliquidClientBuilder {
    fn new(config: ClientConfig) -> Self {
        Self {
            config,
            private_key: None,
            transport: None,
            metadata: None,
            volume: None,
            live_volume: false,
            nonces: None,
        }
    }

    /// Replace every setting with `config`.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn testnet(mut self, testnet: bool) -> Self {
        self.config.testnet = testnet;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn private_key(mut self, private_key: impl Into<String>) -> Self {
        self.private_key = Some(private_key.into());
        self
    }

    /// Act on this address instead of the signer's (e.g. an agent wallet).
    pub fn wallet_address(mut self, address: impl Into<String>) -> Self {
        self.config.wallet_address = Some(address.into());
        self
    }

    pub fn vault_address(mut self, address: impl Into<String>) -> Self {
        self.config.vault_address = Some(address.into());
        self
    }

    pub fn referral_code(mut self, code: impl Into<String>) -> Self {
        self.config.referral_code = Some(code.into());
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn metadata_source(mut self, source: Arc<dyn MetadataSource>) -> Self {
        self.metadata = Some(source);
        self
    }

    pub fn volume_source(mut self, source: Arc<dyn VolumeSource>) -> Self {
        self.volume = Some(source);
        self
    }

    /// Read traded volume from the `userRateLimit` query instead of the
    /// configured fixed figure.
    pub fn live_volume(mut self) -> Self {
        self.live_volume = true;
        self
    }

    pub fn nonce_manager(mut self, nonces: Arc<dyn NonceManager>) -> Self {
        self.nonces = Some(nonces);
        self
    }

    pub fn build(self) -> Result<HyperliquidClient> {
        let config = self.config;
        config.validate().map_err(|err| Error::InvalidConfig {
            field: "config",
            why: format!("{err:#}"),
        })?;
        let vault = config
            .vault_address
            .as_deref()
            .map(|raw| {
                raw.parse::<Address>().map_err(|err| Error::InvalidConfig {
                    field: "vault_address",
                    why: err.to_string(),
                })
            })
            .transpose()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(
                config.base_url(),
                config.request_timeout(),
            )?),
        };
        let limiter = GlobalRateLimiter::new(config.global_limit.clone());
        let dispatcher = Dispatcher::new(transport, limiter);
        let info = InfoClient::new(dispatcher.clone());

        let metadata = self
            .metadata
            .unwrap_or_else(|| Arc::new(info.clone()) as Arc<dyn MetadataSource>);
        let symbols = Arc::new(SymbolResolver::new(
            metadata,
            config.symbol_refresh_interval(),
        ));

        let signer = match self.private_key.as_deref() {
            Some(key) => match ActionSigner::from_private_key(key, config.network()) {
                Ok(signer) => Some(signer),
                Err(err) => {
                    warn!(error = %err, "private key rejected, privileged operations disabled");
                    None
                }
            },
            None => {
                debug!("no private key supplied, client is read-only");
                None
            }
        };

        let exchange = signer.map(|signer| {
            let account_address = config
                .wallet_address
                .clone()
                .unwrap_or_else(|| hex::encode_prefixed(signer.address()));
            let volume = match (self.volume.clone(), self.live_volume) {
                (Some(volume), _) => volume,
                (None, true) => Arc::new(InfoVolumeSource::new(info.clone())),
                (None, false) => Arc::new(FixedVolume(config.l1_limit.fixed_volume)),
            };
            let nonces = self
                .nonces
                .clone()
                .unwrap_or_else(|| Arc::new(ClockNonceManager::new()));
            ExchangeClient::new(ExchangeParts {
                signer,
                dispatcher: dispatcher.clone(),
                info: info.clone(),
                symbols: Arc::clone(&symbols),
                l1_limiter: AddressRateLimiter::new(config.l1_limit.clone(), volume),
                nonces,
                account_address,
                vault,
                referral_code: config.referral_code.clone(),
                default_slippage: config.default_slippage,
            })
        });

        Ok(HyperliquidClient {
            config,
            dispatcher,
            info,
            symbols,
            exchange,
        })
    }
}
