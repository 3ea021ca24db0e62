pub mod actions;
pub mod config;
pub mod errors;
pub mod hyperliquid_client;
pub mod info;
pub mod models;
pub mod nonce_manager;
pub mod rate_limit;
pub mod signer;
pub mod symbols;
pub(crate) mod timings;
pub mod trading_helpers;
pub mod transport;
pub mod types;

pub use actions::{Action, BuilderInfo, Grouping, Tif, Tpsl};
pub use config::ClientConfig;
pub use hyperliquid_client::{
    CancelRequest, CustomOperations, Error as HyperliquidError, ExchangeClient, ExchangeResponse,
    HyperliquidClient, HyperliquidClientBuilder, LeverageMode, ModifyRequest, OrderBuilder,
    OrderKind, OrderRequest, OrderStateInit, PlaceOrderRequest, Result as HyperliquidResult,
    Submission,
};
pub use info::{InfoClient, InfoRequest, InfoVolumeSource};
pub use rate_limit::{AddressRateLimiter, FixedVolume, GlobalRateLimiter, VolumeSource};
pub use signer::{ActionSigner, WireSignature};
pub use symbols::{AssetList, MetadataSource, SymbolResolver, Universe};
pub use transport::{Endpoint, HttpTransport, Transport};
pub use types::{AssetIndex, Cloid, Expiry, Network, Nonce, OrderId, Side};
