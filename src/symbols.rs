//! Symbol to asset-index resolution over a periodically refreshed snapshot of
//! exchange metadata.
//!
//! External symbols carry a market suffix: `BTC-PERP` for perpetuals and
//! `PURR-SPOT` for spot markets (base token name). Exchange coin names (`BTC`,
//! `PURR/USDC`, `@107`) are accepted too, so responses can be fed straight
//! back in.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex, RwLock, Weak},
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    errors::TransportResult,
    hyperliquid_client::{Error, Result},
    models::{Meta, SpotMeta},
    types::AssetIndex,
};

const PERP_SUFFIX: &str = "-PERP";
const SPOT_SUFFIX: &str = "-SPOT";

/// Everything needed to build one symbol table.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    pub meta: Meta,
    pub spot_meta: SpotMeta,
}

/// Source of the current perp and spot universes.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch_universe(&self) -> TransportResult<Universe>;
}

/// External symbols grouped by market type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetList {
    pub perp: Vec<String>,
    pub spot: Vec<String>,
}

struct Entry {
    index: AssetIndex,
    coin: String,
}

/// Immutable snapshot built from one metadata fetch.
pub struct SymbolTable {
    by_symbol: HashMap<String, Entry>,
    coin_to_symbol: HashMap<String, String>,
    index_to_symbol: HashMap<AssetIndex, String>,
    assets: AssetList,
    fetched_at: Instant,
}

impl SymbolTable {
    pub fn build(universe: &Universe, fetched_at: Instant) -> Self {
        let mut table = Self {
            by_symbol: HashMap::new(),
            coin_to_symbol: HashMap::new(),
            index_to_symbol: HashMap::new(),
            assets: AssetList::default(),
            fetched_at,
        };

        for (position, asset) in universe.meta.universe.iter().enumerate() {
            let Ok(position) = u32::try_from(position) else {
                break;
            };
            let symbol = format!("{}{PERP_SUFFIX}", asset.name);
            table.insert(symbol, asset.name.clone(), AssetIndex::new(position));
        }

        for market in &universe.spot_meta.universe {
            let Some(base) = market
                .tokens
                .first()
                .and_then(|token| universe.spot_meta.token_name(*token))
            else {
                debug!(market = %market.name, "spot market without a known base token");
                continue;
            };
            let symbol = format!("{base}{SPOT_SUFFIX}");
            if table.by_symbol.contains_key(&symbol) {
                continue;
            }
            table.insert(symbol, market.name.clone(), AssetIndex::spot(market.index));
        }

        table
    }

    fn insert(&mut self, symbol: String, coin: String, index: AssetIndex) {
        if symbol.ends_with(PERP_SUFFIX) {
            self.assets.perp.push(symbol.clone());
        } else {
            self.assets.spot.push(symbol.clone());
        }
        self.coin_to_symbol.insert(coin.clone(), symbol.clone());
        self.index_to_symbol.insert(index, symbol.clone());
        self.by_symbol.insert(symbol, Entry { index, coin });
    }

    pub fn resolve(&self, symbol: &str) -> Option<AssetIndex> {
        self.entry(symbol).map(|entry| entry.index)
    }

    pub fn to_external(&self, coin: &str) -> Option<&str> {
        self.coin_to_symbol.get(coin).map(String::as_str)
    }

    pub fn to_exchange_name(&self, symbol: &str) -> Option<&str> {
        self.entry(symbol).map(|entry| entry.coin.as_str())
    }

    pub fn symbol_for_index(&self, index: AssetIndex) -> Option<&str> {
        self.index_to_symbol.get(&index).map(String::as_str)
    }

    pub fn assets(&self) -> &AssetList {
        &self.assets
    }

    fn entry(&self, symbol: &str) -> Option<&Entry> {
        self.by_symbol.get(symbol).or_else(|| {
            self.coin_to_symbol
                .get(symbol)
                .and_then(|external| self.by_symbol.get(external))
        })
    }
}

/// Shortest gap between two refresh attempts after one has failed.
const FAILED_REFRESH_BACKOFF: Duration = Duration::from_secs(5);

/// Caches the symbol table and refreshes it when it goes stale.
///
/// Readers clone an `Arc` to the current snapshot and never observe a partial
/// update. Only the very first fetch is awaited by callers; once a snapshot
/// exists, a stale one is served immediately while a single background task
/// fetches its replacement. A failed refresh keeps serving the previous
/// snapshot and is retried only after a short back-off.
pub struct SymbolResolver {
    state: Arc<ResolverState>,
}

struct ResolverState {
    source: Arc<dyn MetadataSource>,
    snapshot: RwLock<Option<Arc<SymbolTable>>>,
    refresh_lock: Arc<Mutex<()>>,
    last_failure: StdMutex<Option<Instant>>,
    refresh_interval: Duration,
}

impl ResolverState {
    fn current(&self) -> Option<Arc<SymbolTable>> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Stale and not inside the back-off window of a failed attempt.
    fn refresh_due(&self, table: &SymbolTable) -> bool {
        if table.fetched_at.elapsed() < self.refresh_interval {
            return false;
        }
        let last_failure = *self
            .last_failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let backoff = self.refresh_interval.min(FAILED_REFRESH_BACKOFF);
        last_failure.map_or(true, |failed_at| failed_at.elapsed() >= backoff)
    }

    /// Fetch and swap in a new snapshot. Caller holds `refresh_lock`.
    async fn fetch_and_swap(&self) -> TransportResult<Arc<SymbolTable>> {
        let fetched = self.source.fetch_universe().await;
        let mut last_failure = self
            .last_failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match fetched {
            Ok(universe) => {
                *last_failure = None;
                let table = Arc::new(SymbolTable::build(&universe, Instant::now()));
                info!(
                    perp = table.assets.perp.len(),
                    spot = table.assets.spot.len(),
                    "symbol table refreshed"
                );
                *self
                    .snapshot
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::clone(&table));
                Ok(table)
            }
            Err(err) => {
                *last_failure = Some(Instant::now());
                Err(err)
            }
        }
    }
}

impl SymbolResolver {
    pub fn new(source: Arc<dyn MetadataSource>, refresh_interval: Duration) -> Self {
        Self {
            state: Arc::new(ResolverState {
                source,
                snapshot: RwLock::new(None),
                refresh_lock: Arc::new(Mutex::new(())),
                last_failure: StdMutex::new(None),
                refresh_interval,
            }),
        }
    }

    pub async fn resolve(&self, symbol: &str) -> Result<AssetIndex> {
        self.table()
            .await?
            .resolve(symbol)
            .ok_or_else(|| Error::UnknownAsset(symbol.to_string()))
    }

    pub async fn list_assets(&self) -> Result<AssetList> {
        Ok(self.table().await?.assets().clone())
    }

    pub async fn symbol_for_index(&self, index: AssetIndex) -> Result<String> {
        self.table()
            .await?
            .symbol_for_index(index)
            .map(str::to_string)
            .ok_or_else(|| Error::UnknownAsset(index.to_string()))
    }

    /// Exchange coin name (`BTC`, `@107`) to external symbol.
    pub async fn to_external(&self, coin: &str) -> Result<String> {
        self.table()
            .await?
            .to_external(coin)
            .map(str::to_string)
            .ok_or_else(|| Error::UnknownAsset(coin.to_string()))
    }

    /// External symbol to the coin name used by info queries and mids.
    pub async fn to_exchange_name(&self, symbol: &str) -> Result<String> {
        self.table()
            .await?
            .to_exchange_name(symbol)
            .map(str::to_string)
            .ok_or_else(|| Error::UnknownAsset(symbol.to_string()))
    }

    /// Current snapshot. Waits for a fetch only when none exists yet; a stale
    /// snapshot is returned as is and replaced in the background.
    pub async fn table(&self) -> Result<Arc<SymbolTable>> {
        match self.state.current() {
            Some(table) => {
                if self.state.refresh_due(&table) {
                    self.refresh_in_background();
                }
                Ok(table)
            }
            None => self.refresh_inner(false).await,
        }
    }

    /// Fetch fresh metadata now, regardless of snapshot age.
    pub async fn refresh(&self) -> Result<Arc<SymbolTable>> {
        self.refresh_inner(true).await
    }

    /// Refresh on a fixed cadence until the resolver is dropped.
    pub fn spawn_refresh(&self) -> JoinHandle<()> {
        let state: Weak<ResolverState> = Arc::downgrade(&self.state);
        let period = self.state.refresh_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(state) = state.upgrade() else {
                    break;
                };
                if let Err(err) = (SymbolResolver { state }).refresh().await {
                    warn!(error = %err, "background symbol refresh failed");
                }
            }
        })
    }

    // At most one refresh runs at a time; callers that lose the race keep the
    // snapshot they already hold.
    fn refresh_in_background(&self) {
        let Ok(guard) = Arc::clone(&self.state.refresh_lock).try_lock_owned() else {
            return;
        };
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let _guard = guard;
            // A refresh may have completed between the staleness check and the lock.
            if let Some(table) = state.current() {
                if !state.refresh_due(&table) {
                    return;
                }
            }
            debug!("refreshing stale symbol table");
            if let Err(err) = state.fetch_and_swap().await {
                warn!(error = %err, "symbol refresh failed, serving previous snapshot");
            }
        });
    }

    async fn refresh_inner(&self, force: bool) -> Result<Arc<SymbolTable>> {
        let requested_at = Instant::now();
        let _guard = self.state.refresh_lock.lock().await;

        // Another caller may have finished a refresh while we waited.
        if let Some(table) = self.state.current() {
            let fresh = if force {
                table.fetched_at >= requested_at
            } else {
                table.fetched_at.elapsed() < self.state.refresh_interval
            };
            if fresh {
                return Ok(table);
            }
        }

        match self.state.fetch_and_swap().await {
            Ok(table) => Ok(table),
            Err(err) => match self.state.current() {
                Some(stale) => {
                    warn!(error = %err, "symbol refresh failed, serving previous snapshot");
                    Ok(stale)
                }
                None => Err(err.into()),
            },
        }
    }
}
