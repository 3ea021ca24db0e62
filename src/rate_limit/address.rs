use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
};

use async_trait::async_trait;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, warn};

use crate::{config::L1LimitConfig, errors::TransportResult};

/// Source of an address's cumulative traded volume, in USDC.
#[async_trait]
pub trait VolumeSource: Send + Sync {
    async fn traded_volume(&self, address: &str) -> TransportResult<f64>;
}

/// Reports the same volume for every address.
#[derive(Debug, Clone, Copy)]
pub struct FixedVolume(pub f64);

#[async_trait]
impl VolumeSource for FixedVolume {
    async fn traded_volume(&self, _address: &str) -> TransportResult<f64> {
        Ok(self.0)
    }
}

/// Request allowances derived for one address.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct L1Limits {
    pub base: f64,
    pub cancel: f64,
}

impl L1Limits {
    pub fn compute(traded_volume: f64, config: &L1LimitConfig) -> Self {
        let base = config.initial_buffer + traded_volume.max(0.0);
        let cancel = (base + config.cancel_bonus).min(base * 2.0);
        Self { base, cancel }
    }

    pub fn applicable(&self, is_cancel: bool) -> f64 {
        if is_cancel {
            self.cancel
        } else {
            self.base
        }
    }
}

#[derive(Default)]
struct AddressState {
    last_request: Option<Instant>,
}

/// Per-address limiter keyed on traded volume.
///
/// This is a coarse approximation: there is no sliding window or decrementing
/// counter. A call whose request count exceeds the address's allowance waits
/// out the cool-down measured from that address's previous call, and every
/// call records itself as the new previous call.
pub struct AddressRateLimiter {
    config: L1LimitConfig,
    volume: Arc<dyn VolumeSource>,
    states: StdMutex<HashMap<String, Arc<Mutex<AddressState>>>>,
}

impl AddressRateLimiter {
    pub fn new(config: L1LimitConfig, volume: Arc<dyn VolumeSource>) -> Self {
        Self {
            config,
            volume,
            states: StdMutex::new(HashMap::new()),
        }
    }

    pub async fn limits(&self, address: &str) -> L1Limits {
        let volume = match self.volume.traded_volume(address).await {
            Ok(volume) => volume,
            Err(err) => {
                warn!(%address, error = %err, "traded volume lookup failed, assuming none");
                0.0
            }
        };
        L1Limits::compute(volume, &self.config)
    }

    /// Gate one action for `address`. An empty address is not gated.
    pub async fn check_and_consume(&self, address: &str, is_cancel: bool, request_count: usize) {
        if address.is_empty() {
            return;
        }

        let slot = self.slot(address);
        let mut state = slot.lock().await;

        let limit = self.limits(address).await.applicable(is_cancel);
        if request_count as f64 > limit {
            if let Some(last) = state.last_request {
                let resume_at = last + self.config.cooldown();
                if resume_at > Instant::now() {
                    debug!(
                        %address,
                        request_count,
                        limit,
                        "address over its L1 allowance, waiting out cool-down"
                    );
                    tokio::time::sleep_until(resume_at).await;
                }
            }
        }

        state.last_request = Some(Instant::now());
    }

    fn slot(&self, address: &str) -> Arc<Mutex<AddressState>> {
        let mut states = self
            .states
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(states.entry(address.to_string()).or_default())
    }
}
