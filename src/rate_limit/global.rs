use std::{sync::Arc, time::Duration};

use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, warn};

use crate::config::GlobalLimitConfig;

/// Counters for spotting callers starved by the shared bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimiterStats {
    pub consumed: u64,
    pub waits: u64,
    pub total_wait: Duration,
    pub longest_wait: Duration,
}

struct BucketState {
    tokens: u32,
    last_refill: Instant,
    stats: LimiterStats,
}

impl BucketState {
    fn refill(&mut self, now: Instant, config: &GlobalLimitConfig) {
        let interval = config.refill_interval();
        let elapsed = now.saturating_duration_since(self.last_refill);
        let ticks = elapsed.as_nanos() / interval.as_nanos().max(1);
        if ticks == 0 {
            return;
        }
        let added = ticks.saturating_mul(u128::from(config.refill_amount));
        let tokens = (u128::from(self.tokens) + added).min(u128::from(config.capacity));
        self.tokens = u32::try_from(tokens).unwrap_or(config.capacity);
        let ticks = u32::try_from(ticks).unwrap_or(u32::MAX);
        self.last_refill += interval.saturating_mul(ticks);
    }
}

/// Process-wide weighted token bucket. Cloning shares the same bucket.
///
/// The bucket lock is held across the refill wait, so concurrent callers are
/// served in arrival order and no two of them can claim the same tokens.
#[derive(Clone)]
pub struct GlobalRateLimiter {
    state: Arc<Mutex<BucketState>>,
    config: Arc<GlobalLimitConfig>,
}

impl GlobalRateLimiter {
    pub fn new(config: GlobalLimitConfig) -> Self {
        let state = BucketState {
            tokens: config.capacity,
            last_refill: Instant::now(),
            stats: LimiterStats::default(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            config: Arc::new(config),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.config.capacity
    }

    /// Wait until `weight` tokens are available and take them.
    pub async fn consume(&self, weight: u32) {
        let weight = if weight > self.config.capacity {
            warn!(
                weight,
                capacity = self.config.capacity,
                "request weight exceeds bucket capacity, clamping"
            );
            self.config.capacity
        } else {
            weight
        };

        let requested_at = Instant::now();
        let mut state = self.state.lock().await;
        loop {
            state.refill(Instant::now(), &self.config);
            if state.tokens >= weight {
                state.tokens -= weight;
                break;
            }
            let next_tick = state.last_refill + self.config.refill_interval();
            debug!(
                weight,
                available = state.tokens,
                "global rate limit reached, waiting for refill"
            );
            tokio::time::sleep_until(next_tick).await;
        }

        let waited = requested_at.elapsed();
        state.stats.consumed += u64::from(weight);
        if !waited.is_zero() {
            state.stats.waits += 1;
            state.stats.total_wait += waited;
            state.stats.longest_wait = state.stats.longest_wait.max(waited);
            if waited >= self.config.starvation_threshold() {
                warn!(
                    weight,
                    waited_ms = waited.as_millis() as u64,
                    "request starved by the global rate limiter"
                );
            }
        }
    }

    /// Tokens currently available, after applying any due refill.
    pub async fn available(&self) -> u32 {
        let mut state = self.state.lock().await;
        state.refill(Instant::now(), &self.config);
        state.tokens
    }

    pub async fn stats(&self) -> LimiterStats {
        self.state.lock().await.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(capacity: u32) -> GlobalRateLimiter {
        GlobalRateLimiter::new(GlobalLimitConfig {
            capacity,
            refill_amount: capacity,
            refill_interval_ms: 60_000,
            starvation_warn_ms: 120_000,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn full_capacity_is_served_without_waiting() {
        let limiter = limiter(1200);
        let start = Instant::now();
        for _ in 0..600 {
            limiter.consume(2).await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.available().await, 0);
        assert_eq!(limiter.stats().await.waits, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn one_more_unit_waits_for_the_next_tick() {
        let limiter = limiter(1200);
        limiter.consume(1200).await;

        let start = Instant::now();
        limiter.consume(1).await;
        assert_eq!(start.elapsed(), Duration::from_secs(60));

        let stats = limiter.stats().await;
        assert_eq!(stats.waits, 1);
        assert_eq!(stats.longest_wait, Duration::from_secs(60));
        assert_eq!(limiter.available().await, 1199);
    }

    #[tokio::test(start_paused = true)]
    async fn refill_is_capped_at_capacity() {
        let limiter = limiter(100);
        limiter.consume(40).await;
        tokio::time::advance(Duration::from_secs(600)).await;
        assert_eq!(limiter.available().await, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_weight_is_clamped() {
        let limiter = limiter(10);
        let start = Instant::now();
        limiter.consume(50).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.available().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_never_overdraw() {
        let limiter = limiter(10);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.consume(5).await;
                    Instant::now()
                })
            })
            .collect();

        let start = Instant::now();
        let mut finished = Vec::new();
        for handle in handles {
            finished.push(handle.await.unwrap() - start);
        }
        finished.sort();
        assert_eq!(finished[0], Duration::ZERO);
        assert_eq!(finished[1], Duration::ZERO);
        assert_eq!(finished[2], Duration::from_secs(60));
        assert_eq!(finished[3], Duration::from_secs(60));
    }
}
