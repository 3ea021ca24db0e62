use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

use crate::types::Nonce;

/// Issues the nonce for an action at the moment it is signed.
pub trait NonceManager: Send + Sync {
    fn next_nonce(&self) -> Nonce;
}

/// Wall-clock millisecond nonces, bumped by one whenever the clock has not
/// advanced past the previously issued value.
#[derive(Debug, Default)]
pub struct ClockNonceManager {
    last: AtomicU64,
}

impl ClockNonceManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn issue(&self, now_ms: u64) -> Nonce {
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now_ms.max(current + 1);
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Nonce::new(candidate),
                Err(observed) => current = observed,
            }
        }
    }
}

impl NonceManager for ClockNonceManager {
    fn next_nonce(&self) -> Nonce {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        self.issue(u64::try_from(now_ms).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc, thread};

    use super::*;

    #[test]
    fn stalled_clock_still_increases() {
        let manager = ClockNonceManager::new();
        let first = manager.issue(1_000);
        let second = manager.issue(1_000);
        let third = manager.issue(999);
        assert_eq!(first.into_inner(), 1_000);
        assert_eq!(second.into_inner(), 1_001);
        assert_eq!(third.into_inner(), 1_002);
        assert_eq!(manager.issue(5_000).into_inner(), 5_000);
    }

    #[test]
    fn concurrent_callers_never_share_a_nonce() {
        let manager = Arc::new(ClockNonceManager::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                thread::spawn(move || {
                    (0..250)
                        .map(|_| manager.next_nonce().into_inner())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for nonce in handle.join().unwrap() {
                assert!(seen.insert(nonce), "duplicate nonce {nonce}");
            }
        }
        assert_eq!(seen.len(), 2_000);
    }
}
