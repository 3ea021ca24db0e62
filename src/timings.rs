//! Per-stage latency logging, compiled in with the `timings` feature.

use std::future::Future;

#[cfg(feature = "timings")]
pub(crate) struct StageTimer {
    label: &'static str,
    started: std::time::Instant,
}

#[cfg(feature = "timings")]
impl Drop for StageTimer {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        tracing::info!(
            target: "timings",
            stage = self.label,
            elapsed_ms = elapsed.as_secs_f64() * 1e3
        );
    }
}

#[cfg(feature = "timings")]
pub(crate) fn stage(label: &'static str) -> StageTimer {
    StageTimer {
        label,
        started: std::time::Instant::now(),
    }
}

#[cfg(not(feature = "timings"))]
pub(crate) struct StageTimer;

#[cfg(not(feature = "timings"))]
pub(crate) fn stage(_: &'static str) -> StageTimer {
    StageTimer
}

pub(crate) async fn time_async_block<T, Fut>(label: &'static str, fut: Fut) -> T
where
    Fut: Future<Output = T>,
{
    let _timer = stage(label);
    fut.await
}
