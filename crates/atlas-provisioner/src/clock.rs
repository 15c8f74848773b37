use std::time::{Duration, Instant};

use atlas_core::BoxFuture;

/// Time source for every polling loop.
///
/// Loops never call `tokio::time` directly so tests can substitute a clock
/// that advances instantly.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()>;
}

/// Production clock backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Sleep for `duration`, but never past `deadline`.
pub(crate) async fn sleep_bounded(clock: &dyn Clock, duration: Duration, deadline: Instant) {
    let remaining = deadline.saturating_duration_since(clock.now());
    let nap = duration.min(remaining);
    if !nap.is_zero() {
        clock.sleep(nap).await;
    }
}
