//! Timers bound to a lifecycle.
//!
//! A timer never outlives the lifecycle it was created on: tearing the
//! lifecycle down cancels it, and cancelling the timer leaves the lifecycle
//! untouched.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::lifecycle::Lifecycle;

/// One-shot or repeating timer.
pub struct Timer {
    /// Timer ID.
    id: String,

    /// Delay before the first fire, and the period for repeating timers.
    interval: Duration,

    /// Whether the timer repeats.
    repeating: bool,

    /// Whether the timer is valid (not cancelled).
    valid: AtomicBool,

    /// Fire count.
    fire_count: AtomicU64,

    token: CancellationToken,
}

impl Timer {
    /// Create a one-shot timer.
    ///
    /// Fires once after the specified delay.
    pub fn once<F, Fut>(
        lifecycle: &Lifecycle,
        id: impl Into<String>,
        delay: Duration,
        callback: F,
    ) -> Arc<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::start(lifecycle, id.into(), delay, false, callback)
    }

    /// Create a repeating timer.
    ///
    /// Fires every `interval`, first after one full interval.
    pub fn repeating<F, Fut>(
        lifecycle: &Lifecycle,
        id: impl Into<String>,
        interval: Duration,
        callback: F,
    ) -> Arc<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::start(lifecycle, id.into(), interval, true, callback)
    }

    fn start<F, Fut>(
        lifecycle: &Lifecycle,
        id: String,
        interval: Duration,
        repeating: bool,
        callback: F,
    ) -> Arc<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let timer = Arc::new(Self {
            id,
            interval,
            repeating,
            valid: AtomicBool::new(true),
            fire_count: AtomicU64::new(0),
            token: lifecycle.token().child_token(),
        });

        let task_timer = timer.clone();
        let spawned = lifecycle.spawn(&format!("timer:{}", timer.id), async move {
            task_timer.run(callback).await;
        });
        if !spawned {
            timer.valid.store(false, Ordering::SeqCst);
        }

        debug!(
            "Timer {} scheduled in {:?} (repeating: {})",
            timer.id, timer.interval, timer.repeating
        );
        timer
    }

    async fn run<F, Fut>(&self, callback: F)
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ()>,
    {
        let period = self.interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + self.interval, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if !self.is_valid() {
                break;
            }
            self.fire_count.fetch_add(1, Ordering::Relaxed);
            callback().await;
            if !self.repeating {
                self.valid.store(false, Ordering::SeqCst);
                break;
            }
        }
    }

    /// Get the timer ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Check if the timer repeats.
    pub fn is_repeating(&self) -> bool {
        self.repeating
    }

    /// Check if the timer can still fire.
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst) && !self.token.is_cancelled()
    }

    /// Get the fire count.
    pub fn fire_count(&self) -> u64 {
        self.fire_count.load(Ordering::Relaxed)
    }

    /// Cancel the timer.
    pub fn cancel(&self) {
        self.valid.store(false, Ordering::SeqCst);
        self.token.cancel();
        debug!("Timer {} cancelled", self.id);
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
