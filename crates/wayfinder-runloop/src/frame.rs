//! Paint-aligned frame batching.
//!
//! Geometry recomputation waits for the next frame boundary so that a burst
//! of scroll and resize notifications produces a single recompute.

use std::time::Duration;

use tokio::time::Instant;

/// Fixed-rate frame grid.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    origin: Instant,
    interval: Duration,
}

impl FrameClock {
    pub fn new(interval: Duration) -> Self {
        Self {
            origin: Instant::now(),
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// First frame boundary strictly after `now`.
    pub fn next_boundary(&self, now: Instant) -> Instant {
        let elapsed = now.saturating_duration_since(self.origin).as_nanos();
        let step = self.interval.as_nanos();
        let frames = elapsed / step + 1;
        let offset = u64::try_from(frames * step).unwrap_or(u64::MAX);
        self.origin + Duration::from_nanos(offset)
    }
}

/// Coalesces recompute requests into the next frame.
#[derive(Debug)]
pub struct FrameBatch {
    clock: FrameClock,
    deadline: Option<Instant>,
    coalesced: u64,
    frames: u64,
}

impl FrameBatch {
    pub fn new(clock: FrameClock) -> Self {
        Self {
            clock,
            deadline: None,
            coalesced: 0,
            frames: 0,
        }
    }

    /// Request a recompute. Returns `true` when a new frame was scheduled.
    pub fn request(&mut self, now: Instant) -> bool {
        if self.deadline.is_some() {
            self.coalesced += 1;
            return false;
        }
        self.deadline = Some(self.clock.next_boundary(now));
        true
    }

    /// Deadline of the pending frame.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Consume the pending frame.
    pub fn take(&mut self) -> bool {
        if self.deadline.take().is_some() {
            self.frames += 1;
            true
        } else {
            false
        }
    }

    /// Requests merged into an already pending frame.
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }

    /// Frames delivered.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_next_boundary_on_grid() {
        let clock = FrameClock::new(Duration::from_millis(16));
        let start = Instant::now();
        assert_eq!(clock.next_boundary(start), start + Duration::from_millis(16));
        assert_eq!(
            clock.next_boundary(start + Duration::from_millis(20)),
            start + Duration::from_millis(32)
        );
        assert_eq!(
            clock.next_boundary(start + Duration::from_millis(32)),
            start + Duration::from_millis(48)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_coalesces_requests() {
        let mut batch = FrameBatch::new(FrameClock::new(Duration::from_millis(16)));
        let now = Instant::now();
        assert!(batch.request(now));
        assert!(!batch.request(now));
        assert!(!batch.request(now + Duration::from_millis(5)));
        assert_eq!(batch.coalesced(), 2);

        assert!(batch.take());
        assert!(!batch.take());
        assert_eq!(batch.frames(), 1);
        assert!(!batch.is_pending());
        assert!(batch.request(now + Duration::from_millis(17)));
    }
}
