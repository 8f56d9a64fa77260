//! Timestamped re-entrancy locks.

use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;

/// Short-lived per-key lock absorbing duplicate starts.
///
/// A key stays locked for `ttl` after it was acquired; there is no explicit
/// unlock on success.
#[derive(Debug)]
pub struct StartLock {
    acquired: DashMap<String, Instant>,
    ttl: Duration,
}

impl StartLock {
    pub fn new(ttl: Duration) -> Self {
        Self {
            acquired: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Take the lock unless it was taken less than `ttl` ago.
    pub fn try_acquire(&self, key: &str) -> bool {
        let now = Instant::now();
        match self.acquired.entry(key.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(now);
                true
            }
            Entry::Occupied(mut occupied) => {
                if now.duration_since(*occupied.get()) < self.ttl {
                    return false;
                }
                occupied.insert(now);
                true
            }
        }
    }

    pub fn is_locked(&self, key: &str) -> bool {
        self.acquired
            .get(key)
            .is_some_and(|at| at.elapsed() < self.ttl)
    }

    /// Drop the lock early, e.g. when the start attempt failed.
    pub fn release(&self, key: &str) {
        self.acquired.remove(key);
    }
}
