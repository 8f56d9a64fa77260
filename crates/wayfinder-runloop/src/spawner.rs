//! Instance-keyed task spawner.
//!
//! Asynchronous work started on behalf of a flow instance (loading, action
//! execution, trigger polling) is spawned under that instance's key and
//! cancelled as a unit when the instance ends.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use crate::lifecycle::Lifecycle;

/// Metrics snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpawnerMetrics {
    /// Tasks spawned since creation.
    pub spawned: u64,
    /// Scopes cancelled since creation.
    pub cancelled: u64,
    /// Scopes currently alive.
    pub active_scopes: usize,
}

/// Spawner grouping tasks by instance key.
#[derive(Clone)]
pub struct InstanceSpawner {
    inner: Arc<SpawnerInner>,
}

struct SpawnerInner {
    root: Lifecycle,
    scopes: DashMap<String, Lifecycle>,
    spawned: AtomicU64,
    cancelled: AtomicU64,
}

impl Default for InstanceSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceSpawner {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SpawnerInner {
                root: Lifecycle::new("engine"),
                scopes: DashMap::new(),
                spawned: AtomicU64::new(0),
                cancelled: AtomicU64::new(0),
            }),
        }
    }

    /// Lifecycle for `key`, created on first use.
    pub fn scope(&self, key: &str) -> Lifecycle {
        if let Some(existing) = self.inner.scopes.get(key) {
            if !existing.is_torn_down() {
                return existing.clone();
            }
        }
        let lifecycle = self.inner.root.child(key);
        self.inner.scopes.insert(key.to_string(), lifecycle.clone());
        debug!(scope = key, "Scope created");
        lifecycle
    }

    /// Whether a live scope exists for `key`.
    pub fn has_scope(&self, key: &str) -> bool {
        self.inner
            .scopes
            .get(key)
            .map(|l| !l.is_torn_down())
            .unwrap_or(false)
    }

    /// Spawn `future` in the scope of `key`.
    pub fn spawn<F>(&self, key: &str, task_name: &str, future: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let spawned = self.scope(key).spawn(task_name, future);
        if spawned {
            self.inner.spawned.fetch_add(1, Ordering::Relaxed);
        }
        spawned
    }

    /// Cancel everything spawned under `key`.
    pub fn cancel(&self, key: &str) -> bool {
        match self.inner.scopes.remove(key) {
            Some((_, lifecycle)) => {
                lifecycle.teardown();
                self.inner.cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(scope = key, "Scope cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancel every scope.
    pub fn cancel_all(&self) {
        let keys: Vec<String> = self.inner.scopes.iter().map(|e| e.key().clone()).collect();
        for key in &keys {
            self.cancel(key);
        }
        info!(count = keys.len(), "All scopes cancelled");
    }

    pub fn metrics(&self) -> SpawnerMetrics {
        SpawnerMetrics {
            spawned: self.inner.spawned.load(Ordering::Relaxed),
            cancelled: self.inner.cancelled.load(Ordering::Relaxed),
            active_scopes: self
                .inner
                .scopes
                .iter()
                .filter(|e| !e.value().is_torn_down())
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn ticker(count: Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        async move {
            loop {
                tokio::time::sleep(Duration::from_millis(10)).await;
                count.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_scope_as_unit() {
        let spawner = InstanceSpawner::new();
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));

        spawner.spawn("flow-a#1", "poll", ticker(a.clone()));
        spawner.spawn("flow-a#1", "load", ticker(a.clone()));
        spawner.spawn("flow-b#2", "poll", ticker(b.clone()));

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(spawner.cancel("flow-a#1"));
        let a_seen = a.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(a.load(Ordering::SeqCst), a_seen);
        assert!(b.load(Ordering::SeqCst) > 2);
        assert!(!spawner.has_scope("flow-a#1"));
        assert!(spawner.has_scope("flow-b#2"));
    }

    #[tokio::test]
    async fn test_metrics() {
        let spawner = InstanceSpawner::new();
        spawner.spawn("x", "noop", async {});
        spawner.spawn("y", "noop", async {});
        spawner.cancel("x");

        let metrics = spawner.metrics();
        assert_eq!(metrics.spawned, 2);
        assert_eq!(metrics.cancelled, 1);
        assert_eq!(metrics.active_scopes, 1);
    }

    #[tokio::test]
    async fn test_cancel_unknown_scope() {
        let spawner = InstanceSpawner::new();
        assert!(!spawner.cancel("missing"));
    }

    #[tokio::test]
    async fn test_scope_recreated_after_cancel() {
        let spawner = InstanceSpawner::new();
        let first = spawner.scope("k");
        spawner.cancel("k");
        assert!(first.is_torn_down());
        let second = spawner.scope("k");
        assert!(!second.is_torn_down());
    }

    #[tokio::test]
    async fn test_remounted_scope_does_not_accumulate() {
        let spawner = InstanceSpawner::new();
        for _ in 0..100 {
            spawner.scope("launcher:help");
            spawner.cancel("launcher:help");
        }
        spawner.scope("launcher:help");
        assert_eq!(spawner.inner.root.live_children(), 1);
    }

    #[tokio::test]
    async fn test_cancel_all() {
        let spawner = InstanceSpawner::new();
        let a = spawner.scope("a");
        let b = spawner.scope("b");
        spawner.cancel_all();
        assert!(a.is_torn_down());
        assert!(b.is_torn_down());
        assert_eq!(spawner.metrics().active_scopes, 0);
    }
}
