//! Lifecycle objects owning asynchronous work.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument};

type TeardownFn = Box<dyn FnOnce() + Send>;

/// Owner of spawned tasks and teardown callbacks.
///
/// Cloning shares the same lifecycle. Teardown is idempotent and also runs
/// when the last clone is dropped.
#[derive(Clone)]
pub struct Lifecycle {
    inner: Arc<LifecycleInner>,
}

struct LifecycleInner {
    name: String,
    token: CancellationToken,
    torn_down: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    teardown: Mutex<Vec<TeardownFn>>,
    children: Mutex<Vec<Weak<LifecycleInner>>>,
}

impl Lifecycle {
    /// Create a root lifecycle.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_token(name.into(), CancellationToken::new())
    }

    fn with_token(name: String, token: CancellationToken) -> Self {
        Self {
            inner: Arc::new(LifecycleInner {
                name,
                token,
                torn_down: AtomicBool::new(false),
                tasks: Mutex::new(Vec::new()),
                teardown: Mutex::new(Vec::new()),
                children: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Create a lifecycle cancelled together with this one.
    ///
    /// The child can still be torn down on its own; children that are gone
    /// are forgotten the next time one is created.
    pub fn child(&self, name: impl Into<String>) -> Lifecycle {
        let child = Self::with_token(name.into(), self.inner.token.child_token());
        if self.inner.torn_down.load(Ordering::SeqCst) {
            child.teardown();
            return child;
        }
        let mut children = self.inner.children.lock();
        children.retain(|weak| weak.upgrade().is_some_and(|c| !c.torn_down.load(Ordering::SeqCst)));
        children.push(Arc::downgrade(&child.inner));
        drop(children);
        child
    }

    /// Number of children that have not been torn down.
    pub fn live_children(&self) -> usize {
        self.inner
            .children
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|c| !c.torn_down.load(Ordering::SeqCst))
            .count()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Cancellation token observed by every task of this lifecycle.
    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.torn_down.load(Ordering::SeqCst) || self.inner.token.is_cancelled()
    }

    /// Spawn a task that stops when the lifecycle is torn down.
    ///
    /// Returns `false` without spawning when already torn down.
    pub fn spawn<F>(&self, task_name: &str, future: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_torn_down() {
            debug!(lifecycle = %self.inner.name, task = task_name, "Spawn after teardown ignored");
            return false;
        }

        let token = self.inner.token.clone();
        let span = tracing::debug_span!(
            "lifecycle_task",
            lifecycle = %self.inner.name,
            task = %task_name,
        );
        let handle = tokio::spawn(
            async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = future => {}
                }
            }
            .instrument(span),
        );

        let mut tasks = self.inner.tasks.lock();
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
        true
    }

    /// Register a callback run once at teardown.
    ///
    /// Runs immediately when already torn down.
    pub fn on_teardown<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.inner.torn_down.load(Ordering::SeqCst) {
            f();
            return;
        }
        self.inner.teardown.lock().push(Box::new(f));
    }

    /// Number of tasks that have not finished yet.
    pub fn active_tasks(&self) -> usize {
        self.inner
            .tasks
            .lock()
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Cancel every task, tear down the children, then run teardown
    /// callbacks in registration order.
    pub fn teardown(&self) {
        self.inner.teardown();
    }
}

impl LifecycleInner {
    fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.token.cancel();
        for handle in self.tasks.lock().drain(..) {
            handle.abort();
        }
        let children: Vec<Weak<LifecycleInner>> = self.children.lock().drain(..).collect();
        for child in children.iter().filter_map(Weak::upgrade) {
            child.teardown();
        }
        let callbacks: Vec<TeardownFn> = self.teardown.lock().drain(..).collect();
        let count = callbacks.len();
        for callback in callbacks {
            callback();
        }
        debug!(lifecycle = %self.name, callbacks = count, "Lifecycle torn down");
    }
}

impl Drop for LifecycleInner {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("name", &self.inner.name)
            .field("torn_down", &self.is_torn_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_teardown_runs_callbacks_once() {
        let lifecycle = Lifecycle::new("overlay");
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        lifecycle.on_teardown(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        lifecycle.teardown();
        lifecycle.teardown();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(lifecycle.is_torn_down());
    }

    #[tokio::test]
    async fn test_on_teardown_after_teardown_runs_immediately() {
        let lifecycle = Lifecycle::new("overlay");
        lifecycle.teardown();
        let ran = Arc::new(AtomicBool::new(false));
        let r = ran.clone();
        lifecycle.on_teardown(move || r.store(true, Ordering::SeqCst));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_cancels_tasks() {
        let lifecycle = Lifecycle::new("poll");
        let ticks = Arc::new(AtomicUsize::new(0));
        let t = ticks.clone();
        assert!(lifecycle.spawn("ticker", async move {
            loop {
                tokio::time::sleep(Duration::from_millis(10)).await;
                t.fetch_add(1, Ordering::SeqCst);
            }
        }));

        tokio::time::sleep(Duration::from_millis(35)).await;
        lifecycle.teardown();
        let seen = ticks.load(Ordering::SeqCst);
        assert!(seen >= 3);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
        assert!(!lifecycle.spawn("late", async {}));
    }

    #[tokio::test]
    async fn test_child_torn_down_with_parent() {
        let parent = Lifecycle::new("instance");
        let child = parent.child("step");
        let ran = Arc::new(AtomicBool::new(false));
        let r = ran.clone();
        child.on_teardown(move || r.store(true, Ordering::SeqCst));

        parent.teardown();
        assert!(child.is_torn_down());
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_child_teardown_leaves_parent() {
        let parent = Lifecycle::new("instance");
        let child = parent.child("step");
        child.teardown();
        assert!(child.is_torn_down());
        assert!(!parent.is_torn_down());
    }

    #[tokio::test]
    async fn test_finished_children_are_forgotten() {
        let parent = Lifecycle::new("engine");
        for i in 0..50 {
            parent.child(format!("launcher-{}", i)).teardown();
        }
        let dropped = parent.child("dropped");
        drop(dropped);
        let live = parent.child("live");

        assert_eq!(parent.live_children(), 1);
        assert_eq!(parent.inner.children.lock().len(), 1);

        parent.teardown();
        assert!(live.is_torn_down());
        assert_eq!(parent.live_children(), 0);
    }

    #[tokio::test]
    async fn test_child_of_torn_down_parent() {
        let parent = Lifecycle::new("engine");
        parent.teardown();
        let child = parent.child("late");
        assert!(child.is_torn_down());
        assert_eq!(parent.live_children(), 0);
    }

    #[tokio::test]
    async fn test_drop_tears_down() {
        let ran = Arc::new(AtomicBool::new(false));
        {
            let lifecycle = Lifecycle::new("scoped");
            let r = ran.clone();
            lifecycle.on_teardown(move || r.store(true, Ordering::SeqCst));
        }
        assert!(ran.load(Ordering::SeqCst));
    }
}
