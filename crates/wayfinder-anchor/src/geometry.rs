//! Viewport geometry tracking.
//!
//! A [`GeometryTracker`] owns one task that listens for surface
//! notifications, polls scroll offsets as a fallback, and recomputes the
//! tracked rectangle at the next frame boundary. Subscribers only hear about
//! rectangles whose edges actually moved. A tracker built with a
//! [`Relocate`] hook rebinds to a replacement element when the page
//! re-renders its target.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;
use wayfinder_config::GeometryConfig;
use wayfinder_protocols::{
    ElementHandle, HostSurface, Rect, SavedCoordinates, ScrollOffset, SurfaceEvent,
};
use wayfinder_runloop::{FrameBatch, FrameClock, Lifecycle};

/// Live view of a rectangle that may change over time.
pub trait Observation: Send + Sync {
    /// Last known rectangle, `None` when the target is gone.
    fn current(&self) -> Option<Rect>;

    /// Change stream; only edge-changing updates are published.
    fn subscribe(&self) -> watch::Receiver<Option<Rect>>;

    /// Recompute now. Returns `true` if the rectangle changed.
    fn refresh(&self) -> bool;
}

/// What a tracker follows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackedSource {
    Element(ElementHandle),
    /// Saved rectangle shifted by the window scroll delta.
    Absolute(SavedCoordinates),
}

/// Finds the element that replaced a detached target, if any.
pub type Relocate = Box<dyn Fn() -> Option<ElementHandle> + Send + Sync>;

struct Binding {
    source: TrackedSource,
    scroll_containers: Vec<ElementHandle>,
}

impl Binding {
    fn new(surface: &dyn HostSurface, source: TrackedSource) -> Self {
        let scroll_containers = match source {
            TrackedSource::Element(element) => scroll_ancestors(surface, element),
            TrackedSource::Absolute(_) => Vec::new(),
        };
        Self {
            source,
            scroll_containers,
        }
    }
}

/// Event-driven rectangle tracker with a scroll-offset poll.
pub struct GeometryTracker {
    surface: Arc<dyn HostSurface>,
    binding: Mutex<Binding>,
    relocate: Option<Relocate>,
    sender: watch::Sender<Option<Rect>>,
    offsets: Mutex<Vec<ScrollOffset>>,
    recomputes: AtomicU64,
}

impl GeometryTracker {
    /// Start tracking. The task lives until `lifecycle` is torn down.
    pub fn spawn(
        surface: Arc<dyn HostSurface>,
        source: TrackedSource,
        config: &GeometryConfig,
        lifecycle: &Lifecycle,
    ) -> Arc<Self> {
        Self::start(surface, source, None, config, lifecycle)
    }

    /// Like [`spawn`](Self::spawn), but a detached element is replaced by
    /// whatever `relocate` finds on the next recompute.
    pub fn spawn_relocating(
        surface: Arc<dyn HostSurface>,
        source: TrackedSource,
        relocate: Relocate,
        config: &GeometryConfig,
        lifecycle: &Lifecycle,
    ) -> Arc<Self> {
        Self::start(surface, source, Some(relocate), config, lifecycle)
    }

    fn start(
        surface: Arc<dyn HostSurface>,
        source: TrackedSource,
        relocate: Option<Relocate>,
        config: &GeometryConfig,
        lifecycle: &Lifecycle,
    ) -> Arc<Self> {
        let binding = Binding::new(surface.as_ref(), source);
        let containers = binding.scroll_containers.len();
        let events = surface.subscribe();

        let (sender, _) = watch::channel(None);
        let tracker = Arc::new(Self {
            surface,
            binding: Mutex::new(binding),
            relocate,
            sender,
            offsets: Mutex::new(Vec::new()),
            recomputes: AtomicU64::new(0),
        });
        *tracker.offsets.lock() = tracker.scroll_offsets();
        tracker.sender.send_replace(tracker.compute());

        debug!(source = ?source, containers, "Geometry tracking started");

        let batch = FrameBatch::new(FrameClock::new(config.frame_interval()));
        lifecycle.spawn(
            "geometry",
            tracker.clone().run(events, config.poll_interval(), batch),
        );
        tracker
    }

    /// What is tracked right now; changes when the target is relocated.
    pub fn source(&self) -> TrackedSource {
        self.binding.lock().source
    }

    /// Scroll-container ancestors of the tracked element, innermost first.
    pub fn scroll_containers(&self) -> Vec<ElementHandle> {
        self.binding.lock().scroll_containers.clone()
    }

    /// Number of frame-batched recomputes performed so far.
    pub fn recompute_count(&self) -> u64 {
        self.recomputes.load(Ordering::Relaxed)
    }

    fn compute(&self) -> Option<Rect> {
        match self.source() {
            TrackedSource::Element(element) => {
                if self.surface.is_attached(element) {
                    return self.surface.bounding_rect(element);
                }
                let replacement = self.relocate.as_ref().and_then(|relocate| relocate())?;
                if replacement == element {
                    return None;
                }
                debug!(from = ?element, to = ?replacement, "Tracked element replaced");
                self.rebind(TrackedSource::Element(replacement));
                self.surface.bounding_rect(replacement)
            }
            TrackedSource::Absolute(saved) => {
                if saved.in_fixed_container {
                    return Some(saved.rect);
                }
                let scroll = self.surface.viewport().scroll();
                Some(saved.rect.offset(
                    -(scroll.x - saved.initial_scroll.x),
                    -(scroll.y - saved.initial_scroll.y),
                ))
            }
        }
    }

    fn rebind(&self, source: TrackedSource) {
        *self.binding.lock() = Binding::new(self.surface.as_ref(), source);
        let offsets = self.scroll_offsets();
        *self.offsets.lock() = offsets;
    }

    /// Window offset followed by each container's offset.
    fn scroll_offsets(&self) -> Vec<ScrollOffset> {
        let containers = self.scroll_containers();
        let mut offsets = Vec::with_capacity(containers.len() + 1);
        offsets.push(self.surface.viewport().scroll());
        offsets.extend(containers.iter().map(|c| self.surface.scroll_offset(*c)));
        offsets
    }

    fn offsets_changed(&self) -> bool {
        let current = self.scroll_offsets();
        let mut last = self.offsets.lock();
        if *last == current {
            return false;
        }
        *last = current;
        true
    }

    fn is_relevant(&self, event: &SurfaceEvent) -> bool {
        match event {
            SurfaceEvent::Scroll { source: None } => true,
            SurfaceEvent::Scroll {
                source: Some(container),
            } => self.binding.lock().scroll_containers.contains(container),
            SurfaceEvent::Resize => true,
            SurfaceEvent::Mutation => matches!(self.source(), TrackedSource::Element(_)),
            SurfaceEvent::UrlChanged { .. } => false,
        }
    }

    async fn run(
        self: Arc<Self>,
        mut events: broadcast::Receiver<SurfaceEvent>,
        poll_interval: Duration,
        mut batch: FrameBatch,
    ) {
        let mut poll = tokio::time::interval_at(Instant::now() + poll_interval, poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let deadline = batch.deadline();
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => {
                        if self.is_relevant(&event) {
                            batch.request(Instant::now());
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Geometry tracker lagged behind surface events");
                        batch.request(Instant::now());
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = poll.tick() => {
                    if self.offsets_changed() {
                        batch.request(Instant::now());
                    }
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    batch.take();
                    self.recomputes.fetch_add(1, Ordering::Relaxed);
                    *self.offsets.lock() = self.scroll_offsets();
                    self.refresh();
                }
            }
        }
        debug!(source = ?self.source(), "Geometry tracking stopped");
    }
}

impl Observation for GeometryTracker {
    fn current(&self) -> Option<Rect> {
        *self.sender.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Rect>> {
        self.sender.subscribe()
    }

    fn refresh(&self) -> bool {
        let next = self.compute();
        self.sender.send_if_modified(|last| {
            let changed = match (last.as_ref(), next.as_ref()) {
                (Some(a), Some(b)) => a.edges_differ(b),
                (None, None) => false,
                _ => true,
            };
            if changed {
                *last = next;
            }
            changed
        })
    }
}

/// Ancestors whose computed overflow makes them scroll containers.
fn scroll_ancestors(surface: &dyn HostSurface, element: ElementHandle) -> Vec<ElementHandle> {
    let mut containers = Vec::new();
    let mut current = surface.parent(element);
    while let Some(ancestor) = current {
        if surface
            .computed_style(ancestor)
            .is_some_and(|s| s.is_scroll_container())
        {
            containers.push(ancestor);
        }
        current = surface.parent(ancestor);
    }
    containers
}

#[cfg(test)]
#[path = "geometry_tests.rs"]
mod tests;
