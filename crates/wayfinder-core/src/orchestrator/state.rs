//! Flow instance state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use wayfinder_protocols::{Flow, FlowRef, HostSurface, OverlayHandle};
use wayfinder_runloop::Lifecycle;

/// Observable state of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
pub enum FlowState {
    Idle,
    EvaluatingStart,
    /// Step `i` is being (or has been) drawn.
    Rendering(usize),
    /// Step `i` waits for one of its triggers to pass.
    AwaitingTransition(usize),
    /// Superseded by a nested flow, resumable at step `i`.
    Paused(usize),
    Ended,
}

/// One running flow.
pub(crate) struct FlowInstance {
    pub id: String,
    pub flow: Arc<Flow>,
    pub current: usize,
    pub state: FlowState,
    /// Bumped on every step change; stale async work compares against it.
    pub generation: u64,
    pub overlays: Vec<OverlayHandle>,
    pub step_scope: Option<Lifecycle>,
    /// Placement tasks keep positions current but do not reveal overlays
    /// while this is set.
    pub hidden: Arc<AtomicBool>,
}

impl FlowInstance {
    pub fn new(flow: Arc<Flow>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            flow,
            current: 0,
            state: FlowState::Idle,
            generation: 0,
            overlays: Vec::new(),
            step_scope: None,
            hidden: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn flow_id(&self) -> &FlowRef {
        &self.flow.id
    }

    /// Remove the current step's overlays and cancel its tasks.
    pub fn clear_step(&mut self, surface: &dyn HostSurface) {
        if let Some(scope) = self.step_scope.take() {
            scope.teardown();
        }
        for overlay in self.overlays.drain(..) {
            surface.remove_overlay(overlay);
        }
    }

    pub fn set_hidden(&self, surface: &dyn HostSurface, hidden: bool) {
        self.hidden.store(hidden, Ordering::SeqCst);
        for overlay in &self.overlays {
            surface.set_overlay_visible(*overlay, !hidden);
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.load(Ordering::SeqCst)
    }
}
