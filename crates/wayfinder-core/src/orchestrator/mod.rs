//! Step orchestration.
//!
//! The [`Orchestrator`] owns the visible flow instance and the stack of
//! flows it superseded. Starting, transitioning, rendering and action
//! execution live in sibling modules as further `impl` blocks.

mod actions;
mod render;
mod stack;
mod start;
mod state;
mod transition;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info};
use wayfinder_anchor::{Positioner, TargetResolver};
use wayfinder_protocols::{Flow, FlowRef, OverlayHandle, StepRef};

use crate::context::EngineContext;
use crate::events::{EndReason, EngineEvent};

pub(crate) use render::fixed_placement;
pub use start::{StartReason, StartTrigger};
pub use state::FlowState;

use stack::PausedStack;
use state::FlowInstance;

const ACTIVE_FLOW_KEY: &str = "active_flow";

fn active_step_key(flow: &FlowRef) -> String {
    format!("active_step:{}", flow)
}

fn flow_url_key(flow: &FlowRef) -> String {
    format!("flow_url:{}", flow)
}

#[derive(Default)]
struct MarkerState {
    read: bool,
    pending: Option<StepRef>,
}

#[derive(Default)]
struct Inner {
    visible: Option<FlowInstance>,
    stack: PausedStack,
    ended: HashSet<FlowRef>,
    evaluating: HashSet<FlowRef>,
    marker: MarkerState,
    launcher_starts: HashMap<FlowRef, StepRef>,
}

/// Drives flows through their steps.
pub struct Orchestrator {
    ctx: Arc<EngineContext>,
    resolver: TargetResolver,
    positioner: Positioner,
    inner: Mutex<Inner>,
    weak: Weak<Orchestrator>,
}

impl Orchestrator {
    pub fn new(ctx: Arc<EngineContext>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            resolver: TargetResolver::new(ctx.surface().clone(), ctx.config().resolver.clone()),
            positioner: Positioner::new(ctx.config().positioner.clone()),
            inner: Mutex::new(Inner::default()),
            weak: weak.clone(),
            ctx,
        })
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    pub fn positioner(&self) -> &Positioner {
        &self.positioner
    }

    pub fn resolver(&self) -> &TargetResolver {
        &self.resolver
    }

    /// Flow whose step is on screen.
    pub fn visible_flow(&self) -> Option<FlowRef> {
        self.inner.lock().visible.as_ref().map(|v| v.flow_id().clone())
    }

    /// Visible flow and its current step index.
    pub fn current_step(&self) -> Option<(FlowRef, usize)> {
        self.inner
            .lock()
            .visible
            .as_ref()
            .map(|v| (v.flow_id().clone(), v.current))
    }

    pub fn state(&self, flow: &FlowRef) -> FlowState {
        let inner = self.inner.lock();
        if let Some(visible) = inner.visible.as_ref().filter(|v| v.flow_id() == flow) {
            return visible.state;
        }
        if let Some(paused) = inner.stack.find(flow) {
            return paused.instance.state;
        }
        if inner.evaluating.contains(flow) {
            return FlowState::EvaluatingStart;
        }
        if inner.ended.contains(flow) {
            return FlowState::Ended;
        }
        FlowState::Idle
    }

    /// Paused flows, oldest first.
    pub fn paused_flows(&self) -> Vec<FlowRef> {
        self.inner.lock().stack.flow_ids()
    }

    /// Visible or paused.
    pub fn is_active(&self, flow: &FlowRef) -> bool {
        let inner = self.inner.lock();
        inner.visible.as_ref().is_some_and(|v| v.flow_id() == flow)
            || inner.stack.find(flow).is_some()
    }

    pub fn has_visible_flow(&self) -> bool {
        self.inner.lock().visible.is_some()
    }

    /// Overlays of the visible step.
    pub fn visible_overlays(&self) -> Vec<OverlayHandle> {
        self.inner
            .lock()
            .visible
            .as_ref()
            .map(|v| v.overlays.clone())
            .unwrap_or_default()
    }

    /// Tear down every instance without touching the session stores.
    pub fn shutdown(&self) {
        let surface = self.ctx.surface().clone();
        let mut inner = self.inner.lock();
        let mut instances: Vec<FlowInstance> =
            inner.stack.drain().into_iter().map(|p| p.instance).collect();
        instances.extend(inner.visible.take());
        for mut instance in instances {
            instance.clear_step(surface.as_ref());
            self.ctx.spawner().cancel(&instance.id);
        }
    }

    fn visible_instance_id(&self) -> Option<String> {
        self.inner.lock().visible.as_ref().map(|v| v.id.clone())
    }

    /// Flow of the visible instance, if it is `instance_id`.
    fn instance_flow(&self, instance_id: &str) -> Option<Arc<Flow>> {
        self.inner
            .lock()
            .visible
            .as_ref()
            .filter(|v| v.id == instance_id)
            .map(|v| v.flow.clone())
    }

    fn is_current(&self, instance_id: &str, generation: u64) -> bool {
        self.inner
            .lock()
            .visible
            .as_ref()
            .is_some_and(|v| v.id == instance_id && v.generation == generation)
    }

    /// End the visible instance.
    ///
    /// With `close_all` every paused flow is unwound as well; otherwise the
    /// most recently paused flow is restored. A navigation ends everything
    /// but leaves the session stores alone so the flow can resume.
    fn end_visible(&self, instance_id: &str, reason: EndReason, close_all: bool) -> bool {
        let mut events = Vec::new();
        let mut redraw = None;
        {
            let mut inner = self.inner.lock();
            let Some(visible) = inner.visible.take_if(|v| v.id == instance_id) else {
                return false;
            };
            self.retire(visible, reason, &mut inner, &mut events);

            if close_all || reason == EndReason::Navigated {
                let unwind_reason = if reason == EndReason::Navigated {
                    EndReason::Navigated
                } else {
                    EndReason::Unwound
                };
                for paused in inner.stack.drain() {
                    self.retire(paused.instance, unwind_reason, &mut inner, &mut events);
                }
            } else if let Some(paused) = inner.stack.pop() {
                let mut instance = paused.instance;
                instance.state = paused.resume_state;
                instance.set_hidden(self.ctx.surface().as_ref(), false);
                self.persist_position(instance.flow_id(), instance.current);
                info!(
                    flow_id = %instance.flow_id(),
                    step_index = instance.current,
                    "Flow resumed"
                );
                events.push(EngineEvent::FlowResumed {
                    flow_id: instance.flow_id().clone(),
                    step_index: instance.current,
                });
                // Paused before its step was mounted.
                if instance.overlays.is_empty() && matches!(instance.state, FlowState::Rendering(_)) {
                    redraw = Some((instance.id.clone(), instance.current));
                }
                inner.visible = Some(instance);
            }
        }
        for event in events {
            self.ctx.emit(event);
        }
        if let Some((id, index)) = redraw {
            self.redraw(id, index);
        }
        true
    }

    /// Render step `index` of the visible instance again on its own task.
    fn redraw(&self, instance_id: String, index: usize) {
        let Some(orchestrator) = self.weak.upgrade() else {
            return;
        };
        debug!(instance_id = %instance_id, index, "Redrawing resumed step");
        tokio::spawn(async move {
            let Some(flow) = orchestrator.instance_flow(&instance_id) else {
                return;
            };
            if let Some(step) = flow.step(index) {
                orchestrator.render_step(&instance_id, index, step).await;
            }
        });
    }

    fn retire(
        &self,
        mut instance: FlowInstance,
        reason: EndReason,
        inner: &mut Inner,
        events: &mut Vec<EngineEvent>,
    ) {
        instance.clear_step(self.ctx.surface().as_ref());
        instance.state = FlowState::Ended;
        self.ctx.spawner().cancel(&instance.id);
        if reason != EndReason::Navigated {
            self.forget_position(instance.flow_id());
        }
        info!(
            flow_id = %instance.flow_id(),
            instance_id = %instance.id,
            ?reason,
            "Flow ended"
        );
        inner.ended.insert(instance.flow_id().clone());
        events.push(EngineEvent::FlowEnded {
            flow_id: instance.flow_id().clone(),
            reason,
        });
    }

    /// Remember where the flow is so a reload can pick it up again.
    fn persist_position(&self, flow: &FlowRef, index: usize) {
        let session = self.ctx.session();
        session.set(ACTIVE_FLOW_KEY, flow.as_str());
        session.set(&active_step_key(flow), &index.to_string());
        session.set(&flow_url_key(flow), &self.ctx.surface().current_url());
    }

    fn forget_position(&self, flow: &FlowRef) {
        let session = self.ctx.session();
        session.remove(&active_step_key(flow));
        session.remove(&flow_url_key(flow));
        if session.get(ACTIVE_FLOW_KEY).as_deref() == Some(flow.as_str()) {
            session.remove(ACTIVE_FLOW_KEY);
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
