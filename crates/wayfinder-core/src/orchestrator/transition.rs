//! Step transitions.
//!
//! Moving to a step runs a small pipeline: malformed steps are skipped,
//! trigger blocks are checked in declaration order and the first passing
//! one executes its actions instead of rendering, a trigger-only step with
//! nothing passing waits, and anything else renders. Every hop spends one
//! unit of the transition budget so trigger cycles terminate.

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, warn};
use wayfinder_protocols::{Action, Step, StepEntry};
use wayfinder_runloop::Timer;

use super::state::FlowState;
use super::Orchestrator;
use crate::events::{EndReason, EngineEvent};

impl Orchestrator {
    /// Move instance `instance_id` to step `index`.
    pub(super) fn transition<'a>(
        &'a self,
        instance_id: &'a str,
        index: usize,
        budget: usize,
    ) -> BoxFuture<'a, ()> {
        async move {
            let mut index = index;
            let mut budget = budget;
            loop {
                let Some(flow) = self.instance_flow(instance_id) else {
                    debug!(instance_id, "Transition target no longer visible");
                    return;
                };
                if budget == 0 {
                    warn!(flow_id = %flow.id, index, "Transition budget exhausted");
                    self.end_visible(instance_id, EndReason::HopLimit, false);
                    return;
                }
                budget -= 1;

                let step: Step = match flow.entry(index) {
                    None => {
                        debug!(flow_id = %flow.id, "Ran past the last step");
                        self.end_visible(instance_id, EndReason::Completed, false);
                        return;
                    }
                    Some(StepEntry::Malformed { id, reason }) => {
                        warn!(flow_id = %flow.id, index, step_id = ?id, %reason, "Skipping malformed step");
                        self.ctx.emit(EngineEvent::StepSkipped {
                            flow_id: flow.id.clone(),
                            step_index: index,
                            reason: format!("malformed: {}", reason),
                        });
                        index += 1;
                        continue;
                    }
                    Some(StepEntry::Valid(step)) => step.clone(),
                };

                if step.has_triggers() {
                    if let Some(actions) = self.passing_trigger(&step) {
                        debug!(flow_id = %flow.id, index, "Trigger passed");
                        if self.enter_step(instance_id, index, FlowState::AwaitingTransition(index)).is_some() {
                            self.execute(instance_id, actions, budget).await;
                        }
                        return;
                    }
                    if !step.has_renderable_blocks() {
                        self.await_triggers(instance_id, index);
                        return;
                    }
                }

                if !step.has_renderable_blocks() {
                    debug!(flow_id = %flow.id, index, step_id = %step.id, "Step has nothing to show");
                    self.ctx.emit(EngineEvent::StepSkipped {
                        flow_id: flow.id.clone(),
                        step_index: index,
                        reason: "no renderable blocks".to_string(),
                    });
                    index += 1;
                    continue;
                }

                self.render_step(instance_id, index, &step).await;
                return;
            }
        }
        .boxed()
    }

    /// Actions of the first trigger whose conditions pass.
    fn passing_trigger(&self, step: &Step) -> Option<Vec<Action>> {
        step.triggers()
            .find(|(conditions, _)| self.ctx.evaluate(conditions))
            .map(|(_, actions)| actions.to_vec())
    }

    /// Clear the previous step and make `index` current.
    ///
    /// Returns the new generation, or `None` when the instance is no longer
    /// visible.
    pub(super) fn enter_step(&self, instance_id: &str, index: usize, state: FlowState) -> Option<u64> {
        let surface = self.ctx.surface().clone();
        let mut inner = self.inner.lock();
        let visible = inner.visible.as_mut().filter(|v| v.id == instance_id)?;
        visible.clear_step(surface.as_ref());
        visible.current = index;
        visible.generation += 1;
        visible.state = state;
        visible.step_scope = Some(
            self.ctx
                .spawner()
                .scope(instance_id)
                .child(format!("step-{}", index)),
        );
        let generation = visible.generation;
        let flow_id = visible.flow_id().clone();
        drop(inner);

        self.persist_position(&flow_id, index);
        Some(generation)
    }

    /// Park on a trigger-only step until one of its triggers passes.
    fn await_triggers(&self, instance_id: &str, index: usize) {
        let Some(generation) = self.enter_step(instance_id, index, FlowState::AwaitingTransition(index))
        else {
            return;
        };
        let Some(scope) = self
            .inner
            .lock()
            .visible
            .as_ref()
            .and_then(|v| v.step_scope.clone())
        else {
            return;
        };
        debug!(instance_id, index, "Waiting for a trigger");

        let weak = self.weak.clone();
        let id = instance_id.to_string();
        Timer::repeating(
            &scope,
            format!("trigger-poll-{}", index),
            self.ctx.config().orchestrator.trigger_poll(),
            move || {
                let weak = weak.clone();
                let id = id.clone();
                async move {
                    let Some(orchestrator) = weak.upgrade() else {
                        return;
                    };
                    if let Some(actions) = orchestrator.recheck_triggers(&id, generation) {
                        // Runs outside the step scope, which the actions tear down.
                        tokio::spawn(async move {
                            orchestrator.fire_trigger(&id, generation, actions).await;
                        });
                    }
                }
            },
        );
    }

    /// Actions to run if the instance still waits on the same step and one
    /// of its triggers now passes.
    fn recheck_triggers(&self, instance_id: &str, generation: u64) -> Option<Vec<Action>> {
        let (flow, index) = {
            let inner = self.inner.lock();
            let visible = inner
                .visible
                .as_ref()
                .filter(|v| v.id == instance_id && v.generation == generation)?;
            match visible.state {
                FlowState::AwaitingTransition(index) => (visible.flow.clone(), index),
                _ => return None,
            }
        };
        self.passing_trigger(flow.step(index)?)
    }

    /// Run trigger actions unless another path already moved the instance.
    async fn fire_trigger(&self, instance_id: &str, generation: u64, actions: Vec<Action>) {
        {
            let mut inner = self.inner.lock();
            let Some(visible) = inner
                .visible
                .as_mut()
                .filter(|v| v.id == instance_id && v.generation == generation)
            else {
                return;
            };
            visible.generation += 1;
        }
        let hops = self.ctx.config().orchestrator.max_transition_hops;
        self.execute(instance_id, actions, hops).await;
    }

    /// Re-check a waiting step after the page URL changed.
    pub async fn handle_url_change(&self) {
        let pending = {
            let inner = self.inner.lock();
            inner.visible.as_ref().map(|v| (v.id.clone(), v.generation))
        };
        let Some((instance_id, generation)) = pending else {
            return;
        };
        if let Some(actions) = self.recheck_triggers(&instance_id, generation) {
            debug!(instance_id = %instance_id, "Trigger passed after URL change");
            self.fire_trigger(&instance_id, generation, actions).await;
        }
    }
}
