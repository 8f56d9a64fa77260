//! Action execution.

use std::fmt::Display;

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, info, warn};
use wayfinder_protocols::{dismiss_first, Action, ActionError, Block, EngineError, FlowRef, StepRef};

use super::start::append_marker;
use super::Orchestrator;
use crate::events::{EndReason, EngineEvent};

impl Orchestrator {
    /// Activate a button of the visible step.
    pub async fn press_button(&self, block_id: &str) -> Result<(), EngineError> {
        let (instance_id, block) = self.visible_block(block_id)?;
        let Block::Button {
            actions,
            dismiss_first: per_button,
            ..
        } = block
        else {
            return Err(ActionError::BlockNotFound(block_id.to_string()).into());
        };
        debug!(block_id, actions = actions.len(), "Button pressed");
        let ordered = self.order(actions, per_button);
        self.run_batch(&instance_id, ordered).await;
        Ok(())
    }

    /// Answer a question of the visible step.
    ///
    /// The chosen option's actions run first, then the question's own. An
    /// answer matching no option only runs the question's actions.
    pub async fn answer_question(&self, block_id: &str, answer: &str) -> Result<(), EngineError> {
        let (instance_id, block) = self.visible_block(block_id)?;
        let Block::Question {
            options, actions, ..
        } = block
        else {
            return Err(ActionError::BlockNotFound(block_id.to_string()).into());
        };
        let mut batch: Vec<Action> = options
            .into_iter()
            .find(|o| o.value == answer)
            .map(|o| o.actions)
            .unwrap_or_default();
        batch.extend(actions);
        debug!(block_id, answer, actions = batch.len(), "Question answered");
        let ordered = self.order(batch, None);
        self.run_batch(&instance_id, ordered).await;
        Ok(())
    }

    /// Execute actions on behalf of the visible instance, if any.
    pub async fn submit(&self, actions: Vec<Action>) {
        let instance_id = self.visible_instance_id().unwrap_or_default();
        let ordered = self.order(actions, None);
        self.run_batch(&instance_id, ordered).await;
    }

    /// Dismiss the visible flow.
    pub async fn dismiss(&self) -> Result<(), EngineError> {
        let instance_id = self
            .visible_instance_id()
            .ok_or(ActionError::NoVisibleInstance)?;
        self.run_batch(&instance_id, vec![Action::dismiss()]).await;
        Ok(())
    }

    fn visible_block(&self, block_id: &str) -> Result<(String, Block), ActionError> {
        let inner = self.inner.lock();
        let visible = inner.visible.as_ref().ok_or(ActionError::NoVisibleInstance)?;
        let block = visible
            .flow
            .step(visible.current)
            .and_then(|step| step.find_block(block_id))
            .ok_or_else(|| ActionError::BlockNotFound(block_id.to_string()))?;
        Ok((visible.id.clone(), block.clone()))
    }

    fn order(&self, actions: Vec<Action>, per_block: Option<bool>) -> Vec<Action> {
        if per_block.unwrap_or(self.ctx.config().orchestrator.prioritize_dismiss) {
            dismiss_first(&actions)
        } else {
            actions
        }
    }

    async fn run_batch(&self, instance_id: &str, actions: Vec<Action>) {
        let hops = self.ctx.config().orchestrator.max_transition_hops;
        self.execute(instance_id, actions, hops).await;
    }

    /// Execute a batch in order.
    ///
    /// A failing action is reported and skipped; a same-tab navigation ends
    /// the batch.
    pub(super) fn execute<'a>(
        &'a self,
        instance_id: &'a str,
        actions: Vec<Action>,
        budget: usize,
    ) -> BoxFuture<'a, ()> {
        async move {
            for action in actions {
                let flow_id = self.instance_flow(instance_id).map(|f| f.id.clone());
                match &action {
                    Action::Dismiss { close_all } => {
                        if !self.end_visible(instance_id, EndReason::Dismissed, *close_all) {
                            self.action_failed(flow_id, &action, ActionError::NoVisibleInstance);
                        }
                    }
                    Action::GoToStep { step } => {
                        let Some(flow) = self.instance_flow(instance_id) else {
                            self.action_failed(flow_id, &action, ActionError::NoVisibleInstance);
                            continue;
                        };
                        match (flow.index_of(step), step) {
                            (Some(index), _) => self.transition(instance_id, index, budget).await,
                            (None, StepRef::Index(index)) if *index >= flow.len() => {
                                debug!(flow_id = %flow.id, index, "Jump past the last step");
                                self.end_visible(instance_id, EndReason::Completed, false);
                            }
                            (None, _) => self.action_failed(
                                flow_id,
                                &action,
                                ActionError::StepNotFound(step.to_string()),
                            ),
                        }
                    }
                    Action::Navigate {
                        url,
                        new_tab,
                        forced_step,
                    } => {
                        let destination = match forced_step {
                            Some(step) => append_marker(
                                url,
                                &self.ctx.config().orchestrator.forced_step_param,
                                step,
                            ),
                            None => url.clone(),
                        };
                        if *new_tab {
                            info!(url = %destination, "Opening new tab");
                            self.ctx.surface().open_tab(&destination);
                            continue;
                        }
                        info!(url = %destination, "Navigating away");
                        self.ctx.surface().navigate(&destination);
                        self.end_visible(instance_id, EndReason::Navigated, true);
                        return;
                    }
                    Action::StartFlow { flow, step_id } => {
                        let step = step_id.clone().map(StepRef::Id);
                        if let Err(e) = self.launch(flow, step.as_ref()).await {
                            self.action_failed(flow_id, &action, e);
                        }
                    }
                    Action::EvalScript { source } => {
                        if let Err(e) = self.ctx.surface().eval_script(source) {
                            self.action_failed(flow_id, &action, ActionError::from(e));
                        }
                    }
                    Action::Unrecognized => {
                        self.action_failed(flow_id, &action, ActionError::Unrecognized);
                    }
                }
            }
        }
        .boxed()
    }

    fn action_failed(&self, flow_id: Option<FlowRef>, action: &Action, error: impl Display) {
        warn!(flow_id = ?flow_id, action = action.kind(), error = %error, "Action failed");
        self.ctx.emit(EngineEvent::ActionFailed {
            flow_id,
            action: action.kind().to_string(),
            error: error.to_string(),
        });
    }
}
