//! Start precedence and flow entry.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use url::Url;
use wayfinder_protocols::{EngineError, Flow, FlowRef, Frequency, StepRef};

use super::state::{FlowInstance, FlowState};
use super::{active_step_key, flow_url_key, Orchestrator, ACTIVE_FLOW_KEY};
use crate::events::EngineEvent;

/// Durable one-shot forced step, written by [`Orchestrator::force_next_start`].
const FORCED_STEP_KEY: &str = "forced_step";

fn auto_started_key(flow: &FlowRef) -> String {
    format!("auto_started:{}", flow)
}

/// Who asked for the start evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartTrigger {
    /// Page load or URL change.
    Evaluation,
    /// A launcher was activated.
    Launcher { step: Option<StepRef> },
}

/// Why a flow was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartReason {
    ForcedMarker,
    Launcher,
    ForceStart,
    AutoStart,
    Explicit,
    Resumed,
}

impl Orchestrator {
    /// Decide whether `flow` starts now, and start it.
    ///
    /// Precedence, first applicable wins: forced marker, launcher start
    /// step, force-start, auto-start. A launcher start step only applies
    /// while force-start or auto-start holds, or when the launcher itself
    /// was activated. Temporary-hide conditions suppress the launcher and
    /// auto-start levels. Returns the start index, or `None` when nothing
    /// applied.
    pub async fn evaluate_start(
        &self,
        flow: &FlowRef,
        trigger: StartTrigger,
    ) -> Result<Option<usize>, EngineError> {
        if !self.ctx.auth().is_authorized().await {
            return Err(EngineError::NotAuthorized);
        }

        self.inner.lock().evaluating.insert(flow.clone());
        let loaded = self.load(flow).await;
        let decision = loaded
            .as_ref()
            .ok()
            .and_then(|flow| self.decide_start(flow, &trigger));
        self.inner.lock().evaluating.remove(flow);
        let flow = loaded?;

        match decision {
            Some((index, reason)) => {
                self.begin(flow, index, reason).await?;
                Ok(Some(index))
            }
            None => {
                debug!(flow_id = %flow.id, ?trigger, "No start condition applies");
                Ok(None)
            }
        }
    }

    /// Start `flow` unconditionally, e.g. from a `startFlow` action.
    pub async fn launch(&self, flow: &FlowRef, step: Option<&StepRef>) -> Result<(), EngineError> {
        if !self.ctx.auth().is_authorized().await {
            return Err(EngineError::NotAuthorized);
        }
        let flow = self.load(flow).await?;
        let index = step.and_then(|s| flow.index_of(s)).unwrap_or(0);
        self.begin(flow, index, StartReason::Explicit).await
    }

    /// Resume the flow recorded in the session store.
    ///
    /// Only applies when the page is still the one the flow was last shown
    /// on. Returns the resumed flow.
    pub async fn resume_from_session(&self) -> Result<Option<FlowRef>, EngineError> {
        if !self.ctx.auth().is_authorized().await {
            return Err(EngineError::NotAuthorized);
        }
        let session = self.ctx.session();
        let Some(flow) = session.get(ACTIVE_FLOW_KEY).map(FlowRef::new) else {
            return Ok(None);
        };
        let url = self.ctx.surface().current_url();
        if session.get(&flow_url_key(&flow)).as_deref() != Some(url.as_str()) {
            debug!(flow_id = %flow, "Page changed since the flow was shown, not resuming");
            return Ok(None);
        }
        if self.visible_flow().as_ref() == Some(&flow) {
            return Ok(None);
        }

        let index = session
            .get(&active_step_key(&flow))
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(0);
        let loaded = self.load(&flow).await?;
        if index >= loaded.len() {
            debug!(flow_id = %flow, index, "Saved step no longer exists");
            return Ok(None);
        }
        self.begin(loaded, index, StartReason::Resumed).await?;
        Ok(Some(flow))
    }

    /// Make the next evaluation of a flow containing `step` start there.
    pub fn force_next_start(&self, step: &StepRef) {
        self.ctx.durable().set(FORCED_STEP_KEY, &step.to_string());
    }

    async fn load(&self, flow: &FlowRef) -> Result<Arc<Flow>, EngineError> {
        let environment = self.ctx.config().auth.environment_id.as_deref();
        Ok(self
            .ctx
            .flows()
            .get_or_load(flow, self.ctx.loader(), environment)
            .await?)
    }

    fn decide_start(&self, flow: &Flow, trigger: &StartTrigger) -> Option<(usize, StartReason)> {
        if let Some(index) = self.claim_marker(flow) {
            return Some((index, StartReason::ForcedMarker));
        }

        let setup = &flow.setup;
        let hidden = !setup.temporary_hide.is_empty() && self.ctx.evaluate(&setup.temporary_hide);
        if hidden {
            debug!(flow_id = %flow.id, "Temporary hide conditions hold");
        }

        if let StartTrigger::Launcher { step } = trigger {
            if !hidden {
                let index = step.as_ref().and_then(|s| flow.index_of(s)).unwrap_or(0);
                return Some((index, StartReason::Launcher));
            }
        }

        let auto = setup.auto_start.as_ref().filter(|_| !hidden);
        let auto_holds = auto.is_some_and(|auto| {
            self.ctx.evaluate(&auto.conditions) && self.frequency_allows(&flow.id, auto.frequency)
        });
        if !setup.force_start && !auto_holds {
            return None;
        }
        if let Some(auto) = auto.filter(|_| auto_holds && !setup.force_start) {
            self.record_auto_start(&flow.id, auto.frequency);
        }

        let launcher_start = if hidden {
            None
        } else {
            self.launcher_start(flow)
        };
        Some(match launcher_start {
            Some(index) => (index, StartReason::Launcher),
            None if setup.force_start => (0, StartReason::ForceStart),
            None => (0, StartReason::AutoStart),
        })
    }

    /// Start step configured by a launcher of `flow`, if any.
    fn launcher_start(&self, flow: &Flow) -> Option<usize> {
        let inner = self.inner.lock();
        inner
            .launcher_starts
            .get(&flow.id)
            .and_then(|step| flow.index_of(step))
    }

    /// Start step a launcher configured for `flow`, used when the flow
    /// starts on its own.
    pub fn set_launcher_start(&self, flow: FlowRef, step: StepRef) {
        self.inner.lock().launcher_starts.insert(flow, step);
    }

    fn frequency_allows(&self, flow: &FlowRef, frequency: Frequency) -> bool {
        let key = auto_started_key(flow);
        match frequency {
            Frequency::Always => true,
            Frequency::OncePerSession => !self.ctx.session().contains(&key),
            Frequency::OncePerUser => !self.ctx.durable().contains(&key),
        }
    }

    fn record_auto_start(&self, flow: &FlowRef, frequency: Frequency) {
        let key = auto_started_key(flow);
        match frequency {
            Frequency::Always => {}
            Frequency::OncePerSession => self.ctx.session().set(&key, "1"),
            Frequency::OncePerUser => self.ctx.durable().set(&key, "1"),
        }
    }

    /// Start index from the pending forced marker, consuming it.
    fn claim_marker(&self, flow: &Flow) -> Option<usize> {
        self.read_marker_once();
        let mut inner = self.inner.lock();
        let index = inner
            .marker
            .pending
            .as_ref()
            .and_then(|marker| flow.index_of(marker))?;
        inner.marker.pending = None;
        info!(flow_id = %flow.id, index, "Forced step marker applied");
        Some(index)
    }

    /// Pick up the marker from the URL or the durable store, once.
    fn read_marker_once(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.marker.read {
                return;
            }
            inner.marker.read = true;
        }

        let surface = self.ctx.surface();
        let param = &self.ctx.config().orchestrator.forced_step_param;
        let from_url = strip_query_param(&surface.current_url(), param).map(|(clean, value)| {
            surface.replace_url(&clean);
            value
        });
        let raw = from_url.or_else(|| self.ctx.durable().take(FORCED_STEP_KEY));
        let marker = raw.as_deref().and_then(StepRef::parse);
        if let Some(marker) = &marker {
            debug!(%marker, "Forced step marker read");
        }
        self.inner.lock().marker.pending = marker;
    }

    /// Make `flow` the visible flow at `index`.
    ///
    /// A different visible flow is paused and pushed; the same flow restarts
    /// in place.
    pub(super) async fn begin(
        &self,
        flow: Arc<Flow>,
        index: usize,
        reason: StartReason,
    ) -> Result<(), EngineError> {
        if !self.ctx.start_lock().try_acquire(flow.id.as_str()) {
            debug!(flow_id = %flow.id, "Start suppressed by lock");
            return Err(EngineError::StartLocked(flow.id.to_string()));
        }

        let surface = self.ctx.surface().clone();
        let mut events = Vec::new();
        let instance_id = {
            let mut inner = self.inner.lock();
            if let Some(mut visible) = inner.visible.take() {
                if visible.flow_id() == &flow.id {
                    debug!(flow_id = %flow.id, "Restarting flow in place");
                    visible.clear_step(surface.as_ref());
                    self.ctx.spawner().cancel(&visible.id);
                } else {
                    visible.set_hidden(surface.as_ref(), true);
                    info!(flow_id = %visible.flow_id(), step_index = visible.current, "Flow paused");
                    events.push(EngineEvent::FlowPaused {
                        flow_id: visible.flow_id().clone(),
                    });
                    inner.stack.push(visible);
                }
            }
            if let Some(stale) = inner.stack.remove(&flow.id) {
                let mut instance = stale.instance;
                instance.clear_step(surface.as_ref());
                self.ctx.spawner().cancel(&instance.id);
            }

            let mut instance = FlowInstance::new(flow.clone());
            instance.current = index;
            instance.state = FlowState::Rendering(index);
            inner.ended.remove(&flow.id);
            let id = instance.id.clone();
            inner.visible = Some(instance);
            id
        };

        info!(flow_id = %flow.id, instance_id = %instance_id, index, ?reason, "Flow started");
        events.push(EngineEvent::FlowStarted {
            flow_id: flow.id.clone(),
            instance_id: instance_id.clone(),
            step_index: index,
        });
        for event in events {
            self.ctx.emit(event);
        }

        let hops = self.ctx.config().orchestrator.max_transition_hops;
        self.transition(&instance_id, index, hops).await;
        Ok(())
    }
}

/// Remove `param` from the query of `url`, returning the cleaned URL and the
/// first value found.
pub(crate) fn strip_query_param(url: &str, param: &str) -> Option<(String, String)> {
    let mut parsed = Url::parse(url).ok()?;
    let mut value = None;
    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter_map(|(k, v)| {
            if k == param {
                if value.is_none() {
                    value = Some(v.into_owned());
                }
                None
            } else {
                Some((k.into_owned(), v.into_owned()))
            }
        })
        .collect();
    let value = value?;

    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(kept);
    }
    Some((parsed.to_string(), value))
}

/// Append `param=step` to the query of `url`, before any fragment.
pub(crate) fn append_marker(url: &str, param: &str, step: &StepRef) -> String {
    let (head, fragment) = match url.split_once('#') {
        Some((head, fragment)) => (head, Some(fragment)),
        None => (url, None),
    };
    let separator = if head.ends_with('?') || head.ends_with('&') {
        ""
    } else if head.contains('?') {
        "&"
    } else {
        "?"
    };
    let value: String = url::form_urlencoded::byte_serialize(step.to_string().as_bytes()).collect();

    let mut out = format!("{}{}{}={}", head, separator, param, value);
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_query_param() {
        let (clean, value) = strip_query_param("https://a.com/app?wf_step=2", "wf_step").unwrap();
        assert_eq!(clean, "https://a.com/app");
        assert_eq!(value, "2");

        let (clean, value) =
            strip_query_param("https://a.com/app?x=1&wf_step=intro#top", "wf_step").unwrap();
        assert_eq!(clean, "https://a.com/app?x=1#top");
        assert_eq!(value, "intro");

        assert!(strip_query_param("https://a.com/app?x=1", "wf_step").is_none());
        assert!(strip_query_param("not a url", "wf_step").is_none());
    }

    #[test]
    fn test_append_marker_before_fragment() {
        let step = StepRef::Index(3);
        assert_eq!(
            append_marker("https://a.com/app", "wf_step", &step),
            "https://a.com/app?wf_step=3"
        );
        assert_eq!(
            append_marker("https://a.com/app?x=1#section", "wf_step", &step),
            "https://a.com/app?x=1&wf_step=3#section"
        );
        assert_eq!(
            append_marker("/next?", "wf_step", &StepRef::Id("a b".to_string())),
            "/next?wf_step=a+b"
        );
    }
}
