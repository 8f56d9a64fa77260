//! Engine facade.
//!
//! The [`Engine`] wires one [`EngineContext`] to an [`Orchestrator`] and a
//! [`LauncherManager`], evaluates flow starts on page load and keeps both in
//! step with the page through a watcher task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use wayfinder_protocols::{EngineError, FlowRef, SurfaceEvent};
use wayfinder_runloop::{Lifecycle, Timer};

use crate::context::EngineContext;
use crate::launcher::LauncherManager;
use crate::orchestrator::{Orchestrator, StartTrigger};

const ENGINE_SCOPE: &str = "engine";

/// Outcome of [`Engine::start`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StartReport {
    /// Flow picked up from the session store.
    pub resumed: Option<FlowRef>,
    /// Flows started immediately, with their start index.
    pub started: Vec<(FlowRef, usize)>,
    /// Flows whose auto-start is evaluated after a delay.
    pub scheduled: Vec<FlowRef>,
}

/// One engine per document session.
pub struct Engine {
    ctx: Arc<EngineContext>,
    orchestrator: Arc<Orchestrator>,
    launchers: Arc<LauncherManager>,
    started: AtomicBool,
}

impl Engine {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        let orchestrator = Orchestrator::new(ctx.clone());
        let launchers = Arc::new(LauncherManager::new(orchestrator.clone()));
        Self {
            ctx,
            orchestrator,
            launchers,
            started: AtomicBool::new(false),
        }
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn launchers(&self) -> &Arc<LauncherManager> {
        &self.launchers
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Authorize, then evaluate `flows` for the current page.
    ///
    /// Flows with an auto-start are evaluated after their delay; all other
    /// flows right away, in order. Launchers are evaluated last.
    pub async fn start(&self, flows: &[FlowRef]) -> Result<StartReport, EngineError> {
        if !self.ctx.auth().is_authorized().await {
            warn!("Engine not started: embed key rejected");
            return Err(EngineError::NotAuthorized);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Engine already started");
            return Ok(StartReport::default());
        }
        info!(session_id = %self.ctx.session_id(), flows = flows.len(), "Starting engine");

        let scope = self.ctx.spawner().scope(ENGINE_SCOPE);
        self.spawn_watcher(&scope);

        let mut report = StartReport {
            resumed: self.orchestrator.resume_from_session().await?,
            ..Default::default()
        };

        for flow_id in flows {
            let flow = match self
                .ctx
                .flows()
                .get_or_load(
                    flow_id,
                    self.ctx.loader(),
                    self.ctx.config().auth.environment_id.as_deref(),
                )
                .await
            {
                Ok(flow) => flow,
                Err(e) => {
                    debug!(flow_id = %flow_id, error = %e, "Skipping flow");
                    continue;
                }
            };

            match flow.setup.auto_start.as_ref().filter(|_| !flow.setup.force_start) {
                Some(auto) => {
                    let delay = auto
                        .delay_ms
                        .map(std::time::Duration::from_millis)
                        .unwrap_or_else(|| self.ctx.config().orchestrator.auto_start_delay());
                    self.schedule_start(&scope, flow_id.clone(), delay);
                    report.scheduled.push(flow_id.clone());
                }
                None => match self.orchestrator.evaluate_start(flow_id, StartTrigger::Evaluation).await {
                    Ok(Some(index)) => report.started.push((flow_id.clone(), index)),
                    Ok(None) => {}
                    Err(e) => warn!(flow_id = %flow_id, error = %e, "Flow start failed"),
                },
            }
        }

        self.launchers.evaluate_all();
        Ok(report)
    }

    /// Tear down every overlay, launcher and task.
    pub fn shutdown(&self) {
        info!(session_id = %self.ctx.session_id(), "Shutting down engine");
        self.launchers.shutdown();
        self.orchestrator.shutdown();
        self.ctx.spawner().cancel_all();
        self.started.store(false, Ordering::SeqCst);
    }

    fn schedule_start(&self, scope: &Lifecycle, flow_id: FlowRef, delay: std::time::Duration) {
        debug!(flow_id = %flow_id, ?delay, "Auto-start scheduled");
        let orchestrator = self.orchestrator.clone();
        Timer::once(scope, format!("auto-start:{}", flow_id), delay, move || {
            let orchestrator = orchestrator.clone();
            let flow_id = flow_id.clone();
            async move {
                match orchestrator
                    .evaluate_start(&flow_id, StartTrigger::Evaluation)
                    .await
                {
                    Ok(Some(index)) => debug!(flow_id = %flow_id, index, "Auto-started"),
                    Ok(None) => {}
                    Err(e) => warn!(flow_id = %flow_id, error = %e, "Auto-start failed"),
                }
            }
        });
    }

    /// Re-evaluate on URL changes, DOM mutations and flow starts/ends.
    fn spawn_watcher(&self, scope: &Lifecycle) {
        let mut page = self.ctx.surface().subscribe();
        let mut engine = self.ctx.subscribe();
        let orchestrator = self.orchestrator.clone();
        let launchers = self.launchers.clone();

        scope.spawn("watcher", async move {
            loop {
                tokio::select! {
                    event = page.recv() => match event {
                        Ok(SurfaceEvent::UrlChanged { url }) => {
                            debug!(url = %url, "Page URL changed");
                            orchestrator.handle_url_change().await;
                            if let Err(e) = orchestrator.resume_from_session().await {
                                warn!(error = %e, "Resume after URL change failed");
                            }
                            launchers.evaluate_all();
                        }
                        Ok(SurfaceEvent::Mutation) | Err(RecvError::Lagged(_)) => {
                            launchers.evaluate_all();
                        }
                        Ok(_) => {}
                        Err(RecvError::Closed) => break,
                    },
                    event = engine.recv() => match event {
                        Ok(event) if event.changes_active_flows() => launchers.evaluate_all(),
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(skipped, "Engine events lagged");
                            launchers.evaluate_all();
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        });
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
