//! Launcher attachment.
//!
//! A launcher is a persistent control that starts a flow. The
//! [`LauncherManager`] keeps the registered launchers in sync with their
//! visibility rules: pinned to a viewport corner, or following a page
//! element through the same resolver, tracker and positioner the
//! orchestrator uses for steps.

mod legacy;
mod visibility;

use std::collections::HashMap;
use std::sync::Arc;

use futures::future;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use wayfinder_anchor::{GeometryTracker, Observation, Positioner, TrackedSource};
use wayfinder_protocols::{
    AttachMode, Corner, HostSurface, LauncherConfig, OverlayHandle, OverlayKind,
    OverlayPlacement, OverlaySpec, Rect, Side, Size, SurfaceEvent, TargetSpec,
};
use wayfinder_runloop::{Lifecycle, Timer};

use crate::context::EngineContext;
use crate::error::{LauncherError, RegistryError};
use crate::events::EngineEvent;
use crate::orchestrator::{fixed_placement, Orchestrator, StartTrigger};
use crate::registry::LauncherRegistry;

pub use legacy::IngestLauncher;
pub use visibility::{dismissed_key, is_dismissed, HiddenReason, Visibility};

fn scope_key(launcher_id: &str) -> String {
    format!("launcher:{}", launcher_id)
}

/// Mounts, places and activates launchers.
pub struct LauncherManager {
    orchestrator: Arc<Orchestrator>,
    registry: LauncherRegistry,
    mounted: Mutex<HashMap<String, OverlayHandle>>,
    evaluation: Mutex<()>,
}

impl LauncherManager {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            registry: LauncherRegistry::new(),
            mounted: Mutex::new(HashMap::new()),
            evaluation: Mutex::new(()),
        }
    }

    fn ctx(&self) -> &Arc<EngineContext> {
        self.orchestrator.context()
    }

    /// Register a canonical launcher configuration.
    pub fn register(&self, config: LauncherConfig) -> Result<(), RegistryError> {
        let activation = config.activation.clone();
        let id = config.id.clone();
        self.registry.register(Arc::new(config))?;
        if let Some(step) = activation.start_step {
            self.orchestrator
                .set_launcher_start(activation.flow.clone(), step);
        }
        info!(launcher_id = %id, flow_id = %activation.flow, "Launcher registered");
        Ok(())
    }

    /// Ingest raw launcher JSON in either shape.
    ///
    /// Unparsable configurations disable the launcher and return `None`.
    pub fn register_value(&self, value: &Value) -> Option<String> {
        let config = match LauncherConfig::ingest(value) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Launcher disabled: unparsable configuration");
                return None;
            }
        };
        let id = config.id.clone();
        match self.register(config) {
            Ok(()) => Some(id),
            Err(e) => {
                warn!(launcher_id = %id, error = %e, "Launcher not registered");
                None
            }
        }
    }

    pub fn get(&self, launcher_id: &str) -> Option<Arc<LauncherConfig>> {
        self.registry.get(launcher_id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.registry.list_ids()
    }

    pub fn is_mounted(&self, launcher_id: &str) -> bool {
        self.mounted.lock().contains_key(launcher_id)
    }

    /// Overlay of a mounted launcher.
    pub fn overlay(&self, launcher_id: &str) -> Option<OverlayHandle> {
        self.mounted.lock().get(launcher_id).copied()
    }

    /// Current verdict of the launcher's visibility rules.
    pub fn visibility(&self, launcher_id: &str) -> Option<Visibility> {
        let config = self.registry.get(launcher_id)?;
        Some(visibility::evaluate(
            &config,
            self.ctx(),
            self.orchestrator.has_visible_flow(),
        ))
    }

    /// Mount or remove every launcher according to its rules.
    pub fn evaluate_all(&self) {
        let _guard = self.evaluation.lock();
        let tour_active = self.orchestrator.has_visible_flow();
        let configs: Vec<Arc<LauncherConfig>> = self.registry.iter().collect();
        for config in configs {
            let verdict = visibility::evaluate(&config, self.ctx(), tour_active);
            match (verdict, self.is_mounted(&config.id)) {
                (Visibility::Shown, false) => self.mount(&config),
                (Visibility::Hidden(reason), true) => {
                    debug!(launcher_id = %config.id, ?reason, "Launcher no longer visible");
                    self.unmount(&config.id);
                }
                _ => {}
            }
        }
    }

    /// Activate a shown launcher and start its flow.
    ///
    /// Returns the step index the flow started at, if it started.
    pub async fn activate(&self, launcher_id: &str) -> Result<Option<usize>, LauncherError> {
        let config = self
            .registry
            .get(launcher_id)
            .ok_or_else(|| LauncherError::Unknown(launcher_id.to_string()))?;
        if !self.is_mounted(launcher_id) {
            return Err(LauncherError::NotShown(launcher_id.to_string()));
        }
        let activation = &config.activation;
        info!(launcher_id, flow_id = %activation.flow, "Launcher activated");

        if activation.dismiss_after_first_activation {
            self.ctx().durable().set(&dismissed_key(launcher_id), "1");
            self.unmount(launcher_id);
        }

        let started = self
            .orchestrator
            .evaluate_start(
                &activation.flow,
                StartTrigger::Launcher {
                    step: activation.start_step.clone(),
                },
            )
            .await?;
        Ok(started)
    }

    /// Remove every mounted launcher.
    pub fn shutdown(&self) {
        let ids: Vec<String> = self.mounted.lock().keys().cloned().collect();
        for id in ids {
            self.unmount(&id);
        }
    }

    fn mount(&self, config: &LauncherConfig) {
        let ctx = self.ctx();
        let surface = ctx.surface().clone();
        let natural = Size::new(config.appearance.width, config.appearance.height);

        let overlay = match &config.attach {
            AttachMode::Fixed {
                corner,
                offset_x,
                offset_y,
            } => {
                let scope = ctx.spawner().scope(&scope_key(&config.id));
                let overlay = surface.mount_overlay(launcher_spec(config));
                pin_to_corner(
                    surface.clone(),
                    self.orchestrator.positioner().clone(),
                    overlay,
                    natural,
                    (*corner, *offset_x, *offset_y),
                    &scope,
                );
                overlay
            }
            AttachMode::ElementAttached {
                target,
                side,
                offset_x,
                offset_y,
            } => {
                let Some(source) = self.track_source(target) else {
                    debug!(
                        launcher_id = %config.id,
                        target = %target.describe(),
                        "Launcher target not on the page yet"
                    );
                    return;
                };
                let scope = ctx.spawner().scope(&scope_key(&config.id));
                let overlay = surface.mount_overlay(launcher_spec(config));
                let resolver = self.orchestrator.resolver().clone();
                let relocation = target.clone();
                let tracker = GeometryTracker::spawn_relocating(
                    surface.clone(),
                    source,
                    Box::new(move || resolver.resolve_once(&relocation).map(|found| found.element)),
                    &ctx.config().geometry,
                    &scope,
                );
                attach_to_element(
                    surface.clone(),
                    self.orchestrator.positioner().clone(),
                    tracker.clone(),
                    overlay,
                    natural,
                    (*side, *offset_x, *offset_y),
                    &scope,
                );
                Timer::repeating(
                    &scope,
                    "launcher-poll",
                    ctx.config().launcher.fallback_poll(),
                    move || {
                        tracker.refresh();
                        future::ready(())
                    },
                );
                overlay
            }
        };

        self.mounted.lock().insert(config.id.clone(), overlay);
        info!(launcher_id = %config.id, "Launcher shown");
        ctx.emit(EngineEvent::LauncherShown {
            launcher_id: config.id.clone(),
        });
    }

    fn unmount(&self, launcher_id: &str) {
        let Some(overlay) = self.mounted.lock().remove(launcher_id) else {
            return;
        };
        self.ctx().spawner().cancel(&scope_key(launcher_id));
        self.ctx().surface().remove_overlay(overlay);
        info!(launcher_id, "Launcher hidden");
        self.ctx().emit(EngineEvent::LauncherHidden {
            launcher_id: launcher_id.to_string(),
        });
    }

    fn track_source(&self, target: &TargetSpec) -> Option<TrackedSource> {
        if let TargetSpec::Absolute(absolute) = target {
            return Some(TrackedSource::Absolute(absolute.absolute_coordinates));
        }
        self.orchestrator
            .resolver()
            .resolve_once(target)
            .map(|resolution| TrackedSource::Element(resolution.element))
    }
}

fn launcher_spec(config: &LauncherConfig) -> OverlaySpec {
    let mut spec = OverlaySpec::new(OverlayKind::Launcher, config.id.as_str(), config.appearance.width);
    spec.content = json!({
        "kind": config.appearance.kind,
        "label": config.appearance.label,
        "height": config.appearance.height,
        "flow": config.activation.flow,
    });
    spec
}

/// Place at a corner now and again on every resize.
fn pin_to_corner(
    surface: Arc<dyn HostSurface>,
    positioner: Positioner,
    overlay: OverlayHandle,
    natural: Size,
    (corner, offset_x, offset_y): (Corner, f64, f64),
    scope: &Lifecycle,
) {
    let place = move |surface: &dyn HostSurface| {
        let size = surface.overlay_size(overlay).unwrap_or(natural);
        let position = positioner.corner(corner, size, surface.viewport(), offset_x, offset_y);
        surface.place_overlay(overlay, fixed_placement(position));
    };
    place(surface.as_ref());

    let mut events = surface.subscribe();
    scope.spawn("launcher-resize", async move {
        loop {
            match events.recv().await {
                Ok(SurfaceEvent::Resize) | Err(RecvError::Lagged(_)) => place(surface.as_ref()),
                Ok(_) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Follow the tracked rectangle with a translate offset.
///
/// Hidden while the target is gone; shown again once the tracker
/// relocates it.
fn attach_to_element(
    surface: Arc<dyn HostSurface>,
    positioner: Positioner,
    tracker: Arc<GeometryTracker>,
    overlay: OverlayHandle,
    natural: Size,
    (side, offset_x, offset_y): (Side, f64, f64),
    scope: &Lifecycle,
) {
    let apply = move |surface: &dyn HostSurface, rect: Option<Rect>| {
        let Some(rect) = rect else {
            surface.set_overlay_visible(overlay, false);
            return;
        };
        let size = surface.overlay_size(overlay).unwrap_or(natural);
        let position = positioner.place(rect, size, side, surface.viewport());
        surface.place_overlay(
            overlay,
            OverlayPlacement {
                left: position.left + offset_x,
                top: position.top + offset_y,
                side: Some(position.side),
                tail: None,
                translate: true,
            },
        );
        surface.set_overlay_visible(overlay, true);
    };

    apply(surface.as_ref(), tracker.current());
    let mut changes = tracker.subscribe();
    scope.spawn("launcher-placement", async move {
        while changes.changed().await.is_ok() {
            let rect = *changes.borrow_and_update();
            apply(surface.as_ref(), rect);
        }
    });
}

#[cfg(test)]
#[path = "launcher_tests.rs"]
mod tests;
