//! Step rendering.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};
use wayfinder_anchor::{GeometryTracker, Observation, Positioner, TrackedSource};
use wayfinder_protocols::{
    Block, FlowRef, HostSurface, OverlayHandle, OverlayKind, OverlayPlacement, OverlaySpec,
    PositionResult, Rect, Side, Size, Step, StepPosition, StepType, TargetSpec,
};
use wayfinder_runloop::Lifecycle;

use super::state::FlowState;
use super::Orchestrator;
use crate::events::EngineEvent;

const CORNER_OFFSET: f64 = 20.0;
const FALLBACK_HEIGHT: f64 = 160.0;

/// Placement next to a target, with side and tail.
pub(crate) fn anchored_placement(position: PositionResult) -> OverlayPlacement {
    OverlayPlacement {
        left: position.left,
        top: position.top,
        side: Some(position.side),
        tail: position.tail,
        translate: false,
    }
}

/// Placement without tail, e.g. centred or pinned to a corner.
pub(crate) fn fixed_placement(position: PositionResult) -> OverlayPlacement {
    OverlayPlacement::at(position.left, position.top)
}

struct StepMount {
    generation: u64,
    scope: Lifecycle,
    hidden: Arc<AtomicBool>,
    flow_id: FlowRef,
}

impl Orchestrator {
    /// Draw step `index` of the instance.
    ///
    /// Targets are resolved before anything is mounted. A target that
    /// cannot be found degrades to a centred overlay.
    pub(super) async fn render_step(&self, instance_id: &str, index: usize, step: &Step) {
        let Some(mount) = self.mount_point(instance_id, index) else {
            return;
        };

        let anchor = match self.anchor_target(step) {
            Some(target) => self.track_source(target).await.map(|source| (source, target)),
            None => None,
        };
        let mut beacons = Vec::new();
        for block in &step.blocks {
            if let Block::Beacon { target, .. } = block {
                let beacon = match target {
                    Some(target) => self.track_source(target).await.map(|source| (source, target)),
                    None => anchor,
                };
                beacons.extend(beacon);
            }
        }

        if !self.is_current(instance_id, mount.generation) {
            debug!(instance_id, index, "Step superseded while resolving");
            return;
        }

        let surface = self.ctx.surface().clone();
        let mut overlays = Vec::new();

        if step.ui.backdrop {
            let mut spec = OverlaySpec::new(OverlayKind::Backdrop, mount.flow_id.as_str(), 0.0);
            spec.step_id = Some(step.id.clone());
            let backdrop = surface.mount_overlay(spec);
            surface.place_overlay(backdrop, OverlayPlacement::at(0.0, 0.0));
            overlays.push(backdrop);
        }

        let main = surface.mount_overlay(overlay_spec(step, &mount.flow_id));
        overlays.push(main);
        let fallback = Size::new(step.ui.width, FALLBACK_HEIGHT);

        let anchored = match anchor {
            Some((source, target)) => {
                let tracker = self.tracker(source, target, &mount.scope);
                follow(
                    surface.clone(),
                    self.positioner.clone(),
                    tracker,
                    main,
                    fallback,
                    Placement::Beside(step.ui.position.preferred_side()),
                    mount.hidden.clone(),
                    &mount.scope,
                );
                true
            }
            None => {
                let size = surface.overlay_size(main).unwrap_or(fallback);
                let position = self.unanchored_position(step, size, surface.as_ref());
                surface.place_overlay(main, fixed_placement(position));
                false
            }
        };

        for (beacon_source, beacon_target) in beacons {
            let mut spec = OverlaySpec::new(OverlayKind::Beacon, mount.flow_id.as_str(), 0.0);
            spec.step_id = Some(step.id.clone());
            let beacon = surface.mount_overlay(spec);
            overlays.push(beacon);
            let tracker = self.tracker(beacon_source, beacon_target, &mount.scope);
            follow(
                surface.clone(),
                self.positioner.clone(),
                tracker,
                beacon,
                Size::new(16.0, 16.0),
                Placement::Centered,
                mount.hidden.clone(),
                &mount.scope,
            );
        }

        if mount.hidden.load(Ordering::SeqCst) {
            for overlay in &overlays {
                surface.set_overlay_visible(*overlay, false);
            }
        }

        if !self.commit_overlays(instance_id, mount.generation, &overlays) {
            debug!(instance_id, index, "Step superseded while mounting");
            for overlay in overlays {
                surface.remove_overlay(overlay);
            }
            return;
        }

        info!(flow_id = %mount.flow_id, index, step_id = %step.id, anchored, "Step rendered");
        self.ctx.emit(EngineEvent::StepRendered {
            flow_id: mount.flow_id,
            step_index: index,
            step_id: step.id.clone(),
            anchored,
        });
    }

    fn mount_point(&self, instance_id: &str, index: usize) -> Option<StepMount> {
        let generation = self.enter_step(instance_id, index, FlowState::Rendering(index))?;
        let inner = self.inner.lock();
        let visible = inner.visible.as_ref().filter(|v| v.id == instance_id)?;
        Some(StepMount {
            generation,
            scope: visible.step_scope.clone()?,
            hidden: visible.hidden.clone(),
            flow_id: visible.flow_id().clone(),
        })
    }

    fn commit_overlays(&self, instance_id: &str, generation: u64, overlays: &[OverlayHandle]) -> bool {
        let mut inner = self.inner.lock();
        match inner
            .visible
            .as_mut()
            .filter(|v| v.id == instance_id && v.generation == generation)
        {
            Some(visible) => {
                visible.overlays.extend_from_slice(overlays);
                true
            }
            None => false,
        }
    }

    /// Target the step anchors to. Bubbles pinned to a corner never anchor.
    fn anchor_target<'s>(&self, step: &'s Step) -> Option<&'s TargetSpec> {
        if !step.is_anchored() {
            return None;
        }
        if step.step_type == StepType::Bubble && step.ui.position.corner().is_some() {
            return None;
        }
        step.target.as_ref()
    }

    async fn track_source(&self, target: &TargetSpec) -> Option<TrackedSource> {
        if let TargetSpec::Absolute(absolute) = target {
            return Some(TrackedSource::Absolute(absolute.absolute_coordinates));
        }
        match self.resolver.resolve(target).await {
            Ok(resolved) => Some(TrackedSource::Element(resolved.element)),
            Err(e) => {
                warn!(target = %target.describe(), error = %e, "Rendering without anchor");
                None
            }
        }
    }

    /// Tracker that re-resolves `target` when the page replaces its element.
    fn tracker(&self, source: TrackedSource, target: &TargetSpec, scope: &Lifecycle) -> Arc<GeometryTracker> {
        let resolver = self.resolver.clone();
        let target = target.clone();
        GeometryTracker::spawn_relocating(
            self.ctx.surface().clone(),
            source,
            Box::new(move || resolver.resolve_once(&target).map(|found| found.element)),
            &self.ctx.config().geometry,
            scope,
        )
    }

    fn unanchored_position(&self, step: &Step, size: Size, surface: &dyn HostSurface) -> PositionResult {
        let viewport = surface.viewport();
        match (step.step_type, step.ui.position.corner()) {
            (StepType::Modal, _) | (_, None) => self.positioner.center(size, viewport),
            (_, Some(corner)) => {
                self.positioner
                    .corner(corner, size, viewport, CORNER_OFFSET, CORNER_OFFSET)
            }
        }
    }
}

fn overlay_kind(step_type: StepType) -> OverlayKind {
    match step_type {
        StepType::Modal => OverlayKind::Modal,
        StepType::Tooltip => OverlayKind::Tooltip,
        StepType::Bubble => OverlayKind::Bubble,
    }
}

fn overlay_spec(step: &Step, flow_id: &FlowRef) -> OverlaySpec {
    let blocks: Vec<&Block> = step
        .renderable_blocks()
        .filter(|b| !matches!(b, Block::Beacon { .. }))
        .collect();
    let mut spec = OverlaySpec::new(overlay_kind(step.step_type), flow_id.as_str(), step.ui.width);
    spec.step_id = Some(step.id.clone());
    spec.block_target_clicks = step.ui.block_target_clicks;
    spec.content = serde_json::json!({
        "blocks": blocks,
        "center": step.ui.position == StepPosition::Center,
    });
    spec
}

#[derive(Clone, Copy)]
enum Placement {
    Beside(Side),
    Centered,
}

/// Keep `overlay` attached to the tracked rectangle.
///
/// While the target is gone a step overlay is centred and a beacon is
/// hidden. Both return to the target once the tracker finds it again.
/// Nothing is revealed while the owning flow is paused.
#[allow(clippy::too_many_arguments)]
fn follow(
    surface: Arc<dyn HostSurface>,
    positioner: Positioner,
    tracker: Arc<GeometryTracker>,
    overlay: OverlayHandle,
    fallback: Size,
    placement: Placement,
    hidden: Arc<AtomicBool>,
    scope: &Lifecycle,
) {
    let apply = move |surface: &dyn HostSurface, rect: Option<Rect>| {
        let size = surface.overlay_size(overlay).unwrap_or(fallback);
        let next = match (placement, rect) {
            (Placement::Beside(side), Some(rect)) => {
                anchored_placement(positioner.place(rect, size, side, surface.viewport()))
            }
            (Placement::Beside(_), None) => {
                debug!(overlay = overlay.0, "Anchor target gone, centring overlay");
                fixed_placement(positioner.center(size, surface.viewport()))
            }
            (Placement::Centered, Some(rect)) => {
                let (cx, cy) = rect.center();
                OverlayPlacement::at(cx - size.width / 2.0, cy - size.height / 2.0)
            }
            (Placement::Centered, None) => {
                debug!(overlay = overlay.0, "Beacon target gone, hiding beacon");
                surface.set_overlay_visible(overlay, false);
                return;
            }
        };
        surface.place_overlay(overlay, next);
        if !hidden.load(Ordering::SeqCst) {
            surface.set_overlay_visible(overlay, true);
        }
    };

    apply(surface.as_ref(), tracker.current());
    let mut changes = tracker.subscribe();
    scope.spawn("placement", async move {
        while changes.changed().await.is_ok() {
            let rect = *changes.borrow_and_update();
            apply(surface.as_ref(), rect);
        }
        drop(tracker);
    });
}
