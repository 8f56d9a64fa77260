//! Launcher visibility rules.

use serde::Serialize;
use wayfinder_protocols::{KeyValueStore, LauncherConfig};

use crate::context::EngineContext;
use crate::url_pattern::matches_any;

/// Durable flag set once a self-dismissing launcher has been activated.
pub fn dismissed_key(launcher_id: &str) -> String {
    format!("launcher_dismissed:{}", launcher_id)
}

pub fn is_dismissed(store: &dyn KeyValueStore, launcher_id: &str) -> bool {
    store.contains(&dismissed_key(launcher_id))
}

/// Why a launcher is off screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HiddenReason {
    Dismissed,
    NotIncluded,
    Excluded,
    TourActive,
    Conditions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Shown,
    Hidden(HiddenReason),
}

impl Visibility {
    pub fn is_shown(&self) -> bool {
        matches!(self, Visibility::Shown)
    }
}

/// Evaluate every rule of `config` against the current page.
///
/// `tour_active` is whether a flow step is on screen.
pub fn evaluate(config: &LauncherConfig, ctx: &EngineContext, tour_active: bool) -> Visibility {
    let rules = &config.visibility;
    if is_dismissed(ctx.durable(), &config.id) {
        return Visibility::Hidden(HiddenReason::Dismissed);
    }
    let url = ctx.surface().current_url();
    if !rules.include.is_empty() && !matches_any(&rules.include, &url) {
        return Visibility::Hidden(HiddenReason::NotIncluded);
    }
    if matches_any(&rules.exclude, &url) {
        return Visibility::Hidden(HiddenReason::Excluded);
    }
    if tour_active && !rules.show_while_tour_active {
        return Visibility::Hidden(HiddenReason::TourActive);
    }
    if !ctx.evaluate(&rules.show_conditions) {
        return Visibility::Hidden(HiddenReason::Conditions);
    }
    Visibility::Shown
}
