//! Canonical launcher model.
//!
//! Legacy JSON shapes are converted into this model by the adapter in
//! `wayfinder-core::launcher::legacy`; nothing downstream sees them.

use serde::{Deserialize, Serialize};

use super::action::{FlowRef, StepRef};
use super::condition::Condition;
use super::geometry::{Corner, Side};
use super::target::TargetSpec;

/// Launcher configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LauncherConfig {
    pub id: String,
    #[serde(default)]
    pub appearance: Appearance,
    pub attach: AttachMode,
    #[serde(default)]
    pub visibility: VisibilityRules,
    pub activation: Activation,
}

/// Visual form of the launcher control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appearance {
    #[serde(default)]
    pub kind: LauncherKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default = "default_launcher_size")]
    pub width: f64,
    #[serde(default = "default_launcher_size")]
    pub height: f64,
}

fn default_launcher_size() -> f64 {
    48.0
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            kind: LauncherKind::default(),
            label: None,
            width: default_launcher_size(),
            height: default_launcher_size(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LauncherKind {
    #[default]
    Button,
    Icon,
    Beacon,
}

/// Where the launcher lives on screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum AttachMode {
    /// Pinned to a viewport corner.
    #[serde(rename_all = "camelCase")]
    Fixed {
        #[serde(default)]
        corner: Corner,
        #[serde(default = "default_corner_offset")]
        offset_x: f64,
        #[serde(default = "default_corner_offset")]
        offset_y: f64,
    },
    /// Follows a page element.
    #[serde(rename_all = "camelCase")]
    ElementAttached {
        target: TargetSpec,
        #[serde(default)]
        side: Side,
        #[serde(default)]
        offset_x: f64,
        #[serde(default)]
        offset_y: f64,
    },
}

fn default_corner_offset() -> f64 {
    20.0
}

/// Conditions under which the launcher is shown.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityRules {
    /// URL patterns the page must match (any); empty means all pages.
    #[serde(default)]
    pub include: Vec<String>,
    /// URL patterns that hide the launcher (any).
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub show_conditions: Vec<Condition>,
    /// Keep the launcher visible while one of its tours is running.
    #[serde(default)]
    pub show_while_tour_active: bool,
}

/// What happens when the launcher is activated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activation {
    pub flow: FlowRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_step: Option<StepRef>,
    #[serde(default)]
    pub dismiss_after_first_activation: bool,
}
