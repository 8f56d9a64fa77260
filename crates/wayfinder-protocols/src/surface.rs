//! Host render surface protocol.
//!
//! The engine never touches a concrete page. Everything it needs - element
//! queries, geometry, change notifications and overlay insertion - goes
//! through [`HostSurface`].

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::{ScriptError, SurfaceError};
use crate::types::{Rect, ScrollOffset, Side, Size, TailPosition, ViewportInfo};

/// Opaque reference to a page element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementHandle(pub u64);

/// Opaque reference to a mounted overlay node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OverlayHandle(pub u64);

/// Structural attributes of an element.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ElementInfo {
    /// Tag name (lowercase).
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub href: Option<String>,
}

/// Computed styles relevant to visibility and scrolling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedStyle {
    pub display: String,
    pub visibility: String,
    pub opacity: f64,
    pub overflow_x: String,
    pub overflow_y: String,
    pub position: String,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: "block".to_string(),
            visibility: "visible".to_string(),
            opacity: 1.0,
            overflow_x: "visible".to_string(),
            overflow_y: "visible".to_string(),
            position: "static".to_string(),
        }
    }
}

impl ComputedStyle {
    /// Hidden via display, visibility or opacity.
    pub fn is_hidden(&self) -> bool {
        self.display == "none"
            || self.visibility == "hidden"
            || self.visibility == "collapse"
            || self.opacity <= 0.0
    }

    /// Whether the element clips and scrolls its content.
    pub fn is_scroll_container(&self) -> bool {
        let scrolls = |v: &str| matches!(v, "auto" | "scroll" | "overlay");
        scrolls(&self.overflow_x) || scrolls(&self.overflow_y)
    }

    pub fn is_fixed(&self) -> bool {
        self.position == "fixed"
    }
}

/// Change notification emitted by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SurfaceEvent {
    /// Scroll of the window (`source = None`) or of a scroll container.
    Scroll { source: Option<ElementHandle> },
    Resize,
    /// The element tree or styles changed.
    Mutation,
    /// The page URL changed without a full navigation (history API, hash).
    UrlChanged { url: String },
}

/// Kind of overlay node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayKind {
    Modal,
    Tooltip,
    Bubble,
    Backdrop,
    Beacon,
    Launcher,
}

/// Description of an overlay to insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySpec {
    pub kind: OverlayKind,
    /// Flow or launcher id owning the node.
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    pub width: f64,
    #[serde(default)]
    pub block_target_clicks: bool,
    /// Serialized blocks or launcher appearance, rendered by the host.
    #[serde(default)]
    pub content: serde_json::Value,
}

impl OverlaySpec {
    pub fn new(kind: OverlayKind, owner: impl Into<String>, width: f64) -> Self {
        Self {
            kind,
            owner: owner.into(),
            step_id: None,
            width,
            block_target_clicks: false,
            content: serde_json::Value::Null,
        }
    }
}

/// Position applied to an overlay node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayPlacement {
    pub left: f64,
    pub top: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tail: Option<TailPosition>,
    /// Apply as a `translate` transform instead of `left`/`top`.
    #[serde(default)]
    pub translate: bool,
}

impl OverlayPlacement {
    pub fn at(left: f64, top: f64) -> Self {
        Self {
            left,
            top,
            side: None,
            tail: None,
            translate: false,
        }
    }
}

/// Capabilities the engine requires from the page it decorates.
pub trait HostSurface: Send + Sync {
    /// Current page URL.
    fn current_url(&self) -> String;

    /// Rewrite the URL in place (history replace, no navigation).
    fn replace_url(&self, url: &str);

    /// Full navigation; local execution should stop afterwards.
    fn navigate(&self, url: &str);

    /// Open a URL in a new tab.
    fn open_tab(&self, url: &str);

    /// Element with the given id attribute.
    fn element_by_id(&self, id: &str) -> Option<ElementHandle>;

    /// All elements matching a selector, in document order.
    fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementHandle>, SurfaceError>;

    /// First element selected by an xpath expression.
    fn evaluate_xpath(&self, xpath: &str) -> Result<Option<ElementHandle>, SurfaceError>;

    /// All attached elements in document order.
    fn elements(&self) -> Vec<ElementHandle>;

    fn element_info(&self, element: ElementHandle) -> Option<ElementInfo>;

    /// Value of the named attribute.
    fn attribute(&self, element: ElementHandle, name: &str) -> Option<String>;

    /// Concatenated text of the element and its descendants.
    fn text_content(&self, element: ElementHandle) -> Option<String>;

    fn parent(&self, element: ElementHandle) -> Option<ElementHandle>;

    /// Whether the element is still part of the render tree.
    fn is_attached(&self, element: ElementHandle) -> bool;

    fn computed_style(&self, element: ElementHandle) -> Option<ComputedStyle>;

    /// Bounding rectangle in viewport coordinates.
    fn bounding_rect(&self, element: ElementHandle) -> Option<Rect>;

    fn viewport(&self) -> ViewportInfo;

    /// Scroll offset of a scroll container.
    fn scroll_offset(&self, element: ElementHandle) -> ScrollOffset;

    /// Subscribe to scroll, resize, mutation and URL notifications.
    fn subscribe(&self) -> broadcast::Receiver<SurfaceEvent>;

    fn mount_overlay(&self, spec: OverlaySpec) -> OverlayHandle;

    /// Natural size of a mounted overlay.
    fn overlay_size(&self, overlay: OverlayHandle) -> Option<Size>;

    fn place_overlay(&self, overlay: OverlayHandle, placement: OverlayPlacement);

    fn set_overlay_visible(&self, overlay: OverlayHandle, visible: bool);

    fn remove_overlay(&self, overlay: OverlayHandle);

    /// Evaluate a host-side expression.
    fn eval_script(&self, source: &str) -> Result<(), ScriptError>;
}
