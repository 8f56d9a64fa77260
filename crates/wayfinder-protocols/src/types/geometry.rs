//! Geometry types: viewport, rectangles, sides and placement results.

use serde::{Deserialize, Serialize};

/// Viewport information for coordinate calculations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportInfo {
    /// Viewport width in CSS pixels.
    pub width: f64,
    /// Viewport height in CSS pixels.
    pub height: f64,
    /// Window scroll X offset.
    pub scroll_x: f64,
    /// Window scroll Y offset.
    pub scroll_y: f64,
}

impl Default for ViewportInfo {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }
}

impl ViewportInfo {
    /// Viewport dimensions as a size.
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Window scroll position.
    pub fn scroll(&self) -> ScrollOffset {
        ScrollOffset {
            x: self.scroll_x,
            y: self.scroll_y,
        }
    }
}

/// Scroll offset of the window or of a scroll container.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollOffset {
    pub x: f64,
    pub y: f64,
}

/// Width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Rectangle in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Get the center point of this rectangle.
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Area in square pixels.
    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Check if a point is inside this rectangle.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }

    /// Check if this rectangle intersects with another.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Translate by the given delta.
    pub fn offset(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// True when any edge differs from `other`.
    pub fn edges_differ(&self, other: &Rect) -> bool {
        self.left() != other.left()
            || self.top() != other.top()
            || self.right() != other.right()
            || self.bottom() != other.bottom()
    }
}

/// Side of the target an overlay attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Side {
    Above,
    Below,
    LeftOf,
    RightOf,
}

impl Side {
    /// Fallback priority used when the preferred side does not fit.
    pub const FALLBACK_ORDER: [Side; 4] = [Side::Above, Side::LeftOf, Side::RightOf, Side::Below];

    /// Whether the overlay sits on a horizontal edge of the target.
    pub fn is_vertical(&self) -> bool {
        matches!(self, Side::Above | Side::Below)
    }
}

impl Default for Side {
    fn default() -> Self {
        Side::Below
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Above => write!(f, "above"),
            Side::Below => write!(f, "below"),
            Side::LeftOf => write!(f, "left-of"),
            Side::RightOf => write!(f, "right-of"),
        }
    }
}

/// Screen corner for fixed-position launchers and bubbles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

/// Position of the tail/arrow along the overlay edge facing the target.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TailPosition {
    /// Offset from the overlay's left edge (vertical sides) or top edge
    /// (horizontal sides) to the tail tip.
    pub offset: f64,
}

/// Computed overlay placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionResult {
    pub left: f64,
    pub top: f64,
    pub side: Side,
    /// Tail position, absent for un-anchored placements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tail: Option<TailPosition>,
}
