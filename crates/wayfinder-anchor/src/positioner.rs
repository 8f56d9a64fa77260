//! Anchored overlay placement.

use wayfinder_config::PositionerConfig;
use wayfinder_protocols::{Corner, PositionResult, Rect, Side, Size, TailPosition, ViewportInfo};

/// Computes on-screen overlay positions in viewport coordinates.
#[derive(Debug, Clone, Default)]
pub struct Positioner {
    config: PositionerConfig,
}

impl Positioner {
    pub fn new(config: PositionerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PositionerConfig {
        &self.config
    }

    /// Whether an overlay fits on `side` of the target without crossing the
    /// viewport margin.
    pub fn fits(&self, side: Side, target: Rect, overlay: Size, viewport: ViewportInfo) -> bool {
        let PositionerConfig { margin, gap, .. } = self.config;
        match side {
            Side::Above => target.top() - overlay.height - gap >= margin,
            Side::Below => target.bottom() + gap + overlay.height <= viewport.height - margin,
            Side::LeftOf => target.left() - overlay.width - gap >= margin,
            Side::RightOf => target.right() + gap + overlay.width <= viewport.width - margin,
        }
    }

    /// Preferred side if it fits, else the first fitting fallback, else below.
    pub fn choose_side(
        &self,
        target: Rect,
        overlay: Size,
        preferred: Side,
        viewport: ViewportInfo,
    ) -> Side {
        if self.fits(preferred, target, overlay, viewport) {
            return preferred;
        }
        Side::FALLBACK_ORDER
            .into_iter()
            .find(|side| self.fits(*side, target, overlay, viewport))
            .unwrap_or(Side::Below)
    }

    /// Place an overlay next to `target`.
    ///
    /// The result always lies within `[margin, dimension - size - margin]`
    /// on both axes as long as the overlay is smaller than the viewport minus
    /// both margins. The tail points at the target centre and never leaves
    /// the overlay.
    pub fn place(
        &self,
        target: Rect,
        overlay: Size,
        preferred: Side,
        viewport: ViewportInfo,
    ) -> PositionResult {
        let side = self.choose_side(target, overlay, preferred, viewport);
        let gap = self.config.gap;
        let (cx, cy) = target.center();

        let (left, top) = match side {
            Side::Above => (cx - overlay.width / 2.0, target.top() - gap - overlay.height),
            Side::Below => (cx - overlay.width / 2.0, target.bottom() + gap),
            Side::LeftOf => (target.left() - gap - overlay.width, cy - overlay.height / 2.0),
            Side::RightOf => (target.right() + gap, cy - overlay.height / 2.0),
        };
        let left = self.clamp(left, overlay.width, viewport.width);
        let top = self.clamp(top, overlay.height, viewport.height);

        let tail = if side.is_vertical() {
            self.tail(cx - left, overlay.width)
        } else {
            self.tail(cy - top, overlay.height)
        };

        PositionResult {
            left,
            top,
            side,
            tail: Some(tail),
        }
    }

    /// Centred in the viewport, without a tail.
    pub fn center(&self, overlay: Size, viewport: ViewportInfo) -> PositionResult {
        PositionResult {
            left: self.clamp((viewport.width - overlay.width) / 2.0, overlay.width, viewport.width),
            top: self.clamp(
                (viewport.height - overlay.height) / 2.0,
                overlay.height,
                viewport.height,
            ),
            side: Side::default(),
            tail: None,
        }
    }

    /// Pinned to a viewport corner with the given offsets.
    pub fn corner(
        &self,
        corner: Corner,
        overlay: Size,
        viewport: ViewportInfo,
        offset_x: f64,
        offset_y: f64,
    ) -> PositionResult {
        let right = viewport.width - overlay.width - offset_x;
        let bottom = viewport.height - overlay.height - offset_y;
        let (left, top) = match corner {
            Corner::TopLeft => (offset_x, offset_y),
            Corner::TopRight => (right, offset_y),
            Corner::BottomLeft => (offset_x, bottom),
            Corner::BottomRight => (right, bottom),
        };
        PositionResult {
            left: left.max(0.0),
            top: top.max(0.0),
            side: Side::default(),
            tail: None,
        }
    }

    fn clamp(&self, value: f64, size: f64, dimension: f64) -> f64 {
        let margin = self.config.margin;
        value.min(dimension - size - margin).max(margin)
    }

    fn tail(&self, offset: f64, size: f64) -> TailPosition {
        let inset = self.config.tail_inset;
        let offset = if size < inset * 2.0 {
            size / 2.0
        } else {
            offset.clamp(inset, size - inset)
        };
        TailPosition { offset }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn viewport() -> ViewportInfo {
        ViewportInfo {
            width: 1000.0,
            height: 800.0,
            ..Default::default()
        }
    }

    fn overlay() -> Size {
        Size::new(200.0, 100.0)
    }

    #[test]
    fn test_preferred_side_used_when_it_fits() {
        let p = Positioner::default();
        let target = Rect::new(400.0, 400.0, 100.0, 40.0);
        let result = p.place(target, overlay(), Side::Above, viewport());
        assert_eq!(result.side, Side::Above);
        assert_eq!(result.left, 350.0);
        assert_eq!(result.top, 400.0 - 12.0 - 100.0);
        assert_eq!(result.tail, Some(TailPosition { offset: 100.0 }));
    }

    #[test]
    fn test_fallback_order() {
        let p = Positioner::default();
        // Near the bottom edge: below does not fit, above does.
        let target = Rect::new(400.0, 740.0, 100.0, 40.0);
        assert_eq!(p.place(target, overlay(), Side::Below, viewport()).side, Side::Above);

        // Near the top-left corner: above and left-of do not fit.
        let target = Rect::new(10.0, 10.0, 50.0, 20.0);
        assert_eq!(p.choose_side(target, overlay(), Side::Above, viewport()), Side::RightOf);
    }

    #[test]
    fn test_nothing_fits_defaults_below_and_clamps() {
        let p = Positioner::default();
        let big = Size::new(900.0, 700.0);
        let target = Rect::new(0.0, 300.0, 1000.0, 200.0);
        let result = p.place(target, big, Side::RightOf, viewport());
        assert_eq!(result.side, Side::Below);
        assert_eq!(result.top, 800.0 - 700.0 - 8.0);
        assert_eq!(result.left, 50.0);
    }

    #[test]
    fn test_left_of_tail_tracks_target_centre() {
        let p = Positioner::default();
        let target = Rect::new(600.0, 20.0, 100.0, 40.0);
        let result = p.place(target, overlay(), Side::LeftOf, viewport());
        assert_eq!(result.side, Side::LeftOf);
        assert_eq!(result.left, 600.0 - 12.0 - 200.0);
        // Raw top would be -10; clamped to the margin, so the tail moves up.
        assert_eq!(result.top, 8.0);
        assert_eq!(result.tail.unwrap().offset, 40.0 - 8.0);
    }

    #[test]
    fn test_tail_clamped_inside_overlay() {
        let p = Positioner::default();
        let target = Rect::new(0.0, 300.0, 4.0, 4.0);
        let result = p.place(target, overlay(), Side::Below, viewport());
        assert_eq!(result.left, 8.0);
        assert_eq!(result.tail.unwrap().offset, 12.0);
    }

    #[test]
    fn test_center() {
        let p = Positioner::default();
        let result = p.center(overlay(), viewport());
        assert_eq!((result.left, result.top), (400.0, 350.0));
        assert!(result.tail.is_none());
    }

    #[test]
    fn test_corner() {
        let p = Positioner::default();
        let size = Size::new(48.0, 48.0);
        let result = p.corner(Corner::BottomRight, size, viewport(), 20.0, 20.0);
        assert_eq!((result.left, result.top), (932.0, 732.0));
        let result = p.corner(Corner::TopLeft, size, viewport(), 20.0, 30.0);
        assert_eq!((result.left, result.top), (20.0, 30.0));
    }

    fn side() -> impl Strategy<Value = Side> {
        prop_oneof![
            Just(Side::Above),
            Just(Side::Below),
            Just(Side::LeftOf),
            Just(Side::RightOf),
        ]
    }

    proptest! {
        #[test]
        fn placement_stays_inside_margins(
            vw in 320.0f64..2000.0,
            vh in 320.0f64..1200.0,
            x in -500.0f64..2500.0,
            y in -500.0f64..1700.0,
            tw in 0.0f64..600.0,
            th in 0.0f64..400.0,
            ow_frac in 0.01f64..1.0,
            oh_frac in 0.01f64..1.0,
            preferred in side(),
        ) {
            let p = Positioner::default();
            let margin = p.config().margin;
            let viewport = ViewportInfo { width: vw, height: vh, ..Default::default() };
            let overlay = Size::new((vw - 2.0 * margin) * ow_frac, (vh - 2.0 * margin) * oh_frac);
            let result = p.place(Rect::new(x, y, tw, th), overlay, preferred, viewport);

            prop_assert!(result.left >= margin - 1e-9);
            prop_assert!(result.left <= vw - overlay.width - margin + 1e-9);
            prop_assert!(result.top >= margin - 1e-9);
            prop_assert!(result.top <= vh - overlay.height - margin + 1e-9);

            let tail = result.tail.map(|t| t.offset).unwrap_or_default();
            let extent = if result.side.is_vertical() { overlay.width } else { overlay.height };
            prop_assert!(tail >= 0.0 && tail <= extent);
        }
    }
}
