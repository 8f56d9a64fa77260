//! `wayfinder place`: one placement computation.

use anyhow::bail;

use wayfinder_anchor::Positioner;
use wayfinder_config::PositionerConfig;
use wayfinder_protocols::{Corner, PositionResult, Rect, Side, Size, ViewportInfo};

/// Placement request assembled from the command line.
pub(crate) struct PlaceRequest {
    pub target: Option<Rect>,
    pub size: Size,
    pub side: Side,
    pub corner: Option<Corner>,
    pub offset: Size,
    pub viewport: Size,
}

pub(crate) fn compute(request: &PlaceRequest, config: PositionerConfig) -> anyhow::Result<PositionResult> {
    let positioner = Positioner::new(config);
    let viewport = ViewportInfo {
        width: request.viewport.width,
        height: request.viewport.height,
        ..Default::default()
    };
    if viewport.width <= 0.0 || viewport.height <= 0.0 {
        bail!("viewport must have a positive size");
    }

    Ok(match (request.target, request.corner) {
        (Some(target), _) => positioner.place(target, request.size, request.side, viewport),
        (None, Some(corner)) => positioner.corner(
            corner,
            request.size,
            viewport,
            request.offset.width,
            request.offset.height,
        ),
        (None, None) => positioner.center(request.size, viewport),
    })
}

/// Handle `wayfinder place`.
pub(crate) fn handle_place(request: PlaceRequest, config: PositionerConfig) -> anyhow::Result<()> {
    let result = compute(&request, config)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PlaceRequest {
        PlaceRequest {
            target: None,
            size: Size::new(48.0, 48.0),
            side: Side::Below,
            corner: None,
            offset: Size::new(20.0, 20.0),
            viewport: Size::new(1280.0, 720.0),
        }
    }

    #[test]
    fn test_corner_placement() {
        let mut request = request();
        request.corner = Some(Corner::BottomRight);
        let result = compute(&request, PositionerConfig::default()).unwrap();
        assert_eq!((result.left, result.top), (1212.0, 652.0));
        assert!(result.tail.is_none());
    }

    #[test]
    fn test_target_placement_has_tail() {
        let mut request = request();
        request.target = Some(Rect::new(600.0, 100.0, 80.0, 30.0));
        let result = compute(&request, PositionerConfig::default()).unwrap();
        assert_eq!(result.side, Side::Below);
        assert!(result.top >= 130.0);
        assert!(result.tail.is_some());
    }

    #[test]
    fn test_centered_without_target() {
        let result = compute(&request(), PositionerConfig::default()).unwrap();
        assert_eq!((result.left, result.top), (616.0, 336.0));
    }

    #[test]
    fn test_rejects_empty_viewport() {
        let mut request = request();
        request.viewport = Size::new(0.0, 720.0);
        assert!(compute(&request, PositionerConfig::default()).is_err());
    }
}
