//! # Wayfinder Anchor
//!
//! Keeps overlays attached to page targets.
//!
//! - [`TargetResolver`] maps a [`TargetSpec`](wayfinder_protocols::TargetSpec)
//!   to a live element through a fixed fallback chain with retries.
//! - [`GeometryTracker`] maintains the target rectangle as the page scrolls,
//!   resizes and mutates.
//! - [`Positioner`] turns a target rectangle and an overlay size into a
//!   clamped on-screen position.

mod geometry;
mod positioner;
mod resolver;
mod validation;

pub use geometry::{GeometryTracker, Observation, Relocate, TrackedSource};
pub use positioner::Positioner;
pub use resolver::{Resolution, ResolvedTarget, Strategy, TargetResolver};
pub use validation::{is_visible, specificity};
