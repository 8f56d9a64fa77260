//! # Wayfinder Protocols
//!
//! Data model and interface definitions shared by every Wayfinder crate.
//! Contains only plain data and traits - no engine logic.
//!
//! ## Core Traits
//!
//! - [`HostSurface`] - The page the overlays are drawn on
//! - [`KeyValueStore`] - Durable and session-scoped key/value storage
//! - [`FlowLoader`] - Retrieval of flow definitions
//! - [`AuthValidator`] - Validation of the embedding key

pub mod error;
pub mod loader;
pub mod store;
pub mod surface;
pub mod types;

pub use error::{
    ActionError, ConfigParseError, EngineError, LoadError, ResolutionError, ScriptError,
    SurfaceError,
};
pub use loader::{AuthValidator, FlowLoader};
pub use store::{KeyValueStore, MemoryStore};
pub use surface::{
    ComputedStyle, ElementHandle, ElementInfo, HostSurface, OverlayHandle, OverlayKind,
    OverlayPlacement, OverlaySpec, SurfaceEvent,
};
pub use types::*;
