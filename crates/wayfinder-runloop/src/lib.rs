//! # Wayfinder RunLoop
//!
//! Cooperative scheduling primitives for the engine.
//!
//! Every subscription, poll and timer the engine creates belongs to a
//! [`Lifecycle`]. Tearing the lifecycle down cancels all of it at once, so an
//! overlay or launcher that is removed can never leave a listener behind.
//!
//! ## Core Concepts
//!
//! - **Lifecycle**: owner of spawned tasks and teardown callbacks
//! - **InstanceSpawner**: lifecycles keyed by flow instance or launcher id
//! - **Timer**: one-shot or repeating callback bound to a lifecycle
//! - **FrameClock / FrameBatch**: paint-aligned coalescing of recomputes

mod frame;
mod lifecycle;
mod spawner;
mod timer;

pub use frame::{FrameBatch, FrameClock};
pub use lifecycle::Lifecycle;
pub use spawner::{InstanceSpawner, SpawnerMetrics};
pub use timer::Timer;
