//! # Wayfinder Core
//!
//! The tour engine: decides when flows start, walks them through their
//! steps and keeps launchers on the page.
//!
//! ## Components
//!
//! - [`Engine`] - Facade wiring everything to one page session
//! - [`EngineContext`] - Collaborators, stores, registries and events
//! - [`Orchestrator`] - Flow instances, transitions, rendering and actions
//! - [`LauncherManager`] - Persistent controls that start flows
//! - Condition evaluation and the URL pattern grammar used by visibility rules

pub mod auth;
pub mod condition;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod launcher;
pub mod lock;
pub mod orchestrator;
pub mod registry;
pub mod url_pattern;

pub use auth::AuthGate;
pub use condition::{evaluate, ConditionEnv};
pub use context::{EngineContext, EngineContextBuilder};
pub use engine::{Engine, StartReport};
pub use error::{LauncherError, RegistryError};
pub use events::{EndReason, EngineEvent};
pub use launcher::{HiddenReason, IngestLauncher, LauncherManager, Visibility};
pub use lock::StartLock;
pub use orchestrator::{FlowState, Orchestrator, StartReason, StartTrigger};
pub use registry::{BaseRegistry, FlowRegistry, LauncherRegistry, Registerable};
pub use url_pattern::{matches_any, UrlPattern};
