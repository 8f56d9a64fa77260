//! # Wayfinder Config
//!
//! Configuration management for the Wayfinder engine. Every numeric constant
//! the engine relies on (retry counts, poll intervals, lock durations) is a
//! field here with the observed default.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
