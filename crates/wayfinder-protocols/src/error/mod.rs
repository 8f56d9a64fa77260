//! Error taxonomy of the engine.
//!
//! Every class here degrades gracefully at the boundary that catches it;
//! none of them is allowed to reach the host page.

mod action;
mod config;
mod engine;
mod load;
mod resolution;
mod surface;

pub use action::*;
pub use config::*;
pub use engine::*;
pub use load::*;
pub use resolution::*;
pub use surface::*;
