//! Registry and launcher errors.

use thiserror::Error;
use wayfinder_protocols::EngineError;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Not registered: {0}")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum LauncherError {
    #[error("Unknown launcher: {0}")]
    Unknown(String),

    #[error("Launcher {0} is not shown")]
    NotShown(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
