//! Umbrella error for engine entry points.

use thiserror::Error;

use super::{ActionError, ConfigParseError, LoadError, ResolutionError, SurfaceError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    ConfigParse(#[from] ConfigParseError),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error("Engine not authorized")]
    NotAuthorized,

    #[error("Start of {0} suppressed by re-entrancy lock")]
    StartLocked(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_load_error() {
        let err: EngineError = LoadError::FlowNotFound("tour".to_string()).into();
        assert!(matches!(err, EngineError::Load(_)));
        assert!(err.to_string().contains("tour"));
    }

    #[test]
    fn test_start_locked_display() {
        let err = EngineError::StartLocked("tour".to_string());
        assert!(err.to_string().contains("re-entrancy"));
    }
}
