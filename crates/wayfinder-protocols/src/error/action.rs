//! Action and script execution errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Unrecognized action type")]
    Unrecognized,

    #[error("Step not found: {0}")]
    StepNotFound(String),

    #[error("No visible flow instance")]
    NoVisibleInstance,

    #[error("Block not found: {0}")]
    BlockNotFound(String),

    #[error("Script failed: {0}")]
    Script(#[from] ScriptError),
}

/// A user-supplied expression failed.
#[derive(Debug, Clone, Error)]
#[error("Script error: {message}")]
pub struct ScriptError {
    pub message: String,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_error_into_action_error() {
        let err: ActionError = ScriptError::new("ReferenceError: foo").into();
        assert!(err.to_string().contains("ReferenceError"));
    }

    #[test]
    fn test_step_not_found_display() {
        let err = ActionError::StepNotFound("intro".to_string());
        assert!(err.to_string().contains("intro"));
    }
}
