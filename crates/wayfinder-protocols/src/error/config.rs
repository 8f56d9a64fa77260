//! Persisted or legacy configuration that could not be parsed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigParseError {
    #[error("Unrecognized configuration shape for {subject}: {message}")]
    UnrecognizedShape { subject: String, message: String },

    #[error("Missing field {field} in {subject}")]
    MissingField { subject: String, field: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
