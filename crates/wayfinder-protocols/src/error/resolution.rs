//! Target resolution errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("Target not found after {attempts} attempts: {target}")]
    NotFound { target: String, attempts: u32 },

    #[error("Target resolution timed out after {0} ms")]
    Timeout(u64),

    #[error("Target is not resolvable on a live page: {0}")]
    Unresolvable(String),
}
