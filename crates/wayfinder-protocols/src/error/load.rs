//! Flow and auth loading errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Flow not found: {0}")]
    FlowNotFound(String),

    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("Embed key rejected")]
    Unauthorized,

    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_not_found_display() {
        let err = LoadError::FlowNotFound("onboarding".to_string());
        assert!(err.to_string().contains("onboarding"));
    }

    #[test]
    fn test_invalid_payload_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: LoadError = json_err.into();
        assert!(err.to_string().contains("Invalid payload"));
    }
}
