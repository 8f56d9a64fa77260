//! External collaborators: flow retrieval and embed-key validation.

use async_trait::async_trait;

use crate::error::LoadError;
use crate::types::{FlowDefinition, FlowRef};

/// Retrieves flow definitions.
///
/// `Ok(None)` means the flow does not exist; `Err` is a fetch failure. The
/// engine treats both as "cannot start" and does not retry on its own.
#[async_trait]
pub trait FlowLoader: Send + Sync {
    async fn load(
        &self,
        flow: &FlowRef,
        version_id: Option<&str>,
        environment_id: Option<&str>,
    ) -> Result<Option<FlowDefinition>, LoadError>;
}

/// Validates the embedding key.
#[async_trait]
pub trait AuthValidator: Send + Sync {
    async fn validate(&self, key: &str) -> Result<bool, LoadError>;
}
