//! Flow and launcher registries.
//!
//! One generic keyed store backs both: flows are cached after their first
//! load, launchers are registered once their configuration is ingested.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};
use wayfinder_protocols::{Flow, FlowLoader, FlowRef, LauncherConfig, LoadError};

use crate::error::RegistryError;

/// Items that can be stored in a registry.
pub trait Registerable: Send + Sync {
    fn registry_id(&self) -> &str;
}

impl Registerable for Flow {
    fn registry_id(&self) -> &str {
        self.id.as_str()
    }
}

impl Registerable for LauncherConfig {
    fn registry_id(&self) -> &str {
        &self.id
    }
}

/// Thread-safe registry keyed by [`Registerable::registry_id`].
pub struct BaseRegistry<T: ?Sized + Registerable> {
    items: DashMap<String, Arc<T>>,
}

impl<T: ?Sized + Registerable> BaseRegistry<T> {
    pub fn new() -> Self {
        Self {
            items: DashMap::new(),
        }
    }

    /// Register an item; fails on a duplicate id.
    pub fn register(&self, item: Arc<T>) -> Result<(), RegistryError> {
        let id = item.registry_id().to_string();
        if self.items.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered(id));
        }
        self.items.insert(id, item);
        Ok(())
    }

    /// Insert or replace an item.
    pub fn upsert(&self, item: Arc<T>) {
        self.items.insert(item.registry_id().to_string(), item);
    }

    pub fn unregister(&self, id: &str) -> Result<(), RegistryError> {
        self.items
            .remove(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<T>> {
        self.items.get(id).map(|item| item.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn list_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.items.iter().map(|item| item.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Arc<T>> + '_ {
        self.items.iter().map(|entry| entry.value().clone())
    }
}

impl<T: ?Sized + Registerable> Default for BaseRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Ingested flows, filled from the loader on demand.
#[derive(Default)]
pub struct FlowRegistry {
    flows: BaseRegistry<Flow>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a flow, replacing any cached copy.
    pub fn insert(&self, flow: Flow) -> Arc<Flow> {
        let flow = Arc::new(flow);
        self.flows.upsert(flow.clone());
        flow
    }

    pub fn get(&self, flow: &FlowRef) -> Option<Arc<Flow>> {
        self.flows.get(flow.as_str())
    }

    pub fn ids(&self) -> Vec<FlowRef> {
        self.flows.list_ids().into_iter().map(FlowRef).collect()
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Cached flow, or one fetched through `loader`.
    ///
    /// A missing flow and a failed fetch are both errors; neither is retried.
    pub async fn get_or_load(
        &self,
        flow: &FlowRef,
        loader: &dyn FlowLoader,
        environment_id: Option<&str>,
    ) -> Result<Arc<Flow>, LoadError> {
        if let Some(cached) = self.get(flow) {
            return Ok(cached);
        }
        match loader.load(flow, None, environment_id).await {
            Ok(Some(definition)) => {
                let ingested = Flow::ingest(definition);
                let malformed = ingested.steps.iter().filter(|s| s.as_step().is_none()).count();
                debug!(
                    flow_id = %flow,
                    steps = ingested.len(),
                    malformed,
                    "Flow loaded"
                );
                Ok(self.insert(ingested))
            }
            Ok(None) => {
                warn!(flow_id = %flow, "Flow not found");
                Err(LoadError::FlowNotFound(flow.to_string()))
            }
            Err(e) => {
                warn!(flow_id = %flow, error = %e, "Flow load failed");
                Err(e)
            }
        }
    }
}

/// Registered launchers.
pub type LauncherRegistry = BaseRegistry<LauncherConfig>;

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
