//! Engine context.
//!
//! Everything that would otherwise be global - collaborators, stores,
//! registries, locks and the event channel - lives in one [`EngineContext`]
//! built per document session and shared by reference.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;
use wayfinder_config::EngineConfig;
use wayfinder_protocols::{
    AuthValidator, Condition, FlowLoader, HostSurface, KeyValueStore, MemoryStore,
};
use wayfinder_runloop::InstanceSpawner;

use crate::auth::AuthGate;
use crate::condition::{evaluate, ConditionEnv};
use crate::events::EngineEvent;
use crate::lock::StartLock;
use crate::registry::FlowRegistry;

const EVENT_CAPACITY: usize = 256;

/// Shared state of one engine.
pub struct EngineContext {
    session_id: String,
    surface: Arc<dyn HostSurface>,
    durable: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
    loader: Arc<dyn FlowLoader>,
    config: EngineConfig,
    auth: AuthGate,
    flows: FlowRegistry,
    spawner: InstanceSpawner,
    start_lock: StartLock,
    events: broadcast::Sender<EngineEvent>,
}

impl EngineContext {
    pub fn builder(
        surface: Arc<dyn HostSurface>,
        loader: Arc<dyn FlowLoader>,
        validator: Arc<dyn AuthValidator>,
    ) -> EngineContextBuilder {
        EngineContextBuilder {
            surface,
            loader,
            validator,
            durable: None,
            session: None,
            config: EngineConfig::default(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn surface(&self) -> &Arc<dyn HostSurface> {
        &self.surface
    }

    /// Store that survives sessions.
    pub fn durable(&self) -> &dyn KeyValueStore {
        self.durable.as_ref()
    }

    /// Store scoped to the browsing session.
    pub fn session(&self) -> &dyn KeyValueStore {
        self.session.as_ref()
    }

    pub fn loader(&self) -> &dyn FlowLoader {
        self.loader.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn auth(&self) -> &AuthGate {
        &self.auth
    }

    pub fn flows(&self) -> &FlowRegistry {
        &self.flows
    }

    pub fn spawner(&self) -> &InstanceSpawner {
        &self.spawner
    }

    pub fn start_lock(&self) -> &StartLock {
        &self.start_lock
    }

    /// Publish an event; nobody listening is fine.
    pub fn emit(&self, event: EngineEvent) {
        trace!(?event, "Engine event");
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Evaluate conditions against the live page.
    pub fn evaluate(&self, conditions: &[Condition]) -> bool {
        let url = self.surface.current_url();
        evaluate(conditions, &ConditionEnv::live(self.surface.as_ref(), &url))
    }
}

/// Builder for [`EngineContext`]; stores default to in-memory ones.
pub struct EngineContextBuilder {
    surface: Arc<dyn HostSurface>,
    loader: Arc<dyn FlowLoader>,
    validator: Arc<dyn AuthValidator>,
    durable: Option<Arc<dyn KeyValueStore>>,
    session: Option<Arc<dyn KeyValueStore>>,
    config: EngineConfig,
}

impl EngineContextBuilder {
    pub fn durable(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.durable = Some(store);
        self
    }

    pub fn session(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.session = Some(store);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Arc<EngineContext> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let auth = AuthGate::new(self.config.auth.embed_key.clone(), self.validator).with_page_key(
            self.surface.clone(),
            self.config.auth.page_key_element.clone(),
            self.config.auth.page_key_attribute.clone(),
        );
        let start_lock = StartLock::new(self.config.orchestrator.start_lock());
        Arc::new(EngineContext {
            session_id: uuid::Uuid::new_v4().to_string(),
            surface: self.surface,
            durable: self.durable.unwrap_or_else(|| Arc::new(MemoryStore::new())),
            session: self.session.unwrap_or_else(|| Arc::new(MemoryStore::new())),
            loader: self.loader,
            config: self.config,
            auth,
            flows: FlowRegistry::new(),
            spawner: InstanceSpawner::new(),
            start_lock,
            events,
        })
    }
}
