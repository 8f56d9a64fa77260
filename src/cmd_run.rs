//! `wayfinder run`: a headless session against a page fixture.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{info, warn};

use wayfinder_config::EngineConfig;
use wayfinder_core::{Engine, EngineContext, EngineEvent};
use wayfinder_page::{MemoryPage, PageFixture};
use wayfinder_protocols::{
    AuthValidator, FlowDefinition, FlowLoader, FlowRef, HostSurface, LoadError,
};

/// Inputs of one run.
pub(crate) struct RunOptions {
    pub page: PathBuf,
    pub flows: PathBuf,
    pub launchers: Option<PathBuf>,
    pub activate: Vec<String>,
    pub press: Vec<String>,
    pub embed_key: Option<String>,
    pub settle: Duration,
}

/// Flow definitions read from one JSON file, in file order.
struct FileFlows {
    order: Vec<FlowRef>,
    definitions: HashMap<String, FlowDefinition>,
}

impl FileFlows {
    fn load(path: &Path) -> anyhow::Result<Self> {
        let definitions: Vec<FlowDefinition> = read_json(path)?;
        let order = definitions.iter().map(|d| d.flow_id.clone()).collect();
        Ok(Self {
            order,
            definitions: definitions
                .into_iter()
                .map(|d| (d.flow_id.to_string(), d))
                .collect(),
        })
    }
}

#[async_trait]
impl FlowLoader for FileFlows {
    async fn load(
        &self,
        flow: &FlowRef,
        _version_id: Option<&str>,
        _environment_id: Option<&str>,
    ) -> Result<Option<FlowDefinition>, LoadError> {
        Ok(self.definitions.get(flow.as_str()).cloned())
    }
}

/// Accepts every key; headless runs have no key service.
struct OfflineValidator;

#[async_trait]
impl AuthValidator for OfflineValidator {
    async fn validate(&self, _key: &str) -> Result<bool, LoadError> {
        Ok(true)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn emit(out: &mut dyn Write, value: &impl serde::Serialize) -> anyhow::Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Let timers and watchers run, then print everything the engine published.
async fn settle(
    delay: Duration,
    events: &mut broadcast::Receiver<EngineEvent>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    tokio::time::sleep(delay).await;
    loop {
        match events.try_recv() {
            Ok(event) => emit(out, &event)?,
            Err(TryRecvError::Lagged(skipped)) => warn!(skipped, "Event log lagged"),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return Ok(()),
        }
    }
}

/// Handle `wayfinder run`.
pub(crate) async fn handle_run(options: RunOptions, config: EngineConfig) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    run_session(options, config, &mut stdout).await
}

pub(crate) async fn run_session(
    options: RunOptions,
    mut config: EngineConfig,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let fixture = PageFixture::load(&options.page)
        .with_context(|| format!("loading page fixture {}", options.page.display()))?;
    let page = Arc::new(MemoryPage::from_fixture(fixture));
    let flows = FileFlows::load(&options.flows)?;
    let flow_ids = flows.order.clone();

    if options.embed_key.is_some() {
        config.auth.embed_key = options.embed_key;
    }
    let page_key = page
        .element_by_id(&config.auth.page_key_element)
        .and_then(|element| page.attribute(element, &config.auth.page_key_attribute));
    if config.auth.embed_key.is_none() && page_key.is_none() {
        bail!(
            "no embed key: pass --embed-key, set auth.embed_key or add #{}[{}] to the page",
            config.auth.page_key_element,
            config.auth.page_key_attribute
        );
    }

    let ctx = EngineContext::builder(page.clone(), Arc::new(flows), Arc::new(OfflineValidator))
        .config(config)
        .build();
    let mut events = ctx.subscribe();
    let engine = Engine::new(ctx);

    if let Some(path) = &options.launchers {
        let launchers: Vec<Value> = read_json(path)?;
        for value in &launchers {
            engine.launchers().register_value(value);
        }
    }

    info!(flows = flow_ids.len(), "Starting headless run");
    let report = engine.start(&flow_ids).await?;
    emit(out, &json!({ "report": report }))?;
    settle(options.settle, &mut events, out).await?;

    for launcher in &options.activate {
        match engine.launchers().activate(launcher).await {
            Ok(index) => info!(launcher_id = %launcher, ?index, "Launcher activated"),
            Err(e) => warn!(launcher_id = %launcher, error = %e, "Launcher activation failed"),
        }
        settle(options.settle, &mut events, out).await?;
    }

    for block in &options.press {
        if let Err(e) = engine.orchestrator().press_button(block).await {
            warn!(block_id = %block, error = %e, "Button press failed");
        }
        settle(options.settle, &mut events, out).await?;
    }

    for overlay in page.visible_overlays() {
        emit(
            out,
            &json!({
                "overlay": {
                    "kind": overlay.spec.kind,
                    "owner": overlay.spec.owner,
                    "step_id": overlay.spec.step_id,
                    "placement": overlay.placement,
                }
            }),
        )?;
    }

    engine.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, value: Value) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, value.to_string()).unwrap();
        path
    }

    fn options(dir: &Path, press: &[&str]) -> RunOptions {
        RunOptions {
            page: write(
                dir,
                "page.json",
                json!({
                    "url": "https://app.test/home",
                    "root": { "tag": "body", "rect": { "x": 0, "y": 0, "width": 1280, "height": 2000 } }
                }),
            ),
            flows: write(
                dir,
                "flows.json",
                json!([{
                    "flowId": "tour",
                    "setup": { "forceStart": true },
                    "steps": [{
                        "id": "one",
                        "type": "modal",
                        "blocks": [
                            { "type": "content", "body": "Hi" },
                            { "type": "button", "id": "done", "label": "Done", "actions": [{ "type": "dismiss" }] }
                        ]
                    }]
                }]),
            ),
            launchers: None,
            activate: vec![],
            press: press.iter().map(|p| p.to_string()).collect(),
            embed_key: Some("pk_test".to_string()),
            settle: Duration::from_millis(10),
        }
    }

    fn lines(out: Vec<u8>) -> Vec<Value> {
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_run_prints_report_events_and_overlays() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        run_session(options(dir.path(), &[]), EngineConfig::default(), &mut out)
            .await
            .unwrap();

        let lines = lines(out);
        assert_eq!(lines[0]["report"]["started"], json!([["tour", 0]]));
        assert!(lines.iter().any(|l| l["event"] == "flow_started"));
        assert!(lines.iter().any(|l| l["overlay"]["owner"] == "tour"));
    }

    #[tokio::test]
    async fn test_run_presses_buttons_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        run_session(options(dir.path(), &["done"]), EngineConfig::default(), &mut out)
            .await
            .unwrap();

        let lines = lines(out);
        assert!(lines
            .iter()
            .any(|l| l["event"] == "flow_ended" && l["reason"] == "dismissed"));
        assert!(!lines.iter().any(|l| l.get("overlay").is_some()));
    }

    #[tokio::test]
    async fn test_run_requires_embed_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = options(dir.path(), &[]);
        options.embed_key = None;
        let mut out = Vec::new();
        assert!(run_session(options, EngineConfig::default(), &mut out).await.is_err());
    }

    #[tokio::test]
    async fn test_run_takes_embed_key_from_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = options(dir.path(), &[]);
        options.embed_key = None;
        options.page = write(
            dir.path(),
            "keyed.json",
            json!({
                "url": "https://app.test/home",
                "root": {
                    "tag": "body",
                    "rect": { "x": 0, "y": 0, "width": 1280, "height": 2000 },
                    "children": [{ "id": "mflows-lockout", "attrs": { "data-ark": "pk_page" } }]
                }
            }),
        );
        let mut out = Vec::new();
        run_session(options, EngineConfig::default(), &mut out)
            .await
            .unwrap();
        assert_eq!(lines(out)[0]["report"]["started"], json!([["tour", 0]]));
    }
}
