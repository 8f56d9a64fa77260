use super::*;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use wayfinder_config::EngineConfig;
use wayfinder_page::{MemoryPage, NodeSpec};
use wayfinder_protocols::{
    Activation, Appearance, AuthValidator, Block, Flow, FlowDefinition, FlowLoader, FlowRef, LoadError,
    Step, StepRef, StepType, VisibilityRules,
};

struct AllowAll;

#[async_trait]
impl AuthValidator for AllowAll {
    async fn validate(&self, _key: &str) -> Result<bool, LoadError> {
        Ok(true)
    }
}

struct NoFlows;

#[async_trait]
impl FlowLoader for NoFlows {
    async fn load(
        &self,
        _flow: &FlowRef,
        _version_id: Option<&str>,
        _environment_id: Option<&str>,
    ) -> Result<Option<FlowDefinition>, LoadError> {
        Ok(None)
    }
}

fn page_at(url: &str) -> Arc<MemoryPage> {
    Arc::new(MemoryPage::new(
        url,
        NodeSpec::new("body")
            .rect(0.0, 0.0, 1280.0, 2000.0)
            .child(
                NodeSpec::new("button")
                    .id("save")
                    .text("Save")
                    .rect(100.0, 100.0, 80.0, 30.0),
            ),
    ))
}

fn manager(page: &Arc<MemoryPage>) -> LauncherManager {
    let mut config = EngineConfig::default();
    config.auth.embed_key = Some("pk_test".to_string());
    let ctx = EngineContext::builder(page.clone(), Arc::new(NoFlows), Arc::new(AllowAll))
        .config(config)
        .build();
    ctx.flows().insert(Flow::from_steps(
        "tour",
        vec![
            Step::new("one", StepType::Modal).with_block(Block::content("First")),
            Step::new("two", StepType::Modal).with_block(Block::content("Second")),
        ],
    ));
    LauncherManager::new(Orchestrator::new(ctx))
}

fn fixed(id: &str, visibility: VisibilityRules) -> LauncherConfig {
    LauncherConfig {
        id: id.to_string(),
        appearance: Appearance {
            label: Some("Help".to_string()),
            ..Default::default()
        },
        attach: AttachMode::Fixed {
            corner: Corner::BottomRight,
            offset_x: 20.0,
            offset_y: 20.0,
        },
        visibility,
        activation: Activation {
            flow: FlowRef::new("tour"),
            start_step: None,
            dismiss_after_first_activation: false,
        },
    }
}

fn placement(page: &MemoryPage, manager: &LauncherManager, id: &str) -> OverlayPlacement {
    let overlay = manager.overlay(id).unwrap();
    page.overlay(overlay).unwrap().placement.unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_fixed_launcher_pinned_to_corner() {
    let page = page_at("https://app.test/home");
    let manager = manager(&page);
    let mut events = manager.ctx().subscribe();
    manager.register(fixed("help", VisibilityRules::default())).unwrap();

    manager.evaluate_all();

    assert!(manager.is_mounted("help"));
    let record = page.overlays_of("help");
    assert_eq!(record.len(), 1);
    assert_eq!(record[0].spec.kind, OverlayKind::Launcher);
    let placed = placement(&page, &manager, "help");
    assert_eq!((placed.left, placed.top), (1280.0 - 48.0 - 20.0, 720.0 - 48.0 - 20.0));
    assert_eq!(
        events.try_recv().unwrap(),
        EngineEvent::LauncherShown {
            launcher_id: "help".to_string()
        }
    );

    page.resize(800.0, 600.0);
    tokio::time::sleep(Duration::from_millis(10)).await;
    let placed = placement(&page, &manager, "help");
    assert_eq!((placed.left, placed.top), (800.0 - 48.0 - 20.0, 600.0 - 48.0 - 20.0));

    // A second evaluation leaves the mounted launcher alone.
    manager.evaluate_all();
    assert_eq!(page.overlays_of("help").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_include_and_exclude_patterns() {
    let page = page_at("https://app.test/home");
    let manager = manager(&page);
    manager
        .register(fixed(
            "help",
            VisibilityRules {
                include: vec!["*/dashboard/*".to_string()],
                exclude: vec!["*/dashboard/settings".to_string()],
                ..Default::default()
            },
        ))
        .unwrap();

    manager.evaluate_all();
    assert!(!manager.is_mounted("help"));
    assert_eq!(
        manager.visibility("help"),
        Some(Visibility::Hidden(HiddenReason::NotIncluded))
    );

    page.set_url("https://app.test/dashboard/overview");
    manager.evaluate_all();
    assert!(manager.is_mounted("help"));

    page.set_url("https://app.test/dashboard/settings");
    manager.evaluate_all();
    assert!(!manager.is_mounted("help"));
    assert!(page.overlays_of("help").is_empty());
    assert_eq!(
        manager.visibility("help"),
        Some(Visibility::Hidden(HiddenReason::Excluded))
    );
}

#[tokio::test(start_paused = true)]
async fn test_hidden_while_tour_active_unless_configured() {
    let page = page_at("https://app.test/home");
    let manager = manager(&page);
    manager.register(fixed("plain", VisibilityRules::default())).unwrap();
    manager
        .register(fixed(
            "sticky",
            VisibilityRules {
                show_while_tour_active: true,
                ..Default::default()
            },
        ))
        .unwrap();
    manager.evaluate_all();
    assert!(manager.is_mounted("plain"));

    manager
        .orchestrator
        .launch(&FlowRef::new("tour"), None)
        .await
        .unwrap();
    manager.evaluate_all();
    assert!(!manager.is_mounted("plain"));
    assert!(manager.is_mounted("sticky"));

    manager.orchestrator.dismiss().await.unwrap();
    manager.evaluate_all();
    assert!(manager.is_mounted("plain"));
}

#[tokio::test(start_paused = true)]
async fn test_activation_starts_flow_at_configured_step() {
    let page = page_at("https://app.test/home");
    let manager = manager(&page);
    let mut config = fixed("help", VisibilityRules::default());
    config.activation.start_step = Some(StepRef::Id("two".to_string()));
    manager.register(config).unwrap();
    manager.evaluate_all();

    assert_eq!(manager.activate("help").await.unwrap(), Some(1));
    assert_eq!(
        manager.orchestrator.current_step(),
        Some((FlowRef::new("tour"), 1))
    );
    // Not self-dismissing: only the tour hides it.
    assert!(!is_dismissed(manager.ctx().durable(), "help"));
}

#[tokio::test(start_paused = true)]
async fn test_dismiss_after_first_activation() {
    let page = page_at("https://app.test/home");
    let manager = manager(&page);
    let id = manager
        .register_value(&json!({
            "flowId": "tour",
            "type": "button",
            "dismissAfterActivation": true
        }))
        .unwrap();
    manager.evaluate_all();
    assert!(manager.is_mounted(&id));

    manager.activate(&id).await.unwrap();
    assert!(!manager.is_mounted(&id));
    assert!(page.overlays_of(&id).is_empty());

    manager.orchestrator.dismiss().await.unwrap();
    manager.evaluate_all();
    assert!(!manager.is_mounted(&id));
    assert_eq!(
        manager.visibility(&id),
        Some(Visibility::Hidden(HiddenReason::Dismissed))
    );
    assert!(matches!(
        manager.activate(&id).await,
        Err(LauncherError::NotShown(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_element_launcher_follows_target() {
    let page = page_at("https://app.test/home");
    let manager = manager(&page);
    manager
        .register_value(&json!({
            "id": "save-hint",
            "flowId": "tour",
            "type": "beacon",
            "selector": "#save",
            "side": "right-of"
        }))
        .unwrap();

    manager.evaluate_all();
    assert!(manager.is_mounted("save-hint"));
    let placed = placement(&page, &manager, "save-hint");
    assert!(placed.translate);
    assert_eq!(placed.side, Some(Side::RightOf));
    assert!(placed.left >= 180.0);

    let save = page.find("#save").unwrap();
    page.remove(save);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let overlay = manager.overlay("save-hint").unwrap();
    assert!(!page.overlay(overlay).unwrap().visible);
}

#[tokio::test(start_paused = true)]
async fn test_element_launcher_reattaches_after_target_rerender() {
    let page = page_at("https://app.test/home");
    let manager = manager(&page);
    manager
        .register_value(&json!({
            "id": "save-hint",
            "flowId": "tour",
            "selector": "#save",
            "side": "right-of"
        }))
        .unwrap();
    manager.evaluate_all();
    let overlay = manager.overlay("save-hint").unwrap();

    page.remove(page.find("#save").unwrap());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!page.overlay(overlay).unwrap().visible);

    let body = page.find("body").unwrap();
    page.append(
        body,
        NodeSpec::new("button")
            .id("save")
            .text("Save")
            .rect(500.0, 100.0, 80.0, 30.0),
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    manager.evaluate_all();

    assert!(manager.is_mounted("save-hint"));
    assert_eq!(manager.overlay("save-hint"), Some(overlay));
    assert!(page.overlay(overlay).unwrap().visible);
    assert!(placement(&page, &manager, "save-hint").left >= 580.0);
}

#[tokio::test(start_paused = true)]
async fn test_element_launcher_waits_for_target() {
    let page = page_at("https://app.test/home");
    let manager = manager(&page);
    manager
        .register_value(&json!({
            "id": "export-hint",
            "flowId": "tour",
            "selector": "#export"
        }))
        .unwrap();

    manager.evaluate_all();
    assert!(!manager.is_mounted("export-hint"));

    let body = page.find("body").unwrap();
    page.append(
        body,
        NodeSpec::new("button")
            .id("export")
            .rect(300.0, 100.0, 80.0, 30.0),
    );
    manager.evaluate_all();
    assert!(manager.is_mounted("export-hint"));
}

#[tokio::test(start_paused = true)]
async fn test_unparsable_launcher_is_disabled() {
    let page = page_at("https://app.test/home");
    let manager = manager(&page);
    assert!(manager.register_value(&json!({ "type": "button" })).is_none());
    assert!(manager.register_value(&json!(42)).is_none());
    assert!(manager.ids().is_empty());
    assert!(matches!(
        manager.activate("missing").await,
        Err(LauncherError::Unknown(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_removes_launchers() {
    let page = page_at("https://app.test/home");
    let manager = manager(&page);
    manager.register(fixed("help", VisibilityRules::default())).unwrap();
    manager.evaluate_all();

    manager.shutdown();
    assert!(!manager.is_mounted("help"));
    assert!(page.overlays().is_empty());
    assert!(!manager.ctx().spawner().has_scope("launcher:help"));
}
