use super::*;
use std::time::Duration;

use async_trait::async_trait;
use wayfinder_config::EngineConfig;
use wayfinder_page::{MemoryPage, NodeSpec};
use wayfinder_protocols::{
    Activation, Appearance, AttachMode, AuthValidator, AutoStart, Block, Corner, Flow,
    FlowDefinition, FlowLoader, LauncherConfig, LoadError, SetupConfig, Step, StepType,
    VisibilityRules,
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

fn page() -> Arc<MemoryPage> {
    Arc::new(MemoryPage::new(
        "https://app.test/home",
        NodeSpec::new("body").rect(0.0, 0.0, 1280.0, 2000.0),
    ))
}

fn flow(id: &str, setup: SetupConfig) -> Flow {
    let mut flow = Flow::from_steps(
        id,
        vec![Step::new("intro", StepType::Modal).with_block(Block::content("Welcome"))],
    );
    flow.setup = setup;
    flow
}

fn engine(page: &Arc<MemoryPage>, key: Option<&str>, flows: Vec<Flow>) -> Engine {
    let mut config = EngineConfig::default();
    config.auth.embed_key = key.map(str::to_string);
    let ctx = EngineContext::builder(page.clone(), Arc::new(NoFlows), Arc::new(AllowAll))
        .config(config)
        .build();
    for flow in flows {
        ctx.flows().insert(flow);
    }
    Engine::new(ctx)
}

fn launcher(id: &str, include: &[&str]) -> LauncherConfig {
    LauncherConfig {
        id: id.to_string(),
        appearance: Appearance::default(),
        attach: AttachMode::Fixed {
            corner: Corner::BottomLeft,
            offset_x: 20.0,
            offset_y: 20.0,
        },
        visibility: VisibilityRules {
            include: include.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        },
        activation: Activation {
            flow: FlowRef::new("tour"),
            start_step: None,
            dismiss_after_first_activation: false,
        },
    }
}

#[tokio::test(start_paused = true)]
async fn test_start_requires_authorization() {
    let page = page();
    let engine = engine(&page, None, vec![]);
    assert!(matches!(
        engine.start(&[FlowRef::new("tour")]).await,
        Err(EngineError::NotAuthorized)
    ));
    assert!(!engine.is_started());
}

#[tokio::test(start_paused = true)]
async fn test_force_start_immediate_and_auto_start_delayed() {
    let page = page();
    let engine = engine(
        &page,
        Some("pk_test"),
        vec![
            flow(
                "forced",
                SetupConfig {
                    force_start: true,
                    ..Default::default()
                },
            ),
            flow(
                "welcome",
                SetupConfig {
                    auto_start: Some(AutoStart {
                        delay_ms: Some(200),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ),
            flow("manual", SetupConfig::default()),
        ],
    );

    let report = engine
        .start(&[
            FlowRef::new("forced"),
            FlowRef::new("welcome"),
            FlowRef::new("manual"),
            FlowRef::new("unknown"),
        ])
        .await
        .unwrap();

    assert_eq!(report.started, vec![(FlowRef::new("forced"), 0)]);
    assert_eq!(report.scheduled, vec![FlowRef::new("welcome")]);
    assert_eq!(
        engine.orchestrator().visible_flow(),
        Some(FlowRef::new("forced"))
    );

    // The delayed auto-start pauses the forced flow.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(
        engine.orchestrator().visible_flow(),
        Some(FlowRef::new("welcome"))
    );
    assert_eq!(engine.orchestrator().paused_flows(), vec![FlowRef::new("forced")]);
}

#[tokio::test(start_paused = true)]
async fn test_launchers_follow_flow_lifecycle() {
    let page = page();
    let engine = engine(&page, Some("pk_test"), vec![flow("tour", SetupConfig::default())]);
    engine.launchers().register(launcher("help", &[])).unwrap();

    engine.start(&[]).await.unwrap();
    assert!(engine.launchers().is_mounted("help"));

    engine.launchers().activate("help").await.unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(!engine.launchers().is_mounted("help"));

    engine.orchestrator().dismiss().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(engine.launchers().is_mounted("help"));
}

#[tokio::test(start_paused = true)]
async fn test_url_change_reevaluates_launchers() {
    let page = page();
    let engine = engine(&page, Some("pk_test"), vec![]);
    engine
        .launchers()
        .register(launcher("billing-help", &["*/billing"]))
        .unwrap();
    engine.start(&[]).await.unwrap();
    assert!(!engine.launchers().is_mounted("billing-help"));

    page.set_url("https://app.test/billing");
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(engine.launchers().is_mounted("billing-help"));

    page.set_url("https://app.test/home");
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(!engine.launchers().is_mounted("billing-help"));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_clears_page() {
    let page = page();
    let engine = engine(
        &page,
        Some("pk_test"),
        vec![flow(
            "tour",
            SetupConfig {
                force_start: true,
                ..Default::default()
            },
        )],
    );
    engine.launchers().register(launcher("help", &[])).unwrap();
    let mut config = launcher("sticky", &[]);
    config.visibility.show_while_tour_active = true;
    engine.launchers().register(config).unwrap();

    engine.start(&[FlowRef::new("tour")]).await.unwrap();
    assert!(!page.overlays().is_empty());

    engine.shutdown();
    assert!(page.overlays().is_empty());
    assert!(!engine.is_started());
    assert_eq!(engine.context().spawner().metrics().active_scopes, 0);
}
