use super::*;

fn page() -> MemoryPage {
    MemoryPage::new(
        "https://app.example.com/dashboard?tab=1",
        NodeSpec::new("body")
            .rect(0.0, 0.0, 1280.0, 3000.0)
            .child(
                NodeSpec::new("button")
                    .id("save")
                    .class("btn")
                    .text("Save")
                    .rect(100.0, 1000.0, 80.0, 30.0),
            )
            .child(
                NodeSpec::new("div")
                    .id("panel")
                    .rect(0.0, 200.0, 400.0, 300.0)
                    .scrollable(0.0, 0.0)
                    .child(NodeSpec::new("span").id("inner").text("Row").rect(10.0, 400.0, 50.0, 20.0)),
            )
            .child(
                NodeSpec::new("header")
                    .fixed()
                    .rect(0.0, 0.0, 1280.0, 60.0)
                    .child(NodeSpec::new("a").id("logo").href("/").rect(10.0, 10.0, 40.0, 40.0)),
            ),
    )
}

#[test]
fn test_window_scroll_moves_rect() {
    let page = page();
    let save = page.element_by_id("save").unwrap();
    assert_eq!(page.bounding_rect(save).unwrap().y, 1000.0);

    page.scroll_window(0.0, 600.0);
    assert_eq!(page.bounding_rect(save).unwrap().y, 400.0);
}

#[test]
fn test_fixed_subtree_ignores_window_scroll() {
    let page = page();
    let logo = page.element_by_id("logo").unwrap();
    page.scroll_window(0.0, 600.0);
    assert_eq!(page.bounding_rect(logo).unwrap().y, 10.0);
}

#[test]
fn test_container_scroll() {
    let page = page();
    let panel = page.element_by_id("panel").unwrap();
    let inner = page.element_by_id("inner").unwrap();
    page.scroll_element(panel, 0.0, 150.0, false);
    assert_eq!(page.bounding_rect(inner).unwrap().y, 250.0);
    assert_eq!(page.scroll_offset(panel).y, 150.0);
}

#[test]
fn test_removed_element_is_detached() {
    let page = page();
    let save = page.element_by_id("save").unwrap();
    assert!(page.remove(save));
    assert!(!page.is_attached(save));
    assert!(page.bounding_rect(save).is_none());
    assert!(page.element_by_id("save").is_none());
}

#[test]
fn test_queries() {
    let page = page();
    assert_eq!(page.query_selector_all("button.btn").unwrap().len(), 1);
    assert!(page.query_selector_all("button[").is_err());
    assert!(page.evaluate_xpath("//span[text()='Row']").unwrap().is_some());
    assert_eq!(page.text_content(page.find("#panel").unwrap()).as_deref(), Some("Row"));
    assert_eq!(page.elements().len(), 6);
}

#[tokio::test]
async fn test_events_broadcast() {
    let page = page();
    let mut rx = page.subscribe();
    page.resize(800.0, 600.0);
    page.set_url("https://app.example.com/settings");
    page.append(page.find("body").unwrap(), NodeSpec::new("p"));

    assert_eq!(rx.recv().await.unwrap(), SurfaceEvent::Resize);
    assert!(matches!(rx.recv().await.unwrap(), SurfaceEvent::UrlChanged { .. }));
    assert_eq!(rx.recv().await.unwrap(), SurfaceEvent::Mutation);
    assert_eq!(page.viewport().width, 800.0);
}

#[test]
fn test_silent_container_scroll_emits_nothing() {
    let page = page();
    let mut rx = page.subscribe();
    let panel = page.element_by_id("panel").unwrap();
    page.scroll_element(panel, 0.0, 10.0, false);
    assert!(rx.try_recv().is_err());
    page.scroll_element(panel, 0.0, 20.0, true);
    assert!(rx.try_recv().is_ok());
}

#[test]
fn test_overlay_bookkeeping() {
    let page = page();
    let handle = page.mount_overlay(OverlaySpec::new(OverlayKind::Tooltip, "tour", 300.0));
    assert_eq!(page.overlay_size(handle), Some(Size::new(300.0, 120.0)));

    page.place_overlay(handle, OverlayPlacement::at(10.0, 20.0));
    page.set_overlay_visible(handle, false);
    let record = page.overlay(handle).unwrap();
    assert_eq!(record.placement.unwrap().left, 10.0);
    assert!(!record.visible);
    assert!(page.visible_overlays().is_empty());
    assert_eq!(page.overlays_of("tour").len(), 1);

    page.remove_overlay(handle);
    assert!(page.overlays().is_empty());
}

#[test]
fn test_url_changes_recorded() {
    let page = page();
    page.replace_url("/dashboard");
    page.open_tab("https://docs.example.com/");
    page.navigate("/pricing?wf_step=1");
    assert_eq!(
        page.navigations(),
        vec![
            NavigationRecord::Replace("https://app.example.com/dashboard".to_string()),
            NavigationRecord::NewTab("https://docs.example.com/".to_string()),
            NavigationRecord::Navigate("https://app.example.com/pricing?wf_step=1".to_string()),
        ]
    );
    assert_eq!(page.current_url(), "https://app.example.com/pricing?wf_step=1");
}

#[test]
fn test_eval_script() {
    let page = page();
    assert!(page.eval_script("track('x')").is_ok());
    assert!(page.eval_script("throw new Error('x')").is_err());
    assert_eq!(page.scripts().len(), 2);
}

#[test]
fn test_resolve_url() {
    let base = "https://a.com/app/page?x=1#h";
    assert_eq!(resolve_url(base, "/p"), "https://a.com/p");
    assert_eq!(resolve_url(base, "?y=2"), "https://a.com/app/page?y=2");
    assert_eq!(resolve_url(base, "#k"), "https://a.com/app/page?x=1#k");
    assert_eq!(resolve_url(base, "other"), "https://a.com/app/other");
    assert_eq!(resolve_url(base, "http://b.com"), "http://b.com");
    assert_eq!(resolve_url("https://a.com", "/p"), "https://a.com/p");
}
