//! MemoryPage: the in-memory [`HostSurface`].

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, trace};
use wayfinder_protocols::{
    ComputedStyle, ElementHandle, ElementInfo, HostSurface, OverlayHandle, OverlayKind,
    OverlayPlacement, OverlaySpec, Rect, ScriptError, ScrollOffset, Size, SurfaceError,
    SurfaceEvent, ViewportInfo,
};

use crate::dom::{PageNode, PageTree};
use crate::fixture::{NodeSpec, PageFixture};
use crate::selector::SelectorList;
use crate::xpath::XPath;

const EVENT_CAPACITY: usize = 256;
const DEFAULT_OVERLAY_HEIGHT: f64 = 120.0;
const BEACON_SIZE: f64 = 16.0;

/// Overlay node mounted by the engine.
#[derive(Debug, Clone)]
pub struct OverlayRecord {
    pub handle: OverlayHandle,
    pub spec: OverlaySpec,
    pub placement: Option<OverlayPlacement>,
    pub visible: bool,
    pub size: Size,
}

/// URL changes requested through the surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationRecord {
    Replace(String),
    Navigate(String),
    NewTab(String),
}

struct PageState {
    tree: PageTree,
    url: String,
    viewport: ViewportInfo,
    overlays: BTreeMap<u64, OverlayRecord>,
    next_overlay: u64,
    navigations: Vec<NavigationRecord>,
    scripts: Vec<String>,
}

/// In-memory page.
pub struct MemoryPage {
    state: RwLock<PageState>,
    events: broadcast::Sender<SurfaceEvent>,
}

impl MemoryPage {
    pub fn new(url: impl Into<String>, root: NodeSpec) -> Self {
        Self::with_viewport(url, ViewportInfo::default(), root)
    }

    pub fn with_viewport(url: impl Into<String>, viewport: ViewportInfo, root: NodeSpec) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: RwLock::new(PageState {
                tree: PageTree::from_spec(&root),
                url: url.into(),
                viewport,
                overlays: BTreeMap::new(),
                next_overlay: 1,
                navigations: Vec::new(),
                scripts: Vec::new(),
            }),
            events,
        }
    }

    pub fn from_fixture(fixture: PageFixture) -> Self {
        Self::with_viewport(fixture.url, fixture.viewport, fixture.root)
    }

    fn emit(&self, event: SurfaceEvent) {
        if self.events.send(event).is_err() {
            trace!("No surface subscribers");
        }
    }

    // Simulation

    /// Scroll the window to an absolute offset.
    pub fn scroll_window(&self, x: f64, y: f64) {
        {
            let mut state = self.state.write();
            state.viewport.scroll_x = x;
            state.viewport.scroll_y = y;
        }
        self.emit(SurfaceEvent::Scroll { source: None });
    }

    /// Scroll a container to an absolute offset.
    ///
    /// `notify = false` models containers whose scroll does not dispatch a
    /// bubbling notification.
    pub fn scroll_element(&self, element: ElementHandle, x: f64, y: f64, notify: bool) {
        let updated = {
            let mut state = self.state.write();
            match state.tree.node_mut(element.0 as usize) {
                Some(node) => {
                    node.scroll = ScrollOffset { x, y };
                    true
                }
                None => false,
            }
        };
        if updated && notify {
            self.emit(SurfaceEvent::Scroll {
                source: Some(element),
            });
        }
    }

    pub fn resize(&self, width: f64, height: f64) {
        {
            let mut state = self.state.write();
            state.viewport.width = width;
            state.viewport.height = height;
        }
        self.emit(SurfaceEvent::Resize);
    }

    /// In-page URL change (history push, popstate or hash change).
    pub fn set_url(&self, url: impl Into<String>) {
        let url = url.into();
        self.state.write().url = url.clone();
        self.emit(SurfaceEvent::UrlChanged { url });
    }

    /// Append an element under `parent`.
    pub fn append(&self, parent: ElementHandle, spec: NodeSpec) -> Option<ElementHandle> {
        let id = self.state.write().tree.append(parent.0 as usize, &spec)?;
        self.emit(SurfaceEvent::Mutation);
        Some(ElementHandle(id as u64))
    }

    /// Remove an element from the tree.
    pub fn remove(&self, element: ElementHandle) -> bool {
        let removed = self.state.write().tree.detach(element.0 as usize);
        if removed {
            self.emit(SurfaceEvent::Mutation);
        }
        removed
    }

    /// Mutate a node in place.
    pub fn update<F>(&self, element: ElementHandle, f: F) -> bool
    where
        F: FnOnce(&mut PageNode),
    {
        let updated = {
            let mut state = self.state.write();
            match state.tree.node_mut(element.0 as usize) {
                Some(node) => {
                    f(node);
                    true
                }
                None => false,
            }
        };
        if updated {
            self.emit(SurfaceEvent::Mutation);
        }
        updated
    }

    /// Move a node without emitting any notification.
    pub fn move_silently(&self, element: ElementHandle, rect: Rect) {
        if let Some(node) = self.state.write().tree.node_mut(element.0 as usize) {
            node.rect = rect;
        }
    }

    /// Override the natural size reported for an overlay.
    pub fn set_overlay_size(&self, overlay: OverlayHandle, size: Size) {
        if let Some(record) = self.state.write().overlays.get_mut(&overlay.0) {
            record.size = size;
        }
    }

    // Inspection

    /// First element matching `selector`.
    pub fn find(&self, selector: &str) -> Option<ElementHandle> {
        self.query_selector_all(selector).ok()?.into_iter().next()
    }

    pub fn overlays(&self) -> Vec<OverlayRecord> {
        self.state.read().overlays.values().cloned().collect()
    }

    pub fn overlay(&self, overlay: OverlayHandle) -> Option<OverlayRecord> {
        self.state.read().overlays.get(&overlay.0).cloned()
    }

    pub fn overlays_of(&self, owner: &str) -> Vec<OverlayRecord> {
        self.state
            .read()
            .overlays
            .values()
            .filter(|o| o.spec.owner == owner)
            .cloned()
            .collect()
    }

    pub fn visible_overlays(&self) -> Vec<OverlayRecord> {
        self.state
            .read()
            .overlays
            .values()
            .filter(|o| o.visible)
            .cloned()
            .collect()
    }

    pub fn navigations(&self) -> Vec<NavigationRecord> {
        self.state.read().navigations.clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.state.read().scripts.clone()
    }

    fn handles(ids: Vec<usize>) -> Vec<ElementHandle> {
        ids.into_iter().map(|i| ElementHandle(i as u64)).collect()
    }
}

impl HostSurface for MemoryPage {
    fn current_url(&self) -> String {
        self.state.read().url.clone()
    }

    fn replace_url(&self, url: &str) {
        let resolved = {
            let mut state = self.state.write();
            let resolved = resolve_url(&state.url, url);
            state.url = resolved.clone();
            state.navigations.push(NavigationRecord::Replace(resolved.clone()));
            resolved
        };
        self.emit(SurfaceEvent::UrlChanged { url: resolved });
    }

    fn navigate(&self, url: &str) {
        let mut state = self.state.write();
        let resolved = resolve_url(&state.url, url);
        debug!(url = %resolved, "Page navigation");
        state.url = resolved.clone();
        state.navigations.push(NavigationRecord::Navigate(resolved));
    }

    fn open_tab(&self, url: &str) {
        let mut state = self.state.write();
        let resolved = resolve_url(&state.url, url);
        state.navigations.push(NavigationRecord::NewTab(resolved));
    }

    fn element_by_id(&self, id: &str) -> Option<ElementHandle> {
        self.state
            .read()
            .tree
            .find_by_id(id)
            .map(|i| ElementHandle(i as u64))
    }

    fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementHandle>, SurfaceError> {
        let parsed = SelectorList::parse(selector)?;
        let state = self.state.read();
        Ok(Self::handles(parsed.query_all(&state.tree)))
    }

    fn evaluate_xpath(&self, xpath: &str) -> Result<Option<ElementHandle>, SurfaceError> {
        let parsed = XPath::parse(xpath)?;
        let state = self.state.read();
        Ok(parsed.select_first(&state.tree).map(|i| ElementHandle(i as u64)))
    }

    fn elements(&self) -> Vec<ElementHandle> {
        Self::handles(self.state.read().tree.document_order())
    }

    fn element_info(&self, element: ElementHandle) -> Option<ElementInfo> {
        let state = self.state.read();
        let node = state.tree.node(element.0 as usize)?;
        Some(ElementInfo {
            tag: node.tag.clone(),
            id: node.attributes.id.clone(),
            classes: node.attributes.classes.clone(),
            href: node.attributes.href.clone(),
        })
    }

    fn attribute(&self, element: ElementHandle, name: &str) -> Option<String> {
        let state = self.state.read();
        state.tree.node(element.0 as usize)?.attributes.get(name)
    }

    fn text_content(&self, element: ElementHandle) -> Option<String> {
        let state = self.state.read();
        state.tree.node(element.0 as usize)?;
        Some(state.tree.text_content(element.0 as usize))
    }

    fn parent(&self, element: ElementHandle) -> Option<ElementHandle> {
        let state = self.state.read();
        state
            .tree
            .node(element.0 as usize)?
            .parent
            .map(|p| ElementHandle(p as u64))
    }

    fn is_attached(&self, element: ElementHandle) -> bool {
        self.state.read().tree.is_attached(element.0 as usize)
    }

    fn computed_style(&self, element: ElementHandle) -> Option<ComputedStyle> {
        let state = self.state.read();
        state.tree.node(element.0 as usize).map(|n| n.style.clone())
    }

    fn bounding_rect(&self, element: ElementHandle) -> Option<Rect> {
        let state = self.state.read();
        if !state.tree.is_attached(element.0 as usize) {
            return None;
        }
        state
            .tree
            .viewport_rect(element.0 as usize, state.viewport.scroll())
    }

    fn viewport(&self) -> ViewportInfo {
        self.state.read().viewport
    }

    fn scroll_offset(&self, element: ElementHandle) -> ScrollOffset {
        self.state
            .read()
            .tree
            .node(element.0 as usize)
            .map(|n| n.scroll)
            .unwrap_or_default()
    }

    fn subscribe(&self) -> broadcast::Receiver<SurfaceEvent> {
        self.events.subscribe()
    }

    fn mount_overlay(&self, spec: OverlaySpec) -> OverlayHandle {
        let mut state = self.state.write();
        let handle = OverlayHandle(state.next_overlay);
        state.next_overlay += 1;
        let size = match spec.kind {
            OverlayKind::Backdrop => state.viewport.size(),
            OverlayKind::Beacon => Size::new(BEACON_SIZE, BEACON_SIZE),
            OverlayKind::Launcher => Size::new(
                spec.width,
                spec.content
                    .get("height")
                    .and_then(serde_json::Value::as_f64)
                    .unwrap_or(spec.width),
            ),
            _ => Size::new(spec.width, DEFAULT_OVERLAY_HEIGHT),
        };
        debug!(overlay = handle.0, kind = ?spec.kind, owner = %spec.owner, "Overlay mounted");
        state.overlays.insert(
            handle.0,
            OverlayRecord {
                handle,
                spec,
                placement: None,
                visible: true,
                size,
            },
        );
        handle
    }

    fn overlay_size(&self, overlay: OverlayHandle) -> Option<Size> {
        self.state.read().overlays.get(&overlay.0).map(|o| o.size)
    }

    fn place_overlay(&self, overlay: OverlayHandle, placement: OverlayPlacement) {
        if let Some(record) = self.state.write().overlays.get_mut(&overlay.0) {
            record.placement = Some(placement);
        }
    }

    fn set_overlay_visible(&self, overlay: OverlayHandle, visible: bool) {
        if let Some(record) = self.state.write().overlays.get_mut(&overlay.0) {
            record.visible = visible;
        }
    }

    fn remove_overlay(&self, overlay: OverlayHandle) {
        if self.state.write().overlays.remove(&overlay.0).is_some() {
            debug!(overlay = overlay.0, "Overlay removed");
        }
    }

    /// Records the expression. Sources containing `throw` fail.
    fn eval_script(&self, source: &str) -> Result<(), ScriptError> {
        self.state.write().scripts.push(source.to_string());
        if source.contains("throw") {
            return Err(ScriptError::new(format!("uncaught exception in `{}`", source)));
        }
        Ok(())
    }
}

/// Resolve `target` against `base` the way a browser resolves an href.
pub(crate) fn resolve_url(base: &str, target: &str) -> String {
    if target.contains("://") {
        return target.to_string();
    }
    let origin_end = base
        .find("://")
        .map(|i| i + 3)
        .and_then(|start| base[start..].find('/').map(|p| start + p))
        .unwrap_or(base.len());
    let origin = &base[..origin_end];
    if target.starts_with('/') {
        return format!("{}{}", origin, target);
    }
    let without_fragment = base.split('#').next().unwrap_or(base);
    if target.starts_with('?') {
        let path = without_fragment.split('?').next().unwrap_or(without_fragment);
        return format!("{}{}", path, target);
    }
    if target.starts_with('#') {
        return format!("{}{}", without_fragment, target);
    }
    let path = without_fragment.split('?').next().unwrap_or(without_fragment);
    match path.rfind('/') {
        Some(i) if i >= origin_end => format!("{}/{}", &path[..i], target),
        _ => format!("{}/{}", origin, target),
    }
}

#[cfg(test)]
#[path = "page_tests.rs"]
mod tests;
