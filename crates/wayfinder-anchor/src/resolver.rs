//! Target resolution.
//!
//! A target spec is resolved by trying a fixed sequence of strategies; the
//! first one producing a visible, validated element wins. A failed pass is
//! retried on a delay until the retry count or the overall timeout runs out.

use std::sync::Arc;
use std::time::Instant as StdInstant;

use tokio::time::Instant;
use tracing::{debug, warn};
use wayfinder_config::ResolverConfig;
use wayfinder_protocols::{
    ElementHandle, HostSurface, Rect, ResolutionError, SelectorTarget, TargetSpec,
    ValidationAttrs,
};

use crate::validation::{
    attribute_candidates, class_selector, is_visible, normalize, specificity, validates, Check,
};

const SKIPPED_TEXT_TAGS: [&str; 3] = ["script", "style", "noscript"];

/// Resolution strategy, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    ExactId,
    IndexedSelectors,
    PrimarySelector,
    Alternatives,
    AttributeCandidates,
    XPath,
    ClassOnly,
    TagOnly,
    TextWalk,
}

/// Element found by a single resolution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub element: ElementHandle,
    pub strategy: Strategy,
}

/// Live element plus the rectangle observed when it was resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedTarget {
    pub element: ElementHandle,
    pub rect: Rect,
    pub strategy: Strategy,
}

impl ResolvedTarget {
    /// Still attached to the render tree.
    pub fn is_valid(&self, surface: &dyn HostSurface) -> bool {
        surface.is_attached(self.element)
    }
}

/// Resolves target specs against a host surface.
#[derive(Clone)]
pub struct TargetResolver {
    surface: Arc<dyn HostSurface>,
    config: ResolverConfig,
}

impl TargetResolver {
    pub fn new(surface: Arc<dyn HostSurface>, config: ResolverConfig) -> Self {
        Self { surface, config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve with retries.
    ///
    /// Saved coordinates are not resolvable to an element and fail
    /// immediately with [`ResolutionError::Unresolvable`].
    pub async fn resolve(&self, spec: &TargetSpec) -> Result<ResolvedTarget, ResolutionError> {
        if matches!(spec, TargetSpec::Absolute(_)) {
            return Err(ResolutionError::Unresolvable(spec.describe()));
        }

        let deadline = Instant::now() + self.config.timeout();
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            if let Some(found) = self.resolve_once(spec) {
                if let Some(rect) = self.surface.bounding_rect(found.element) {
                    debug!(
                        target = %spec.describe(),
                        strategy = ?found.strategy,
                        attempts,
                        "Target resolved"
                    );
                    return Ok(ResolvedTarget {
                        element: found.element,
                        rect,
                        strategy: found.strategy,
                    });
                }
            }

            if attempts > self.config.max_retries {
                warn!(target = %spec.describe(), attempts, "Target not found");
                return Err(ResolutionError::NotFound {
                    target: spec.describe(),
                    attempts,
                });
            }
            if Instant::now() + self.config.retry_delay() > deadline {
                warn!(target = %spec.describe(), attempts, "Target resolution timed out");
                return Err(ResolutionError::Timeout(self.config.timeout_ms));
            }
            debug!(target = %spec.describe(), attempt = attempts, "Target not found yet, retrying");
            tokio::time::sleep(self.config.retry_delay()).await;
        }
    }

    /// One pass over every applicable strategy.
    pub fn resolve_once(&self, spec: &TargetSpec) -> Option<Resolution> {
        match spec {
            TargetSpec::Selector(target) => self.resolve_selector(target),
            TargetSpec::XPath(target) => self
                .by_xpath(&target.xpath, target.validation.as_ref())
                .map(|e| found(e, Strategy::XPath))
                .or_else(|| {
                    target
                        .validation
                        .as_ref()
                        .and_then(|attrs| self.by_attribute_candidates(attrs))
                        .map(|e| found(e, Strategy::AttributeCandidates))
                })
                .or_else(|| self.by_weak_structure(target.validation.as_ref()))
                .or_else(|| self.by_text_fallback(None, target.validation.as_ref())),
            TargetSpec::Text(target) => self
                .by_text(&target.text, target.validation.as_ref())
                .map(|e| found(e, Strategy::TextWalk)),
            TargetSpec::Absolute(_) => None,
        }
    }

    fn resolve_selector(&self, target: &SelectorTarget) -> Option<Resolution> {
        let validation = target.validation.as_ref();

        if let Some(element) = self.by_exact_id(target, validation) {
            return Some(found(element, Strategy::ExactId));
        }
        if let Some(element) = self.by_indexed_selectors(target, validation) {
            return Some(found(element, Strategy::IndexedSelectors));
        }
        if let Some(element) = self.by_primary_selector(target) {
            return Some(found(element, Strategy::PrimarySelector));
        }
        if let Some(element) = target
            .alternatives
            .iter()
            .find_map(|alt| self.first_matching(alt, validation, Check::Full))
        {
            return Some(found(element, Strategy::Alternatives));
        }
        if let Some(element) = validation.and_then(|attrs| self.by_attribute_candidates(attrs)) {
            return Some(found(element, Strategy::AttributeCandidates));
        }
        if let Some(element) = target
            .xpath
            .as_deref()
            .and_then(|x| self.by_xpath(x, validation))
        {
            return Some(found(element, Strategy::XPath));
        }
        self.by_weak_structure(validation)
            .or_else(|| self.by_text_fallback(target.text.as_deref(), validation))
    }

    /// Class-only, then tag-only.
    fn by_weak_structure(&self, validation: Option<&ValidationAttrs>) -> Option<Resolution> {
        let attrs = validation?;
        if let Some(element) = class_selector(&attrs.class_list)
            .and_then(|s| self.first_matching(&s, validation, Check::Content))
        {
            return Some(found(element, Strategy::ClassOnly));
        }
        attrs
            .tag
            .as_deref()
            .and_then(|tag| self.first_matching(&tag.to_ascii_lowercase(), validation, Check::Content))
            .map(|e| found(e, Strategy::TagOnly))
    }

    fn by_text_fallback(
        &self,
        text: Option<&str>,
        validation: Option<&ValidationAttrs>,
    ) -> Option<Resolution> {
        let text = text.or_else(|| validation.and_then(|v| v.text.as_deref()))?;
        self.by_text(text, None).map(|e| found(e, Strategy::TextWalk))
    }

    fn by_exact_id(
        &self,
        target: &SelectorTarget,
        validation: Option<&ValidationAttrs>,
    ) -> Option<ElementHandle> {
        let id = validation
            .and_then(|v| v.id.clone())
            .or_else(|| simple_id(&target.selector))?;
        let element = self.surface.element_by_id(&id)?;
        (self.visible(element) && validates(self.surface.as_ref(), element, validation, Check::Full))
            .then_some(element)
    }

    fn by_indexed_selectors(
        &self,
        target: &SelectorTarget,
        validation: Option<&ValidationAttrs>,
    ) -> Option<ElementHandle> {
        let mut ranked: Vec<(usize, (u32, u32, u32), Vec<ElementHandle>, usize)> = target
            .indexed_selectors
            .iter()
            .filter_map(|entry| {
                let matches = self.query(&entry.selector);
                (!matches.is_empty()).then(|| {
                    (matches.len(), specificity(&entry.selector), matches, entry.index)
                })
            })
            .collect();
        ranked.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(&a.1)));

        for (_, _, matches, index) in ranked {
            let accepted: Vec<ElementHandle> = matches
                .iter()
                .copied()
                .filter(|e| {
                    self.visible(*e)
                        && validates(self.surface.as_ref(), *e, validation, Check::Full)
                })
                .collect();
            if let Some(element) = matches.get(index).filter(|e| accepted.contains(e)) {
                return Some(*element);
            }
            if accepted.len() == 1 {
                return Some(accepted[0]);
            }
        }
        None
    }

    fn by_primary_selector(&self, target: &SelectorTarget) -> Option<ElementHandle> {
        if target.selector.trim().is_empty() {
            return None;
        }
        let matches = self.query(&target.selector);
        let index = match matches.len() {
            0 => return None,
            1 => 0,
            n => target.disambiguation.pick(&target.selector, n)?,
        };
        let element = matches[index];
        self.visible(element).then_some(element)
    }

    fn by_attribute_candidates(&self, attrs: &ValidationAttrs) -> Option<ElementHandle> {
        let mut candidates: Vec<(usize, Vec<ElementHandle>)> = attribute_candidates(attrs)
            .iter()
            .map(|s| self.query(s))
            .filter(|m| !m.is_empty())
            .map(|m| (m.len(), m))
            .collect();
        // Stable: equal counts keep id > tag+class > tag.
        candidates.sort_by_key(|(count, _)| *count);
        candidates.into_iter().find_map(|(_, matches)| {
            matches.into_iter().find(|e| {
                self.visible(*e) && validates(self.surface.as_ref(), *e, Some(attrs), Check::Content)
            })
        })
    }

    fn by_xpath(&self, xpath: &str, validation: Option<&ValidationAttrs>) -> Option<ElementHandle> {
        match self.surface.evaluate_xpath(xpath) {
            Ok(Some(element)) => (self.visible(element)
                && validates(self.surface.as_ref(), element, validation, Check::Full))
            .then_some(element),
            Ok(None) => None,
            Err(e) => {
                debug!(error = %e, "XPath rejected by surface");
                None
            }
        }
    }

    /// Bounded walk over the document comparing trimmed text.
    ///
    /// An exact match wins over containment; among exact matches the
    /// innermost one is taken, among containing ones the shortest text.
    fn by_text(&self, needle: &str, validation: Option<&ValidationAttrs>) -> Option<ElementHandle> {
        let needle = normalize(needle);
        if needle.is_empty() {
            return None;
        }
        let started = StdInstant::now();
        let budget = self.config.text_walk_budget();

        let mut exact: Vec<ElementHandle> = Vec::new();
        let mut containing: Option<(usize, ElementHandle)> = None;
        for element in self.surface.elements() {
            if started.elapsed() > budget {
                debug!(budget_ms = self.config.text_walk_budget_ms, "Text walk budget exhausted");
                break;
            }
            if self.in_skipped_subtree(element) {
                continue;
            }
            let Some(text) = self.surface.text_content(element) else {
                continue;
            };
            let text = normalize(&text);
            if !text.contains(&needle) {
                continue;
            }
            if !self.visible(element)
                || !validates(self.surface.as_ref(), element, validation, Check::Content)
            {
                continue;
            }
            if text == needle {
                exact.push(element);
            } else if containing.is_none_or(|(len, _)| text.len() < len) {
                containing = Some((text.len(), element));
            }
        }

        if let Some(first) = exact.first().copied() {
            let mut chosen = first;
            for candidate in exact.iter().skip(1) {
                if self.is_ancestor(chosen, *candidate) {
                    chosen = *candidate;
                } else {
                    break;
                }
            }
            return Some(chosen);
        }
        containing.map(|(_, e)| e)
    }

    fn first_matching(
        &self,
        selector: &str,
        validation: Option<&ValidationAttrs>,
        check: Check,
    ) -> Option<ElementHandle> {
        self.query(selector).into_iter().find(|e| {
            self.visible(*e) && validates(self.surface.as_ref(), *e, validation, check)
        })
    }

    fn query(&self, selector: &str) -> Vec<ElementHandle> {
        match self.surface.query_selector_all(selector) {
            Ok(matches) => matches,
            Err(e) => {
                debug!(error = %e, "Selector rejected by surface");
                Vec::new()
            }
        }
    }

    fn visible(&self, element: ElementHandle) -> bool {
        is_visible(self.surface.as_ref(), element)
    }

    fn in_skipped_subtree(&self, element: ElementHandle) -> bool {
        let mut current = Some(element);
        while let Some(e) = current {
            if self
                .surface
                .element_info(e)
                .is_some_and(|info| SKIPPED_TEXT_TAGS.contains(&info.tag.as_str()))
            {
                return true;
            }
            current = self.surface.parent(e);
        }
        false
    }

    fn is_ancestor(&self, ancestor: ElementHandle, element: ElementHandle) -> bool {
        let mut current = self.surface.parent(element);
        while let Some(e) = current {
            if e == ancestor {
                return true;
            }
            current = self.surface.parent(e);
        }
        false
    }
}

fn found(element: ElementHandle, strategy: Strategy) -> Resolution {
    Resolution { element, strategy }
}

/// `#ident` selectors name an id directly.
fn simple_id(selector: &str) -> Option<String> {
    let id = selector.trim().strip_prefix('#')?;
    (!id.is_empty() && id.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_'))
        .then(|| id.to_string())
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
