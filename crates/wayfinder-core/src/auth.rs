//! Embed-key authorization, memoized per engine.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use wayfinder_protocols::{AuthValidator, HostSurface};

/// Page element that carries an embed key when none is configured.
struct PageKey {
    surface: Arc<dyn HostSurface>,
    element_id: String,
    attribute: String,
}

impl PageKey {
    fn read(&self) -> Option<String> {
        let element = self.surface.element_by_id(&self.element_id)?;
        self.surface.attribute(element, &self.attribute)
    }
}

/// Gate every engine activity on one validation of the embed key.
///
/// Concurrent callers share the same in-flight validation. Without a
/// configured key the page key element is consulted on every call until
/// one shows up; no key at all is unauthorized without consulting the
/// validator. A validator error counts as unauthorized for the rest of the
/// session.
pub struct AuthGate {
    key: Option<String>,
    page_key: Option<PageKey>,
    validator: Arc<dyn AuthValidator>,
    verdict: OnceCell<bool>,
}

impl AuthGate {
    pub fn new(key: Option<String>, validator: Arc<dyn AuthValidator>) -> Self {
        Self {
            key: non_blank(key),
            page_key: None,
            validator,
            verdict: OnceCell::new(),
        }
    }

    /// Fall back to `attribute` of the element with id `element_id`.
    pub fn with_page_key(
        mut self,
        surface: Arc<dyn HostSurface>,
        element_id: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        self.page_key = Some(PageKey {
            surface,
            element_id: element_id.into(),
            attribute: attribute.into(),
        });
        self
    }

    /// Configured key, else the one on the page.
    fn key(&self) -> Option<String> {
        if let Some(key) = &self.key {
            return Some(key.clone());
        }
        let key = non_blank(self.page_key.as_ref()?.read())?;
        debug!("Using embed key from the page");
        Some(key)
    }

    pub async fn is_authorized(&self) -> bool {
        if let Some(verdict) = self.cached() {
            return verdict;
        }
        let Some(key) = self.key() else {
            debug!("No embed key available yet");
            return false;
        };
        *self
            .verdict
            .get_or_init(|| async {
                match self.validator.validate(&key).await {
                    Ok(valid) => {
                        info!(authorized = valid, "Embed key validated");
                        valid
                    }
                    Err(e) => {
                        warn!(error = %e, "Embed key validation failed");
                        false
                    }
                }
            })
            .await
    }

    /// Memoized verdict, if validation already ran.
    pub fn cached(&self) -> Option<bool> {
        self.verdict.get().copied()
    }
}

fn non_blank(key: Option<String>) -> Option<String> {
    key.filter(|k| !k.trim().is_empty())
}
