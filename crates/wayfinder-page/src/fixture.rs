//! JSON page fixtures.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wayfinder_protocols::{ComputedStyle, Rect, ScrollOffset, ViewportInfo};

/// Fixture loading errors.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid fixture: {0}")]
    Json(#[from] serde_json::Error),
}

/// Page description: URL, viewport and element tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageFixture {
    pub url: String,
    #[serde(default)]
    pub viewport: ViewportInfo,
    pub root: NodeSpec,
}

impl PageFixture {
    pub fn from_json(content: &str) -> Result<Self, FixtureError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

/// Declarative element description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Space separated class names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attrs: HashMap<String, String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub rect: Rect,
    #[serde(default)]
    pub style: StyleSpec,
    #[serde(default)]
    pub scroll: ScrollOffset,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

fn default_tag() -> String {
    "div".to_string()
}

impl Default for NodeSpec {
    fn default() -> Self {
        Self::new(default_tag())
    }
}

impl NodeSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            id: None,
            class: None,
            href: None,
            attrs: HashMap::new(),
            text: String::new(),
            rect: Rect::default(),
            style: StyleSpec::default(),
            scroll: ScrollOffset::default(),
            children: Vec::new(),
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    pub fn href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn rect(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.rect = Rect::new(x, y, width, height);
        self
    }

    pub fn style(mut self, style: StyleSpec) -> Self {
        self.style = style;
        self
    }

    /// `display: none`.
    pub fn hidden(mut self) -> Self {
        self.style.display = Some("none".to_string());
        self
    }

    /// `position: fixed`.
    pub fn fixed(mut self) -> Self {
        self.style.position = Some("fixed".to_string());
        self
    }

    /// `overflow: auto` with the given scroll offset.
    pub fn scrollable(mut self, x: f64, y: f64) -> Self {
        self.style.overflow_x = Some("auto".to_string());
        self.style.overflow_y = Some("auto".to_string());
        self.scroll = ScrollOffset { x, y };
        self
    }

    pub fn child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }
}

/// Partial style; unset properties take their initial values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StyleSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overflow_x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overflow_y: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
}

impl StyleSpec {
    pub fn resolve(&self) -> ComputedStyle {
        let initial = ComputedStyle::default();
        ComputedStyle {
            display: self.display.clone().unwrap_or(initial.display),
            visibility: self.visibility.clone().unwrap_or(initial.visibility),
            opacity: self.opacity.unwrap_or(initial.opacity),
            overflow_x: self.overflow_x.clone().unwrap_or(initial.overflow_x),
            overflow_y: self.overflow_y.clone().unwrap_or(initial.overflow_y),
            position: self.position.clone().unwrap_or(initial.position),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FIXTURE: &str = r##"{
        "url": "https://app.example.com/dashboard",
        "viewport": { "width": 1024, "height": 768, "scroll_x": 0, "scroll_y": 0 },
        "root": {
            "tag": "body",
            "rect": { "x": 0, "y": 0, "width": 1024, "height": 2000 },
            "children": [
                { "tag": "button", "id": "save", "class": "btn primary", "text": "Save",
                  "rect": { "x": 10, "y": 10, "width": 80, "height": 30 } },
                { "tag": "div", "style": { "display": "none" } }
            ]
        }
    }"##;

    #[test]
    fn test_parse_fixture() {
        let fixture = PageFixture::from_json(FIXTURE).unwrap();
        assert_eq!(fixture.viewport.width, 1024.0);
        assert_eq!(fixture.root.children.len(), 2);
        assert_eq!(fixture.root.children[0].class.as_deref(), Some("btn primary"));
        assert_eq!(fixture.root.children[1].style.resolve().display, "none");
        assert_eq!(fixture.root.children[0].style.resolve().display, "block");
    }

    #[test]
    fn test_load_fixture_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", FIXTURE).unwrap();
        let fixture = PageFixture::load(file.path()).unwrap();
        assert_eq!(fixture.url, "https://app.example.com/dashboard");
    }

    #[test]
    fn test_invalid_fixture() {
        assert!(matches!(
            PageFixture::from_json("{ \"root\": 1 }"),
            Err(FixtureError::Json(_))
        ));
    }
}
