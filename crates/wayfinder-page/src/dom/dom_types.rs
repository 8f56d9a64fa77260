//! DOM type definitions: NodeAttributes, PageNode.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use wayfinder_protocols::{ComputedStyle, Rect, ScrollOffset};

/// Node attributes.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct NodeAttributes {
    /// Element ID attribute.
    pub id: Option<String>,
    /// Element class names.
    #[serde(default)]
    pub classes: Vec<String>,
    /// Href for links.
    pub href: Option<String>,
    /// Any other attribute.
    #[serde(default)]
    pub extra: HashMap<String, String>,
}

impl NodeAttributes {
    /// Attribute value by name, including `id`, `class` and `href`.
    pub fn get(&self, name: &str) -> Option<String> {
        match name {
            "id" => self.id.clone(),
            "class" => (!self.classes.is_empty()).then(|| self.classes.join(" ")),
            "href" => self.href.clone(),
            other => self.extra.get(other).cloned(),
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// Element of the page tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageNode {
    /// Tag name (lowercase).
    pub tag: String,
    pub attributes: NodeAttributes,
    /// Direct text only, not from children.
    pub text: String,
    /// Layout rectangle in document coordinates; viewport coordinates for
    /// fixed-position subtrees.
    pub rect: Rect,
    pub style: ComputedStyle,
    /// Scroll offset when the node is a scroll container.
    pub scroll: ScrollOffset,
    pub parent: Option<usize>,
    #[serde(default)]
    pub children: Vec<usize>,
    /// Cleared when the node is removed from its parent.
    pub attached: bool,
}
