//! Declarative target specifications.
//!
//! A target spec describes which page element (or saved coordinate) a step,
//! beacon or launcher anchors to. Resolution against a live page is done by
//! the resolver in `wayfinder-anchor`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::geometry::{Rect, ScrollOffset};

/// Target specification.
///
/// Deserialized from whichever key is present: `selector`, `xpath`, `text`
/// or `absoluteCoordinates`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetSpec {
    Selector(SelectorTarget),
    XPath(XPathTarget),
    Text(TextTarget),
    Absolute(AbsoluteTarget),
}

impl TargetSpec {
    /// Build a plain selector target.
    pub fn selector(selector: impl Into<String>) -> Self {
        TargetSpec::Selector(SelectorTarget::new(selector))
    }

    /// Build a free-text target.
    pub fn text(text: impl Into<String>) -> Self {
        TargetSpec::Text(TextTarget {
            text: text.into(),
            validation: None,
        })
    }

    /// Build an xpath target.
    pub fn xpath(xpath: impl Into<String>) -> Self {
        TargetSpec::XPath(XPathTarget {
            xpath: xpath.into(),
            validation: None,
        })
    }

    /// Validation attributes carried by the spec, if any.
    pub fn validation(&self) -> Option<&ValidationAttrs> {
        match self {
            TargetSpec::Selector(s) => s.validation.as_ref(),
            TargetSpec::XPath(x) => x.validation.as_ref(),
            TargetSpec::Text(t) => t.validation.as_ref(),
            TargetSpec::Absolute(_) => None,
        }
    }

    /// Short human-readable description for logs.
    pub fn describe(&self) -> String {
        match self {
            TargetSpec::Selector(s) => format!("selector `{}`", s.selector),
            TargetSpec::XPath(x) => format!("xpath `{}`", x.xpath),
            TargetSpec::Text(t) => format!("text \"{}\"", t.text),
            TargetSpec::Absolute(a) => format!(
                "coordinates ({}, {})",
                a.absolute_coordinates.rect.x, a.absolute_coordinates.rect.y
            ),
        }
    }
}

/// Selector-based target with its fallback material.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorTarget {
    /// Primary selector string.
    pub selector: String,

    /// Policy applied when the primary selector matches several elements.
    #[serde(default)]
    pub disambiguation: Disambiguation,

    /// Selectors annotated with the index of the intended match.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexed_selectors: Vec<IndexedSelector>,

    /// Alternative selector strings tried after the primary one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,

    /// XPath captured alongside the selector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,

    /// Visible text captured alongside the selector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Attributes used to validate structural candidates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationAttrs>,
}

impl SelectorTarget {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            ..Default::default()
        }
    }

    pub fn with_validation(mut self, validation: ValidationAttrs) -> Self {
        self.validation = Some(validation);
        self
    }

    pub fn with_alternatives(mut self, alternatives: Vec<String>) -> Self {
        self.alternatives = alternatives;
        self
    }

    pub fn with_disambiguation(mut self, disambiguation: Disambiguation) -> Self {
        self.disambiguation = disambiguation;
        self
    }
}

/// A selector paired with the index of the intended element among its matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedSelector {
    pub selector: String,
    #[serde(default)]
    pub index: usize,
}

/// Disambiguation policy for multi-element matches.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disambiguation {
    /// Explicit index into the match list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,

    /// Per-selector index overrides.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub selector_index: HashMap<String, usize>,

    /// Fallback policy when no index is given.
    #[serde(default)]
    pub if_multiple: IfMultiple,
}

impl Disambiguation {
    /// Pick one element out of `count` candidates for `selector`.
    ///
    /// Per-selector index wins over the explicit index, which wins over the
    /// `if_multiple` policy. Out-of-range indices yield `None`.
    pub fn pick(&self, selector: &str, count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }
        let index = if let Some(i) = self.selector_index.get(selector) {
            *i
        } else if let Some(i) = self.index {
            i
        } else {
            match self.if_multiple {
                IfMultiple::First => 0,
                IfMultiple::Last => count - 1,
                IfMultiple::Index(i) => i,
            }
        };
        (index < count).then_some(index)
    }
}

/// What to do when a selector matches several elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IfMultiple {
    #[default]
    First,
    Last,
    Index(usize),
}

impl Serialize for IfMultiple {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            IfMultiple::First => serializer.serialize_str("first"),
            IfMultiple::Last => serializer.serialize_str("last"),
            IfMultiple::Index(i) => serializer.serialize_u64(*i as u64),
        }
    }
}

impl<'de> Deserialize<'de> for IfMultiple {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match &value {
            serde_json::Value::String(s) => match s.as_str() {
                "first" => Ok(IfMultiple::First),
                "last" => Ok(IfMultiple::Last),
                other => other
                    .parse::<usize>()
                    .map(IfMultiple::Index)
                    .map_err(|_| serde::de::Error::custom(format!("invalid ifMultiple: {other}"))),
            },
            serde_json::Value::Number(n) => n
                .as_u64()
                .map(|i| IfMultiple::Index(i as usize))
                .ok_or_else(|| serde::de::Error::custom("ifMultiple must be a non-negative integer")),
            _ => Err(serde::de::Error::custom("ifMultiple must be first, last or a number")),
        }
    }
}

/// XPath-only target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XPathTarget {
    pub xpath: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationAttrs>,
}

/// Free-text target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextTarget {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationAttrs>,
}

/// Saved absolute coordinates, used when the element cannot be re-queried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsoluteTarget {
    pub absolute_coordinates: SavedCoordinates,
}

/// Rectangle captured at save time plus the scroll offset in effect then.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedCoordinates {
    /// Viewport rectangle observed at capture time.
    pub rect: Rect,
    /// Window scroll offset at capture time.
    #[serde(default)]
    pub initial_scroll: ScrollOffset,
    /// The captured element sat inside a fixed-position ancestor.
    #[serde(default)]
    pub in_fixed_container: bool,
}

/// Attributes used to validate structural candidates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationAttrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub class_list: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

impl ValidationAttrs {
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.class_list.is_empty()
            && self.tag.is_none()
            && self.text.is_none()
            && self.href.is_none()
    }
}
