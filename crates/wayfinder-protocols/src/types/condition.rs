//! Display conditions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a condition combines with the accumulated result of the ones before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    /// `accumulator && result`.
    #[default]
    If,
    /// `accumulator || result`.
    Or,
    /// Any other value; the list it appears in does not match.
    #[serde(other)]
    Unrecognized,
}

/// A single URL, time or element predicate.
///
/// The variant is decided once when the JSON is ingested; unknown `type`
/// values become [`Condition::Unrecognized`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Condition {
    #[serde(rename_all = "camelCase")]
    Url {
        #[serde(default)]
        match_values: Vec<String>,
        #[serde(default)]
        no_match_values: Vec<String>,
        #[serde(default)]
        combinator: Combinator,
    },
    #[serde(rename_all = "camelCase")]
    Time {
        #[serde(default)]
        start: Option<DateTime<Utc>>,
        #[serde(default)]
        end: Option<DateTime<Utc>>,
        #[serde(default)]
        combinator: Combinator,
    },
    /// Element existence: any `match_values` selector matches and no
    /// `no_match_values` selector does.
    #[serde(rename_all = "camelCase")]
    Element {
        #[serde(default)]
        match_values: Vec<String>,
        #[serde(default)]
        no_match_values: Vec<String>,
        #[serde(default)]
        combinator: Combinator,
    },
    #[serde(other)]
    Unrecognized,
}

impl Condition {
    /// URL condition matching any of `values`.
    pub fn url(values: &[&str]) -> Self {
        Condition::Url {
            match_values: values.iter().map(|v| v.to_string()).collect(),
            no_match_values: Vec::new(),
            combinator: Combinator::If,
        }
    }

    /// Time window condition; either bound may be open.
    pub fn time(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Condition::Time {
            start,
            end,
            combinator: Combinator::If,
        }
    }

    /// Element existence condition.
    pub fn element(selectors: &[&str]) -> Self {
        Condition::Element {
            match_values: selectors.iter().map(|v| v.to_string()).collect(),
            no_match_values: Vec::new(),
            combinator: Combinator::If,
        }
    }

    /// Replace the combinator.
    pub fn with_combinator(mut self, value: Combinator) -> Self {
        match &mut self {
            Condition::Url { combinator, .. }
            | Condition::Time { combinator, .. }
            | Condition::Element { combinator, .. } => *combinator = value,
            Condition::Unrecognized => {}
        }
        self
    }

    pub fn combinator(&self) -> Combinator {
        match self {
            Condition::Url { combinator, .. }
            | Condition::Time { combinator, .. }
            | Condition::Element { combinator, .. } => *combinator,
            Condition::Unrecognized => Combinator::If,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Condition::Url { .. } => "url",
            Condition::Time { .. } => "time",
            Condition::Element { .. } => "element",
            Condition::Unrecognized => "unrecognized",
        }
    }
}
