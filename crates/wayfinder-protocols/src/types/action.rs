//! Actions produced by buttons, questions, triggers and launchers.

use serde::{Deserialize, Serialize};

/// Reference to a flow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowRef(pub String);

impl FlowRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FlowRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FlowRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Reference to a step, either by id or by zero-based index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepRef {
    Index(usize),
    Id(String),
}

impl StepRef {
    /// Parse a marker value: all-digit strings are indices, anything else an id.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        Some(match value.parse::<usize>() {
            Ok(i) => StepRef::Index(i),
            Err(_) => StepRef::Id(value.to_string()),
        })
    }
}

impl std::fmt::Display for StepRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepRef::Index(i) => write!(f, "{}", i),
            StepRef::Id(id) => f.write_str(id),
        }
    }
}

/// Orchestrator action.
///
/// Unknown `type` values ingest as [`Action::Unrecognized`] and are skipped
/// at execution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    /// End the instance. `close_all` also unwinds every paused flow.
    #[serde(rename_all = "camelCase")]
    Dismiss {
        #[serde(default)]
        close_all: bool,
    },
    /// Jump to a step by id or index.
    GoToStep { step: StepRef },
    /// Leave the page, optionally marking the step to resume at.
    #[serde(rename_all = "camelCase")]
    Navigate {
        url: String,
        #[serde(default)]
        new_tab: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        forced_step: Option<StepRef>,
    },
    /// Start another flow, pausing the current one.
    #[serde(rename_all = "camelCase")]
    StartFlow {
        flow: FlowRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step_id: Option<String>,
    },
    /// Run a host-side expression; failures are swallowed.
    EvalScript { source: String },
    #[serde(other)]
    Unrecognized,
}

impl Action {
    pub fn dismiss() -> Self {
        Action::Dismiss { close_all: false }
    }

    pub fn go_to(step: StepRef) -> Self {
        Action::GoToStep { step }
    }

    pub fn start_flow(flow: impl Into<String>) -> Self {
        Action::StartFlow {
            flow: FlowRef::new(flow),
            step_id: None,
        }
    }

    pub fn is_dismiss(&self) -> bool {
        matches!(self, Action::Dismiss { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Action::Dismiss { .. } => "dismiss",
            Action::GoToStep { .. } => "goToStep",
            Action::Navigate { .. } => "navigate",
            Action::StartFlow { .. } => "startFlow",
            Action::EvalScript { .. } => "evalScript",
            Action::Unrecognized => "unrecognized",
        }
    }
}

/// Move any `dismiss` actions ahead of the others, keeping relative order.
pub fn dismiss_first(actions: &[Action]) -> Vec<Action> {
    let (dismiss, rest): (Vec<_>, Vec<_>) = actions.iter().cloned().partition(Action::is_dismiss);
    dismiss.into_iter().chain(rest).collect()
}
