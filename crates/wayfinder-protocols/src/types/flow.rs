//! Flows, steps and blocks.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::action::{Action, FlowRef, StepRef};
use super::condition::Condition;
use super::geometry::{Corner, Side};
use super::target::TargetSpec;

/// Flow definition as delivered by a [`FlowLoader`](crate::FlowLoader).
///
/// Steps stay raw until [`Flow::ingest`] so that one malformed step cannot
/// poison the rest of the flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDefinition {
    pub flow_id: FlowRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    #[serde(default)]
    pub steps: Vec<Value>,
    #[serde(default)]
    pub setup: SetupConfig,
}

/// Start behaviour configured for a flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupConfig {
    /// Start whenever the flow is evaluated, regardless of auto-start conditions.
    #[serde(default)]
    pub force_start: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_start: Option<AutoStart>,
    /// While these conditions hold the flow must not start on its own.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub temporary_hide: Vec<Condition>,
}

/// Auto-start rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoStart {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub frequency: Frequency,
    /// Overrides the configured auto-start delay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

/// How often an auto-start may fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[default]
    Always,
    OncePerSession,
    OncePerUser,
}

/// Ingested flow.
#[derive(Debug, Clone)]
pub struct Flow {
    pub id: FlowRef,
    pub version_id: Option<String>,
    pub steps: Vec<StepEntry>,
    pub setup: SetupConfig,
}

/// One step slot: parsed, or kept as a malformed placeholder.
#[derive(Debug, Clone)]
pub enum StepEntry {
    Valid(Step),
    Malformed { id: Option<String>, reason: String },
}

impl StepEntry {
    pub fn as_step(&self) -> Option<&Step> {
        match self {
            StepEntry::Valid(step) => Some(step),
            StepEntry::Malformed { .. } => None,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            StepEntry::Valid(step) => Some(step.id.as_str()),
            StepEntry::Malformed { id, .. } => id.as_deref(),
        }
    }
}

impl Flow {
    /// Parse each raw step independently.
    pub fn ingest(definition: FlowDefinition) -> Self {
        let steps = definition
            .steps
            .into_iter()
            .map(|raw| match serde_json::from_value::<Step>(raw.clone()) {
                Ok(step) => StepEntry::Valid(step),
                Err(e) => StepEntry::Malformed {
                    id: raw.get("id").and_then(Value::as_str).map(str::to_string),
                    reason: e.to_string(),
                },
            })
            .collect();

        Self {
            id: definition.flow_id,
            version_id: definition.version_id,
            steps,
            setup: definition.setup,
        }
    }

    /// Build a flow from already-parsed steps.
    pub fn from_steps(id: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            id: FlowRef::new(id),
            version_id: None,
            steps: steps.into_iter().map(StepEntry::Valid).collect(),
            setup: SetupConfig::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn entry(&self, index: usize) -> Option<&StepEntry> {
        self.steps.get(index)
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index).and_then(StepEntry::as_step)
    }

    /// Resolve a step reference to an index in this flow.
    pub fn index_of(&self, step: &StepRef) -> Option<usize> {
        match step {
            StepRef::Index(i) => (*i < self.steps.len()).then_some(*i),
            StepRef::Id(id) => self.steps.iter().position(|s| s.id() == Some(id.as_str())),
        }
    }
}

/// Overlay type of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    #[default]
    Modal,
    Tooltip,
    Bubble,
}

/// A single step of a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    #[serde(rename = "type", default)]
    pub step_type: StepType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetSpec>,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub ui: StepUi,
    #[serde(default)]
    pub explicit_completion: bool,
    #[serde(default)]
    pub add_confetti: bool,
}

impl Step {
    pub fn new(id: impl Into<String>, step_type: StepType) -> Self {
        Self {
            id: id.into(),
            step_type,
            target: None,
            blocks: Vec::new(),
            ui: StepUi::default(),
            explicit_completion: false,
            add_confetti: false,
        }
    }

    pub fn with_target(mut self, target: TargetSpec) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn with_ui(mut self, ui: StepUi) -> Self {
        self.ui = ui;
        self
    }

    /// Trigger blocks in declaration order.
    pub fn triggers(&self) -> impl Iterator<Item = (&[Condition], &[Action])> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Trigger {
                conditions,
                actions,
                ..
            } => Some((conditions.as_slice(), actions.as_slice())),
            _ => None,
        })
    }

    pub fn has_triggers(&self) -> bool {
        self.blocks.iter().any(|b| matches!(b, Block::Trigger { .. }))
    }

    /// Blocks that produce visible UI.
    pub fn renderable_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| !matches!(b, Block::Trigger { .. }))
    }

    pub fn has_renderable_blocks(&self) -> bool {
        self.renderable_blocks().next().is_some()
    }

    /// Whether the step anchors to a page target.
    pub fn is_anchored(&self) -> bool {
        self.step_type != StepType::Modal && self.target.is_some()
    }

    pub fn find_block(&self, block_id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id() == Some(block_id))
    }
}

/// Step content block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Block {
    Content {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        body: String,
    },
    Question {
        id: String,
        #[serde(default)]
        prompt: String,
        #[serde(default)]
        options: Vec<QuestionOption>,
        /// Submitted after any option-specific actions.
        #[serde(default)]
        actions: Vec<Action>,
    },
    #[serde(rename_all = "camelCase")]
    Button {
        id: String,
        #[serde(default)]
        label: String,
        #[serde(default)]
        actions: Vec<Action>,
        /// Overrides the engine-wide dismiss-first ordering.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dismiss_first: Option<bool>,
    },
    Trigger {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        conditions: Vec<Condition>,
        #[serde(default)]
        actions: Vec<Action>,
    },
    Beacon {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Defaults to the step target.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<TargetSpec>,
    },
}

impl Block {
    pub fn id(&self) -> Option<&str> {
        match self {
            Block::Content { id, .. } | Block::Trigger { id, .. } | Block::Beacon { id, .. } => {
                id.as_deref()
            }
            Block::Question { id, .. } | Block::Button { id, .. } => Some(id.as_str()),
        }
    }

    pub fn button(id: impl Into<String>, label: impl Into<String>, actions: Vec<Action>) -> Self {
        Block::Button {
            id: id.into(),
            label: label.into(),
            actions,
            dismiss_first: None,
        }
    }

    pub fn content(body: impl Into<String>) -> Self {
        Block::Content {
            id: None,
            body: body.into(),
        }
    }

    pub fn trigger(conditions: Vec<Condition>, actions: Vec<Action>) -> Self {
        Block::Trigger {
            id: None,
            conditions,
            actions,
        }
    }
}

/// Answer option of a question block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub value: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// Presentation settings of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepUi {
    #[serde(default)]
    pub backdrop: bool,
    #[serde(default)]
    pub block_target_clicks: bool,
    #[serde(default)]
    pub position: StepPosition,
    #[serde(default = "default_step_width")]
    pub width: f64,
}

fn default_step_width() -> f64 {
    320.0
}

impl Default for StepUi {
    fn default() -> Self {
        Self {
            backdrop: false,
            block_target_clicks: false,
            position: StepPosition::default(),
            width: default_step_width(),
        }
    }
}

/// Requested position: a side of the target for tooltips, a screen corner
/// for bubbles, or the viewport center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepPosition {
    #[default]
    Auto,
    #[serde(alias = "top")]
    Above,
    #[serde(alias = "bottom")]
    Below,
    #[serde(alias = "left")]
    LeftOf,
    #[serde(alias = "right")]
    RightOf,
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl StepPosition {
    /// Preferred attachment side; `Auto` and non-side values prefer below.
    pub fn preferred_side(&self) -> Side {
        match self {
            StepPosition::Above => Side::Above,
            StepPosition::LeftOf => Side::LeftOf,
            StepPosition::RightOf => Side::RightOf,
            _ => Side::Below,
        }
    }

    pub fn corner(&self) -> Option<Corner> {
        match self {
            StepPosition::TopLeft => Some(Corner::TopLeft),
            StepPosition::TopRight => Some(Corner::TopRight),
            StepPosition::BottomLeft => Some(Corner::BottomLeft),
            StepPosition::BottomRight => Some(Corner::BottomRight),
            _ => None,
        }
    }
}
