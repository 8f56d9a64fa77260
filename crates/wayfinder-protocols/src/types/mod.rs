//! Plain data types of the tour model.

mod action;
mod condition;
mod flow;
mod geometry;
mod launcher;
mod target;

pub use action::{dismiss_first, Action, FlowRef, StepRef};
pub use condition::{Combinator, Condition};
pub use flow::{
    AutoStart, Block, Flow, FlowDefinition, Frequency, QuestionOption, SetupConfig, Step,
    StepEntry, StepPosition, StepType, StepUi,
};
pub use geometry::{
    Corner, PositionResult, Rect, ScrollOffset, Side, Size, TailPosition, ViewportInfo,
};
pub use launcher::{
    Activation, Appearance, AttachMode, LauncherConfig, LauncherKind, VisibilityRules,
};
pub use target::{
    AbsoluteTarget, Disambiguation, IfMultiple, IndexedSelector, SavedCoordinates,
    SelectorTarget, TargetSpec, TextTarget, ValidationAttrs, XPathTarget,
};

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
