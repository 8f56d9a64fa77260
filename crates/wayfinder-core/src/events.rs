//! Engine notifications.

use serde::Serialize;
use wayfinder_protocols::FlowRef;

/// Why a flow instance stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Dismissed,
    /// Ran past its last step.
    Completed,
    /// Left the page through a `navigate` action.
    Navigated,
    /// Unwound by a close-all dismissal of a nested flow.
    Unwound,
    /// Too many consecutive trigger transitions.
    HopLimit,
}

/// Published on the engine's broadcast channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    FlowStarted {
        flow_id: FlowRef,
        instance_id: String,
        step_index: usize,
    },
    StepRendered {
        flow_id: FlowRef,
        step_index: usize,
        step_id: String,
        anchored: bool,
    },
    StepSkipped {
        flow_id: FlowRef,
        step_index: usize,
        reason: String,
    },
    FlowPaused {
        flow_id: FlowRef,
    },
    FlowResumed {
        flow_id: FlowRef,
        step_index: usize,
    },
    FlowEnded {
        flow_id: FlowRef,
        reason: EndReason,
    },
    ActionFailed {
        flow_id: Option<FlowRef>,
        action: String,
        error: String,
    },
    LauncherShown {
        launcher_id: String,
    },
    LauncherHidden {
        launcher_id: String,
    },
}

impl EngineEvent {
    /// Flow start or end; launchers re-evaluate on these.
    pub fn changes_active_flows(&self) -> bool {
        matches!(
            self,
            EngineEvent::FlowStarted { .. }
                | EngineEvent::FlowEnded { .. }
                | EngineEvent::FlowPaused { .. }
                | EngineEvent::FlowResumed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = EngineEvent::FlowEnded {
            flow_id: FlowRef::new("tour"),
            reason: EndReason::Dismissed,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "flow_ended");
        assert_eq!(json["flow_id"], "tour");
        assert_eq!(json["reason"], "dismissed");
    }

    #[test]
    fn test_changes_active_flows() {
        assert!(EngineEvent::FlowPaused {
            flow_id: FlowRef::new("a")
        }
        .changes_active_flows());
        assert!(!EngineEvent::LauncherShown {
            launcher_id: "l".to_string()
        }
        .changes_active_flows());
    }
}
