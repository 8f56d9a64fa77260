//! Paused-flow stack.

use wayfinder_protocols::FlowRef;

use super::state::{FlowInstance, FlowState};

/// Flow superseded by a nested one, with the state to restore.
pub(crate) struct PausedFlow {
    pub instance: FlowInstance,
    pub resume_state: FlowState,
}

/// LIFO of paused flows; the last pushed is restored first.
#[derive(Default)]
pub(crate) struct PausedStack {
    entries: Vec<PausedFlow>,
}

impl PausedStack {
    pub fn push(&mut self, instance: FlowInstance) {
        let resume_state = instance.state;
        let mut instance = instance;
        instance.state = FlowState::Paused(instance.current);
        self.entries.push(PausedFlow {
            instance,
            resume_state,
        });
    }

    pub fn pop(&mut self) -> Option<PausedFlow> {
        self.entries.pop()
    }

    /// Every entry, top first.
    pub fn drain(&mut self) -> Vec<PausedFlow> {
        let mut drained: Vec<PausedFlow> = self.entries.drain(..).collect();
        drained.reverse();
        drained
    }

    /// Take a specific flow out of the stack.
    pub fn remove(&mut self, flow: &FlowRef) -> Option<PausedFlow> {
        let at = self
            .entries
            .iter()
            .position(|e| e.instance.flow_id() == flow)?;
        Some(self.entries.remove(at))
    }

    pub fn find(&self, flow: &FlowRef) -> Option<&PausedFlow> {
        self.entries.iter().find(|e| e.instance.flow_id() == flow)
    }

    /// Paused flow ids, bottom first.
    pub fn flow_ids(&self) -> Vec<FlowRef> {
        self.entries
            .iter()
            .map(|e| e.instance.flow_id().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wayfinder_protocols::Flow;

    fn instance(id: &str, current: usize) -> FlowInstance {
        let mut instance = FlowInstance::new(Arc::new(Flow::from_steps(id, vec![])));
        instance.current = current;
        instance.state = FlowState::Rendering(current);
        instance
    }

    #[test]
    fn test_lifo_and_pause_state() {
        let mut stack = PausedStack::default();
        stack.push(instance("a", 2));
        stack.push(instance("b", 0));
        assert_eq!(stack.flow_ids(), vec![FlowRef::new("a"), FlowRef::new("b")]);
        assert_eq!(
            stack.find(&FlowRef::new("a")).unwrap().instance.state,
            FlowState::Paused(2)
        );

        let top = stack.pop().unwrap();
        assert_eq!(top.instance.flow_id().as_str(), "b");
        assert_eq!(top.resume_state, FlowState::Rendering(0));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_drain_top_first() {
        let mut stack = PausedStack::default();
        stack.push(instance("a", 0));
        stack.push(instance("b", 0));
        let order: Vec<String> = stack
            .drain()
            .into_iter()
            .map(|e| e.instance.flow_id().to_string())
            .collect();
        assert_eq!(order, vec!["b", "a"]);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_remove() {
        let mut stack = PausedStack::default();
        stack.push(instance("a", 0));
        stack.push(instance("b", 0));
        assert!(stack.remove(&FlowRef::new("a")).is_some());
        assert!(stack.remove(&FlowRef::new("a")).is_none());
        assert_eq!(stack.flow_ids(), vec![FlowRef::new("b")]);
    }
}
