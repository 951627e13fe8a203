//! Agent loop states and their allowed transitions.

use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    AwaitingModel,
    Streaming,
    DispatchingTools,
    Done,
    Failed,
    Cancelled,
}

impl LoopState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LoopState::Done | LoopState::Failed | LoopState::Cancelled)
    }

    /// Whether the loop may move from `self` to `next`.
    pub fn allows(self, next: LoopState) -> bool {
        use LoopState::*;
        match (self, next) {
            (_, Cancelled) => !self.is_terminal(),
            (Idle, AwaitingModel) => true,
            (AwaitingModel, Streaming | DispatchingTools | Done | Failed) => true,
            (Streaming, DispatchingTools | Done | Failed) => true,
            (DispatchingTools, AwaitingModel | Failed) => true,
            _ => false,
        }
    }

    pub(crate) fn transition(&mut self, next: LoopState) {
        debug_assert!(self.allows(next), "invalid loop transition {self:?} -> {next:?}");
        trace!(from = ?*self, to = ?next, "Loop state");
        *self = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_paths() {
        use LoopState::*;
        assert!(Idle.allows(AwaitingModel));
        assert!(AwaitingModel.allows(Streaming));
        assert!(Streaming.allows(DispatchingTools));
        assert!(DispatchingTools.allows(AwaitingModel));
        assert!(Streaming.allows(Done));
        assert!(AwaitingModel.allows(Done));
    }

    #[test]
    fn terminal_states_are_final() {
        use LoopState::*;
        for terminal in [Done, Failed, Cancelled] {
            assert!(terminal.is_terminal());
            for next in [Idle, AwaitingModel, Streaming, DispatchingTools, Done, Failed, Cancelled] {
                assert!(!terminal.allows(next), "{terminal:?} -> {next:?}");
            }
        }
    }

    #[test]
    fn cancel_from_any_live_state() {
        use LoopState::*;
        for live in [Idle, AwaitingModel, Streaming, DispatchingTools] {
            assert!(live.allows(Cancelled));
        }
    }

    #[test]
    fn invalid_shortcuts() {
        use LoopState::*;
        assert!(!Idle.allows(DispatchingTools));
        assert!(!Idle.allows(Done));
        assert!(!DispatchingTools.allows(Done));
        assert!(!DispatchingTools.allows(Streaming));
    }
}
