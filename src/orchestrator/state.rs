// src/orchestrator/state.rs - Batch lifecycle states

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Idle,
    Extracting,
    Clustering,
    Enriching,
    Finalizing,
    Completed,
    StoppedByUser,
    Failed,
}

impl BatchState {
    pub fn emoji(&self) -> &'static str {
        match self {
            BatchState::Idle => "⏳",
            BatchState::Extracting => "📥",
            BatchState::Clustering => "🧩",
            BatchState::Enriching => "✨",
            BatchState::Finalizing => "📦",
            BatchState::Completed => "✅",
            BatchState::StoppedByUser => "🛑",
            BatchState::Failed => "❌",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            BatchState::Idle => "Idle",
            BatchState::Extracting => "Extracting attributes",
            BatchState::Clustering => "Clustering duplicates",
            BatchState::Enriching => "Enriching records",
            BatchState::Finalizing => "Finalizing",
            BatchState::Completed => "Completed",
            BatchState::StoppedByUser => "Stopped by user",
            BatchState::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchState::Completed | BatchState::StoppedByUser | BatchState::Failed
        )
    }

    /// Position in the forward pipeline; terminal states share the last rank.
    fn rank(&self) -> u8 {
        match self {
            BatchState::Idle => 0,
            BatchState::Extracting => 1,
            BatchState::Clustering => 2,
            BatchState::Enriching => 3,
            BatchState::Finalizing => 4,
            BatchState::Completed | BatchState::StoppedByUser | BatchState::Failed => 5,
        }
    }

    /// Forward-only: stages may be skipped, never revisited. Any live state may
    /// stop or fail; only `Finalizing` completes.
    pub fn can_transition_to(&self, next: BatchState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            BatchState::Completed => *self == BatchState::Finalizing,
            BatchState::StoppedByUser | BatchState::Failed => true,
            _ => next.rank() > self.rank(),
        }
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.emoji(), self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        use BatchState::*;
        assert!(Idle.can_transition_to(Extracting));
        assert!(Extracting.can_transition_to(Clustering));
        assert!(Clustering.can_transition_to(Finalizing));
        assert!(Finalizing.can_transition_to(Completed));
        assert!(!Clustering.can_transition_to(Extracting));
        assert!(!Enriching.can_transition_to(Completed));
        assert!(!Idle.can_transition_to(Idle));
    }

    #[test]
    fn test_terminal_states_are_final() {
        use BatchState::*;
        for state in [Completed, StoppedByUser, Failed] {
            assert!(state.is_terminal());
            for next in [Idle, Extracting, Completed, StoppedByUser, Failed] {
                assert!(!state.can_transition_to(next));
            }
        }
        assert!(Idle.can_transition_to(StoppedByUser));
        assert!(Enriching.can_transition_to(Failed));
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&BatchState::StoppedByUser).unwrap(),
            "\"stopped_by_user\""
        );
        assert_eq!(BatchState::Completed.to_string(), "✅ Completed");
    }
}
