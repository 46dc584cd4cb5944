//! `EvolutionCycle` and its monotonic `Stage` progression.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One stage in a cycle's detect→plan→generate→load progression. Stages
/// only ever move forward; `Done` and `Failed` are terminal and reachable
/// from any non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// No cycle is in flight.
    Idle,
    /// A trigger has been emitted; the Architect has not yet responded.
    Triggered,
    /// The Architect is building or awaiting the LLM's plan.
    Planning,
    /// The Coder is generating, validating, and persisting a mutation.
    Coding,
    /// The Patcher is re-validating and installing the mutation.
    Patching,
    /// The cycle completed successfully.
    Done,
    /// The cycle was abandoned at some stage before completion.
    Failed,
}

impl Stage {
    /// `true` if `self` is `Done` or `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    /// `true` if advancing from `self` to `next` respects the monotonic
    /// ordering: either a strict forward step through the non-terminal
    /// sequence, or a transition into a terminal stage from anywhere
    /// non-terminal.
    pub fn can_advance_to(self, next: Stage) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next.is_terminal() {
            return true;
        }
        next > self
    }
}

/// Correlates every message belonging to one detect→plan→generate→load
/// chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionCycle {
    /// Stable identifier shared by every event in this cycle.
    pub cycle_id: Uuid,
    /// The cycle's current stage.
    pub stage: Stage,
    /// Unix seconds the cycle was opened.
    pub created_at: u64,
    /// Unix seconds of the most recent stage transition.
    pub updated_at: u64,
}

impl EvolutionCycle {
    /// Open a new cycle at `Triggered`, the first non-idle stage.
    pub fn open(cycle_id: Uuid, now: u64) -> Self {
        EvolutionCycle {
            cycle_id,
            stage: Stage::Triggered,
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance to `next`, if the transition is monotonic. Returns `false`
    /// (and leaves the cycle unchanged) on an illegal transition.
    pub fn advance(&mut self, next: Stage, now: u64) -> bool {
        if !self.stage.can_advance_to(next) {
            return false;
        }
        self.stage = next;
        self.updated_at = now;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_advance_strictly_forward() {
        assert!(Stage::Triggered.can_advance_to(Stage::Planning));
        assert!(!Stage::Planning.can_advance_to(Stage::Triggered));
        assert!(!Stage::Coding.can_advance_to(Stage::Coding));
    }

    #[test]
    fn any_non_terminal_stage_can_fail() {
        assert!(Stage::Planning.can_advance_to(Stage::Failed));
        assert!(Stage::Idle.can_advance_to(Stage::Done));
    }

    #[test]
    fn terminal_stages_never_advance_again() {
        assert!(!Stage::Done.can_advance_to(Stage::Failed));
        assert!(!Stage::Failed.can_advance_to(Stage::Done));
    }

    #[test]
    fn cycle_advance_rejects_illegal_transition_and_reports_failure() {
        let mut cycle = EvolutionCycle::open(Uuid::nil(), 100);
        assert!(!cycle.advance(Stage::Idle, 101));
        assert_eq!(cycle.stage, Stage::Triggered);
        assert_eq!(cycle.updated_at, 100);
        assert!(cycle.advance(Stage::Planning, 101));
        assert_eq!(cycle.updated_at, 101);
    }
}
