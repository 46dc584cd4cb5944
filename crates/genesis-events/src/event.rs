//! The top-level `Event` tagged union carried on every Event Bus channel.

use crate::mutation::{MutationAppliedEvent, MutationFailedEvent, MutationReadyEvent};
use crate::plan::EvolutionPlanEvent;
use crate::trigger::{EvolutionTrigger, Severity};
use genesis_protocol::FeedMessage;
use genesis_world::Snapshot;
use serde::{Deserialize, Serialize};

/// A runtime parameter change applied at the most recent tick boundary,
/// published for narration and audit purposes (not for the Engine's own
/// consumption — it already owns the change).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamsChangedEvent {
    /// The parameter name that changed.
    pub name: String,
    /// The new value, as accepted by `genesis_world::config::validate_param`.
    pub value: serde_json::Value,
    /// Unix seconds the change took effect.
    pub occurred_at: u64,
}

/// An operator-issued request to force an evolution cycle regardless of
/// cooldown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionForceEvent {
    /// Free-text reason supplied by the operator.
    pub reason: Option<String>,
    /// Requested severity; the Watcher defaults to `High` when absent.
    pub severity: Option<Severity>,
    /// Unix seconds of the request.
    pub occurred_at: u64,
}

/// The tagged union over every event carried on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Event {
    /// A periodic telemetry aggregate.
    Telemetry(Snapshot),
    /// The Watcher detected an anomaly, or an operator forced one.
    EvolutionTrigger(EvolutionTrigger),
    /// The Architect produced a plan for an open cycle.
    EvolutionPlan(EvolutionPlanEvent),
    /// The Coder persisted a validated mutation.
    MutationReady(MutationReadyEvent),
    /// The Patcher installed a mutation into the live registry.
    MutationApplied(MutationAppliedEvent),
    /// A cycle could not proceed to a successful install.
    MutationFailed(MutationFailedEvent),
    /// An `ApplyParams` change took effect.
    ParamsChanged(ParamsChangedEvent),
    /// An operator asked for evolution to be forced.
    EvolutionForce(EvolutionForceEvent),
    /// A human-readable narration entry for stream observers.
    FeedMessage(FeedMessage),
}

impl Event {
    /// The `cycle_id` this event belongs to, when it has one. `Telemetry`
    /// and `ParamsChanged` carry none; `FeedMessage`'s cycle correlation, if
    /// any, lives in its own `metadata.cycle_id` string field instead.
    pub fn cycle_id(&self) -> Option<uuid::Uuid> {
        match self {
            Event::EvolutionTrigger(t) => Some(t.cycle_id),
            Event::EvolutionPlan(p) => Some(p.cycle_id),
            Event::MutationReady(m) => Some(m.cycle_id),
            Event::MutationApplied(m) => Some(m.cycle_id),
            Event::MutationFailed(m) => Some(m.cycle_id),
            Event::Telemetry(_)
            | Event::ParamsChanged(_)
            | Event::EvolutionForce(_)
            | Event::FeedMessage(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::{ProblemType, WorldContext};
    use uuid::Uuid;

    #[test]
    fn cycle_id_is_absent_from_ambient_events() {
        let event = Event::ParamsChanged(ParamsChangedEvent {
            name: "friction".to_string(),
            value: serde_json::json!(0.1),
            occurred_at: 0,
        });
        assert_eq!(event.cycle_id(), None);
    }

    #[test]
    fn cycle_id_is_present_on_pipeline_events() {
        let id = Uuid::nil();
        let event = Event::EvolutionTrigger(EvolutionTrigger {
            cycle_id: id,
            problem_type: ProblemType::Starvation,
            severity: Severity::High,
            snapshot_key: 10,
            world_context: WorldContext {
                entity_count: 5,
                mean_energy: 15.0,
                known_traits: vec!["wander".to_string()],
            },
            occurred_at: 0,
        });
        assert_eq!(event.cycle_id(), Some(id));
    }
}
