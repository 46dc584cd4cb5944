//! The evolution-cycle event model: the `Event` tagged union carried on the
//! Event Bus, plus `EvolutionCycle`/`Stage` bookkeeping used to correlate a
//! detect→plan→generate→load chain by `cycle_id`.

/// The top-level `Event` enum.
pub mod event;
/// `EvolutionPlan` and its `Plan` payload.
pub mod plan;
/// `EvolutionCycle` and its `Stage` progression.
pub mod stage;
/// `EvolutionTrigger`, `Severity`, and `ProblemType`.
pub mod trigger;

/// `MutationReady`/`MutationApplied`/`MutationFailed`.
pub mod mutation;

pub use event::{Event, EvolutionForceEvent, ParamsChangedEvent};
pub use mutation::{FailureStage, MutationAppliedEvent, MutationFailedEvent, MutationReadyEvent};
pub use plan::{ChangeType, EvolutionPlanEvent, Plan};
pub use stage::{EvolutionCycle, Stage};
pub use trigger::{EvolutionTrigger, ProblemType, Severity, WorldContext};
