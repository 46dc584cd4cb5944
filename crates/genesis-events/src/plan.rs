//! The `EvolutionPlan` event the Architect Agent emits.

use crate::trigger::EvolutionTrigger;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of change the Architect is proposing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// Introduce a brand-new trait.
    NewTrait,
    /// Replace an existing trait's implementation.
    ModifyTrait,
    /// Adjust engine parameters rather than trait code.
    AdjustParams,
}

/// The structured reply the Architect's LLM call must produce, per
/// spec.md's five-field JSON contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// What kind of change this is.
    pub change_type: ChangeType,
    /// The trait name this plan targets, new or existing.
    pub target_class: String,
    /// The method the change concerns, when applicable.
    pub target_method: Option<String>,
    /// A natural-language description of the intended change.
    pub description: String,
    /// What the Architect expects this change to accomplish.
    pub expected_outcome: Option<String>,
    /// Free-text constraints the Coder must respect.
    pub constraints: Vec<String>,
}

/// Published once the Architect has a usable plan from the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionPlanEvent {
    /// The cycle this plan belongs to.
    pub cycle_id: Uuid,
    /// The plan itself.
    pub plan: Plan,
    /// The trigger that started this cycle, carried along for context.
    pub trigger: EvolutionTrigger,
    /// Unix seconds at emission.
    pub occurred_at: u64,
}
