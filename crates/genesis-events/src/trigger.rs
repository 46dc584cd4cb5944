//! Anomaly severity and the `EvolutionTrigger` event the Watcher Agent emits.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity band, totally ordered `low < medium < high < critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Lowest band.
    Low,
    /// Worth a plan but not urgent.
    Medium,
    /// Warrants immediate attention.
    High,
    /// Bypasses cooldown and the circuit breaker.
    Critical,
}

/// Which anomaly rule fired, or `ManualTest` for an operator-forced cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    /// Mean energy has dropped below the starvation threshold.
    Starvation,
    /// Alive count is approaching `min_population`.
    ExtinctionRisk,
    /// Alive count is approaching `max_entities`.
    Overpopulation,
    /// An operator issued `force_evolution` with no underlying anomaly.
    ManualTest,
}

impl ProblemType {
    /// The wire tag used in narration and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ProblemType::Starvation => "starvation",
            ProblemType::ExtinctionRisk => "extinction_risk",
            ProblemType::Overpopulation => "overpopulation",
            ProblemType::ManualTest => "manual_test",
        }
    }
}

/// A compact summary of the world state that led to a trigger, enough for
/// the Architect to build a prompt without re-reading the full snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldContext {
    /// Living entity count at trigger time.
    pub entity_count: usize,
    /// Mean energy at trigger time.
    pub mean_energy: f32,
    /// Currently-known trait names, for the Architect's "what may be modified" step.
    pub known_traits: Vec<String>,
}

/// Published by the Watcher Agent when an anomaly rule fires or an operator
/// forces evolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionTrigger {
    /// The cycle this trigger opens.
    pub cycle_id: Uuid,
    /// Which rule fired.
    pub problem_type: ProblemType,
    /// How urgent the trigger is.
    pub severity: Severity,
    /// The tick of the snapshot that produced this trigger.
    pub snapshot_key: u64,
    /// Context handed to the Architect.
    pub world_context: WorldContext,
    /// Unix seconds at emission.
    pub occurred_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_matches_spec() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn problem_type_tags_are_snake_case() {
        assert_eq!(ProblemType::ExtinctionRisk.as_str(), "extinction_risk");
        assert_eq!(ProblemType::ManualTest.as_str(), "manual_test");
    }
}
