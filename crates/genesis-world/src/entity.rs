//! The Molbot entity: identity, position, metabolism, and trait membership.
//!
//! Entities are owned exclusively by the [`crate::engine::Engine`]; every
//! other component only ever sees a [`crate::snapshot::Snapshot`] or a
//! [`crate::frame_view::EntityFrameView`] derived from one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A monotonic numeric handle, unique for the lifetime of the process.
///
/// spec.md asks for "a stable opaque id plus a monotonic numeric handle for
/// binary framing"; in a single-process Rust server there is nothing a
/// separate opaque id would protect that the numeric handle does not
/// already guarantee, so the two are unified here (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// The handle's raw numeric value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Logical trait name, stable across versions of its implementation.
pub type TraitName = String;

/// An entity's coarse lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// The entity is being simulated by the tick loop.
    Alive,
    /// The entity has died; it is retained for one tick for telemetry
    /// accounting, then removed from the world.
    Dead,
}

/// Why an entity died, used to tally the Telemetry Collector's
/// death-cause histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeathCause {
    /// Energy reached zero or below.
    Starvation,
    /// Age exceeded the species maximum age.
    OldAge,
    /// A collision or environmental hazard killed the entity.
    Collision,
    /// An operator issued a `POST /entities/:id/kill` command.
    OperatorKill,
}

impl DeathCause {
    /// A stable lowercase label for telemetry keys and narration.
    pub fn as_str(self) -> &'static str {
        match self {
            DeathCause::Starvation => "starvation",
            DeathCause::OldAge => "old_age",
            DeathCause::Collision => "collision",
            DeathCause::OperatorKill => "operator_kill",
        }
    }
}

/// A single mobile Molbot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Stable numeric identity.
    pub id: EntityId,
    /// World x coordinate.
    pub x: f32,
    /// World y coordinate.
    pub y: f32,
    /// Current energy; death at or below zero.
    pub energy: f32,
    /// Energy ceiling; consuming a resource never pushes energy above this.
    pub max_energy: f32,
    /// Age in ticks since `born_at_tick`.
    pub age: u64,
    /// Generation number; zero for genesis entities.
    pub generation: u32,
    /// The entity this one was spawned from, if any.
    pub parent: Option<EntityId>,
    /// The tick at which this entity was created.
    pub born_at_tick: u64,
    /// Packed `0x00RRGGBB` render color.
    pub color: u32,
    /// Render radius.
    pub radius: f32,
    /// Per-tick energy drain from metabolism alone (before trait effects).
    pub metabolism_rate: f32,
    /// Names of traits currently active on this entity, insertion order.
    pub active_traits: Vec<TraitName>,
    /// Trait names deactivated on this entity after a runtime fault; these
    /// are never re-activated automatically.
    pub deactivated_traits: BTreeSet<TraitName>,
    /// Alive or dead.
    pub state: LifecycleState,
}

/// Per-species constants not carried on every entity instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeciesLimits {
    /// Age in ticks beyond which an entity dies of old age.
    pub max_age: u64,
}

impl Default for SpeciesLimits {
    fn default() -> Self {
        SpeciesLimits { max_age: 10_000 }
    }
}

impl Entity {
    /// Construct a freshly spawned entity with the given traits.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        id: EntityId,
        x: f32,
        y: f32,
        energy: f32,
        max_energy: f32,
        born_at_tick: u64,
        generation: u32,
        parent: Option<EntityId>,
        color: u32,
        radius: f32,
        metabolism_rate: f32,
        active_traits: Vec<TraitName>,
    ) -> Self {
        Entity {
            id,
            x,
            y,
            energy,
            max_energy,
            age: 0,
            generation,
            parent,
            born_at_tick,
            color,
            radius,
            metabolism_rate,
            active_traits,
            deactivated_traits: BTreeSet::new(),
            state: LifecycleState::Alive,
        }
    }

    /// `true` when this entity is still being simulated.
    pub fn is_alive(&self) -> bool {
        matches!(self.state, LifecycleState::Alive)
    }

    /// Deactivate `name` on this entity: remove it from the active list and
    /// record it so it is never reinstated by a later spawn or swap.
    pub fn deactivate_trait(&mut self, name: &str) {
        self.active_traits.retain(|t| t != name);
        self.deactivated_traits.insert(name.to_string());
    }

    /// Apply one tick's worth of metabolic drain and aging. Does not decide
    /// death; the engine evaluates that against the result.
    pub fn age_and_drain(&mut self) {
        self.age += 1;
        self.energy -= self.metabolism_rate;
    }

    /// Evaluate whether this entity should die this tick, and why.
    pub fn death_cause(&self, limits: SpeciesLimits) -> Option<DeathCause> {
        if self.energy <= 0.0 {
            Some(DeathCause::Starvation)
        } else if self.age > limits.max_age {
            Some(DeathCause::OldAge)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Entity {
        Entity::spawn(
            EntityId(1),
            0.0,
            0.0,
            50.0,
            100.0,
            0,
            0,
            None,
            0x00_33_cc_88,
            2.0,
            0.5,
            vec!["wander".to_string()],
        )
    }

    #[test]
    fn deactivating_a_trait_removes_it_and_remembers_it() {
        let mut e = sample();
        e.deactivate_trait("wander");
        assert!(e.active_traits.is_empty());
        assert!(e.deactivated_traits.contains("wander"));
    }

    #[test]
    fn drain_reduces_energy_and_increments_age() {
        let mut e = sample();
        e.age_and_drain();
        assert_eq!(e.age, 1);
        assert!((e.energy - 49.5).abs() < 1e-6);
    }

    #[test]
    fn death_cause_prefers_starvation_over_old_age() {
        let mut e = sample();
        e.energy = 0.0;
        e.age = 20_000;
        assert_eq!(e.death_cause(SpeciesLimits::default()), Some(DeathCause::Starvation));
    }

    #[test]
    fn alive_entity_under_limits_does_not_die() {
        let e = sample();
        assert_eq!(e.death_cause(SpeciesLimits::default()), None);
    }
}
