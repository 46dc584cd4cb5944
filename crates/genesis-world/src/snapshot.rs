//! The Telemetry Collector (spec.md §4, C4): aggregates an immutable
//! [`Snapshot`] every `snapshot_interval` ticks from the live world.

use crate::entity::{DeathCause, Entity};
use crate::environment::Environment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// An immutable aggregate of world state at one tick, handed to the
/// Watcher Agent over the `Telemetry` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The tick this snapshot was captured at.
    pub tick: u64,
    /// Wall-clock milliseconds since the Unix epoch at capture time.
    pub wall_clock_millis: u64,
    /// Number of living entities.
    pub entity_count: usize,
    /// Mean energy across living entities (zero if none are alive).
    pub mean_energy: f32,
    /// Number of live resources in the environment.
    pub resource_count: usize,
    /// Death causes recorded since the previous snapshot.
    pub deaths_since_last: BTreeMap<String, u32>,
    /// Number of distinct trait names currently active across all entities.
    pub trait_diversity: usize,
    /// The most commonly active trait name, if any entity has one.
    pub dominant_trait: Option<String>,
}

impl Snapshot {
    /// Aggregate a snapshot from the live world at `tick`, given the death
    /// causes tallied since the previous snapshot.
    pub fn capture(tick: u64, entities: &[Entity], env: &Environment, deaths_since_last: &[DeathCause]) -> Self {
        let alive: Vec<&Entity> = entities.iter().filter(|e| e.is_alive()).collect();
        let entity_count = alive.len();
        let mean_energy = if entity_count == 0 {
            0.0
        } else {
            alive.iter().map(|e| e.energy).sum::<f32>() / entity_count as f32
        };

        let mut trait_counts: BTreeMap<String, usize> = BTreeMap::new();
        for e in &alive {
            for t in &e.active_traits {
                *trait_counts.entry(t.clone()).or_insert(0) += 1;
            }
        }
        let dominant_trait = trait_counts
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(name, _)| name.clone());

        let mut deaths: BTreeMap<String, u32> = BTreeMap::new();
        for cause in deaths_since_last {
            *deaths.entry(cause.as_str().to_string()).or_insert(0) += 1;
        }

        let wall_clock_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Snapshot {
            tick,
            wall_clock_millis,
            entity_count,
            mean_energy,
            resource_count: env.resources.len(),
            deaths_since_last: deaths,
            trait_diversity: trait_counts.len(),
            dominant_trait,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;

    #[test]
    fn empty_world_has_zero_mean_energy() {
        let env = Environment::new(100.0, 100.0);
        let snap = Snapshot::capture(1, &[], &env, &[]);
        assert_eq!(snap.entity_count, 0);
        assert_eq!(snap.mean_energy, 0.0);
    }

    #[test]
    fn dominant_trait_is_the_most_common_active_trait() {
        let e1 = Entity::spawn(EntityId(1), 0.0, 0.0, 10.0, 10.0, 0, 0, None, 0, 1.0, 0.1, vec!["forage".to_string()]);
        let e2 = Entity::spawn(EntityId(2), 0.0, 0.0, 10.0, 10.0, 0, 0, None, 0, 1.0, 0.1, vec!["forage".to_string()]);
        let e3 = Entity::spawn(EntityId(3), 0.0, 0.0, 10.0, 10.0, 0, 0, None, 0, 1.0, 0.1, vec!["wander".to_string()]);
        let env = Environment::new(100.0, 100.0);
        let snap = Snapshot::capture(5, &[e1, e2, e3], &env, &[DeathCause::Starvation]);
        assert_eq!(snap.dominant_trait, Some("forage".to_string()));
        assert_eq!(snap.trait_diversity, 2);
        assert_eq!(snap.deaths_since_last.get("starvation"), Some(&1));
    }
}
