//! `EntityView`: the owned, `Send`-safe projection of an entity handed to a
//! trait implementation for one `execute` call.
//!
//! A view is built fresh from the live [`crate::entity::Entity`] plus a
//! neighbour query before every invocation, and folded back into the entity
//! (and queued environment effects) after the invocation returns. This is
//! what lets the Trait Executor run a trait body on a helper thread under a
//! hard timeout (spec.md §4.2) without handing out a live reference into
//! world state that thread could hold past its budget.

use crate::entity::{Entity, LifecycleState, TraitName};
use serde::{Deserialize, Serialize};

/// A read-only snapshot of one neighbour, per spec.md §6's
/// `nearby_entities` whitelist entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NearbyEntity {
    /// The neighbour's numeric handle.
    pub id: u64,
    /// The neighbour's world x coordinate.
    pub x: f32,
    /// The neighbour's world y coordinate.
    pub y: f32,
    /// The neighbour's current energy.
    pub energy: f32,
}

/// A read-only snapshot of one nearby resource, per spec.md §6's
/// `nearby_resources` whitelist entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NearbyResource {
    /// World x coordinate.
    pub x: f32,
    /// World y coordinate.
    pub y: f32,
    /// Remaining amount.
    pub amount: f32,
}

/// A request, queued during `execute`, to consume from the environment's
/// nearest resource once the view is folded back by the executor (resource
/// mutation itself requires the environment, which a trait never sees
/// directly).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsumeRequest {
    /// Maximum amount requested.
    pub amount: f32,
    /// Search radius around the entity's position at request time.
    pub radius: f32,
}

/// The mutable, owned view of one entity passed to `Trait::execute`.
///
/// Every field here is exactly one of spec.md §6's whitelisted
/// `entity.<attr>` targets; there is no other way for a trait to read or
/// write world state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityView {
    /// World x coordinate; writable only via [`EntityView::move_by`].
    pub x: f32,
    /// World y coordinate; writable only via [`EntityView::move_by`].
    pub y: f32,
    /// Current energy.
    pub energy: f32,
    /// Energy ceiling.
    pub max_energy: f32,
    /// Age in ticks.
    pub age: u64,
    /// Generation number.
    pub generation: u32,
    /// `"alive"` or `"dead"`, per spec.md's string-typed `state` attribute.
    pub state: String,
    /// Active trait names.
    pub traits: Vec<TraitName>,
    /// Base metabolic drain rate.
    pub metabolism_rate: f32,
    /// This tick's effective drain rate; a trait may scale it up or down.
    pub energy_consumption_rate: f32,
    /// Neighbours within the spatial index's 3x3 cell window.
    pub nearby_entities: Vec<NearbyEntity>,
    /// Resources within the spatial index's 3x3 cell window.
    pub nearby_resources: Vec<NearbyResource>,
    /// Consumption requests queued this invocation, folded back by the
    /// executor after `execute` returns.
    #[serde(skip)]
    pub(crate) pending_consumption: Vec<ConsumeRequest>,
}

impl EntityView {
    /// Build a view from a live entity and its precomputed neighbour lists.
    pub fn from_entity(entity: &Entity, nearby_entities: Vec<NearbyEntity>, nearby_resources: Vec<NearbyResource>) -> Self {
        EntityView {
            x: entity.x,
            y: entity.y,
            energy: entity.energy,
            max_energy: entity.max_energy,
            age: entity.age,
            generation: entity.generation,
            state: match entity.state {
                LifecycleState::Alive => "alive".to_string(),
                LifecycleState::Dead => "dead".to_string(),
            },
            traits: entity.active_traits.clone(),
            metabolism_rate: entity.metabolism_rate,
            energy_consumption_rate: entity.metabolism_rate,
            nearby_entities,
            nearby_resources,
            pending_consumption: Vec::new(),
        }
    }

    /// Move the entity by a delta; the corresponding whitelisted method,
    /// `entity.move(dx, dy)`.
    pub fn move_by(&mut self, dx: f32, dy: f32) {
        self.x += dx;
        self.y += dy;
    }

    /// Request consumption from the nearest resource within `radius`; the
    /// corresponding whitelisted method, `entity.consume_resource(r)`.
    /// Actual resource depletion happens when the executor folds this view
    /// back against the live [`crate::environment::Environment`].
    pub fn consume_resource(&mut self, radius: f32) {
        self.pending_consumption.push(ConsumeRequest { amount: 5.0, radius });
    }

    /// Write the view's mutated fields back onto the live entity. Does not
    /// touch `age`/`deactivated_traits`/`parent`/etc., which the executor
    /// and engine own directly.
    pub fn apply_to(&self, entity: &mut Entity) {
        entity.x = self.x;
        entity.y = self.y;
        entity.energy = self.energy.min(self.max_energy);
        entity.metabolism_rate = self.energy_consumption_rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, EntityId};

    fn sample_entity() -> Entity {
        Entity::spawn(EntityId(1), 1.0, 1.0, 50.0, 100.0, 0, 0, None, 0, 1.0, 0.5, vec![])
    }

    #[test]
    fn move_by_updates_position() {
        let mut view = EntityView::from_entity(&sample_entity(), vec![], vec![]);
        view.move_by(2.0, -1.0);
        assert_eq!(view.x, 3.0);
        assert_eq!(view.y, 0.0);
    }

    #[test]
    fn apply_to_clamps_energy_at_max() {
        let entity = sample_entity();
        let mut view = EntityView::from_entity(&entity, vec![], vec![]);
        view.energy = 999.0;
        let mut target = entity;
        view.apply_to(&mut target);
        assert_eq!(target.energy, target.max_energy);
    }

    #[test]
    fn consume_resource_queues_a_request() {
        let mut view = EntityView::from_entity(&sample_entity(), vec![], vec![]);
        view.consume_resource(3.0);
        assert_eq!(view.pending_consumption.len(), 1);
        assert_eq!(view.pending_consumption[0].radius, 3.0);
    }
}
