//! A handful of native (non-DSL) traits the world boots with, before any
//! evolution cycle has installed an LLM-generated one. These are ordinary
//! Rust implementations of [`crate::registry::Trait`] — the registry does
//! not distinguish native from DSL-interpreted implementations, exactly as
//! SPEC_FULL.md §9 describes.

use crate::registry::{Trait, TraitFault};
use crate::view::EntityView;

/// The logical name the genesis population is spawned with.
pub const WANDER: &str = "wander";
/// The logical name for passive resource foraging.
pub const FORAGE: &str = "forage";

/// Moves an entity a small deterministic step each tick, magnitude derived
/// from its age so distinct entities decorrelate without needing their own
/// RNG stream.
pub struct Wander;

impl Trait for Wander {
    fn execute(&self, view: &mut EntityView) -> Result<(), TraitFault> {
        let phase = (view.age % 8) as f32;
        let dx = (phase / 4.0 - 1.0).clamp(-1.0, 1.0);
        let dy = ((phase + 2.0) % 8.0 / 4.0 - 1.0).clamp(-1.0, 1.0);
        view.move_by(dx, dy);
        Ok(())
    }
}

/// Consumes from the nearest resource within a short radius every tick.
pub struct Forage;

impl Trait for Forage {
    fn execute(&self, view: &mut EntityView) -> Result<(), TraitFault> {
        view.consume_resource(10.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, EntityId};

    #[test]
    fn wander_moves_the_entity() {
        let entity = Entity::spawn(EntityId(1), 5.0, 5.0, 10.0, 10.0, 3, 0, None, 0, 1.0, 0.1, vec![]);
        let mut view = EntityView::from_entity(&entity, vec![], vec![]);
        let before = (view.x, view.y);
        Wander.execute(&mut view).expect("wander never faults");
        assert_ne!((view.x, view.y), before);
    }

    #[test]
    fn forage_queues_a_consumption_request() {
        let entity = Entity::spawn(EntityId(1), 0.0, 0.0, 10.0, 10.0, 0, 0, None, 0, 1.0, 0.1, vec![]);
        let mut view = EntityView::from_entity(&entity, vec![], vec![]);
        Forage.execute(&mut view).expect("forage never faults");
        assert_eq!(view.pending_consumption.len(), 1);
    }
}
