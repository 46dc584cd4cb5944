//! The Trait Executor (spec.md §4.2): runs each entity's active traits
//! under a per-trait hard budget and a per-tick global budget, keeping
//! every fault local to the entity that triggered it.

use crate::entity::Entity;
use crate::environment::Environment;
use crate::registry::{RegistrySnapshot, TraitFault};
use crate::spatial::SpatialIndex;
use crate::view::{ConsumeRequest, EntityView, NearbyEntity, NearbyResource};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// Per-trait and per-tick budgets (spec.md §4.2 defaults: 5 ms / 14 ms).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutorBudgets {
    /// Hard budget for a single `execute` invocation.
    pub per_trait: Duration,
    /// Shared budget for all invocations in one tick.
    pub per_tick: Duration,
}

impl Default for ExecutorBudgets {
    fn default() -> Self {
        ExecutorBudgets {
            per_trait: Duration::from_millis(5),
            per_tick: Duration::from_millis(14),
        }
    }
}

/// What happened while running one tick's worth of traits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickExecutionReport {
    /// Entities that had at least one trait fault (timeout or error) this tick.
    pub faulted_entities: Vec<(u64, String)>,
    /// Entities not processed this tick because the global budget ran out.
    pub skipped_entity_count: usize,
    /// `true` if the global per-tick budget was exhausted before finishing.
    pub budget_exhausted: bool,
}

/// Stateless executor; all configuration lives in [`ExecutorBudgets`].
pub struct TraitExecutor {
    budgets: ExecutorBudgets,
}

impl TraitExecutor {
    /// Build an executor with the given budgets.
    pub fn new(budgets: ExecutorBudgets) -> Self {
        TraitExecutor { budgets }
    }

    /// Run every living entity's active traits, in insertion order, against
    /// `registry` (a single snapshot held for the whole tick) and apply
    /// resulting movement/consumption to `entities`/`env`.
    pub fn run_tick(
        &self,
        entities: &mut [Entity],
        registry: &RegistrySnapshot,
        env: &mut Environment,
        spatial: &SpatialIndex,
    ) -> TickExecutionReport {
        let started = Instant::now();
        let mut report = TickExecutionReport::default();

        for idx in 0..entities.len() {
            if !entities[idx].is_alive() {
                continue;
            }
            if started.elapsed() >= self.budgets.per_tick {
                report.skipped_entity_count += entities.len() - idx;
                report.budget_exhausted = true;
                break;
            }

            let (nearby_entities, nearby_resources) = Self::gather_neighbours(&entities[idx], entities, env, spatial);
            let active_traits = entities[idx].active_traits.clone();
            let mut faulted_names = Vec::new();
            let mut view = EntityView::from_entity(&entities[idx], nearby_entities, nearby_resources);

            for name in &active_traits {
                let entry = match registry.get(name) {
                    Some(entry) => entry,
                    // A trait deactivated by a previous swap before this spawn's
                    // snapshot was taken; drop it silently from this entity.
                    None => {
                        faulted_names.push(name.clone());
                        continue;
                    }
                };
                let implementation = entry.implementation.clone();
                let (returned_view, result) = Self::execute_with_budget(implementation, view, self.budgets.per_trait);
                view = returned_view;
                if let Err(fault) = result {
                    faulted_names.push(name.clone());
                    tracing::warn!(entity = entities[idx].id.as_u64(), trait_name = %name, %fault, "trait fault; deactivating");
                }
            }

            for pending in std::mem::take(&mut view.pending_consumption) {
                Self::apply_consumption(&mut view, env, pending);
            }
            view.apply_to(&mut entities[idx]);

            for name in &faulted_names {
                entities[idx].deactivate_trait(name);
            }
            if !faulted_names.is_empty() {
                report
                    .faulted_entities
                    .push((entities[idx].id.as_u64(), faulted_names.join(",")));
            }
        }

        report
    }

    fn gather_neighbours(
        entity: &Entity,
        all: &[Entity],
        env: &Environment,
        spatial: &SpatialIndex,
    ) -> (Vec<NearbyEntity>, Vec<NearbyResource>) {
        let ids = spatial.neighbours_of(entity.x, entity.y);
        let nearby_entities = ids
            .into_iter()
            .filter(|id| *id != entity.id)
            .filter_map(|id| all.iter().find(|e| e.id == id))
            .map(|e| NearbyEntity {
                id: e.id.as_u64(),
                x: e.x,
                y: e.y,
                energy: e.energy,
            })
            .collect();
        let cell_radius = 50.0;
        let nearby_resources = env
            .resources
            .iter()
            .filter(|r| {
                let dx = r.x - entity.x;
                let dy = r.y - entity.y;
                dx * dx + dy * dy <= cell_radius * cell_radius
            })
            .map(|r| NearbyResource { x: r.x, y: r.y, amount: r.amount })
            .collect();
        (nearby_entities, nearby_resources)
    }

    fn apply_consumption(view: &mut EntityView, env: &mut Environment, request: ConsumeRequest) {
        let taken = env.consume_nearest(view.x, view.y, request.radius, request.amount);
        view.energy = (view.energy + taken).min(view.max_energy);
    }

    /// Run one invocation on a helper thread and enforce `budget` with a
    /// channel receive timeout. The trait body is CPU-bound, synchronous
    /// DSL interpretation (see SPEC_FULL.md §9), so a blocking helper thread
    /// is the correct primitive — the Engine's own tick thread never blocks
    /// on it past `budget`.
    fn execute_with_budget(
        implementation: std::sync::Arc<dyn crate::registry::Trait>,
        view: EntityView,
        budget: Duration,
    ) -> (EntityView, Result<(), TraitFault>) {
        let fallback = view.clone();
        let (tx, rx) = mpsc::channel();
        let mut worker_view = view;
        let _ = thread::Builder::new()
            .name("genesis-trait-exec".to_string())
            .spawn(move || {
                let result = implementation.execute(&mut worker_view);
                let _ = tx.send((worker_view, result));
            });

        match rx.recv_timeout(budget) {
            Ok(outcome) => outcome,
            Err(_) => (fallback, Err(TraitFault::Timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;
    use crate::registry::TraitRegistry;
    use std::sync::Arc;

    struct Forward;
    impl crate::registry::Trait for Forward {
        fn execute(&self, view: &mut EntityView) -> Result<(), TraitFault> {
            view.move_by(1.0, 0.0);
            Ok(())
        }
    }

    struct AlwaysFails;
    impl crate::registry::Trait for AlwaysFails {
        fn execute(&self, _view: &mut EntityView) -> Result<(), TraitFault> {
            Err(TraitFault::Error("boom".to_string()))
        }
    }

    struct Runaway;
    impl crate::registry::Trait for Runaway {
        fn execute(&self, _view: &mut EntityView) -> Result<(), TraitFault> {
            thread::sleep(Duration::from_millis(50));
            Ok(())
        }
    }

    fn one_entity(traits: Vec<&str>) -> Entity {
        Entity::spawn(
            EntityId(1),
            0.0,
            0.0,
            50.0,
            100.0,
            0,
            0,
            None,
            0,
            1.0,
            0.5,
            traits.into_iter().map(String::from).collect(),
        )
    }

    #[test]
    fn successful_trait_moves_entity_and_stays_active() {
        let registry = TraitRegistry::new();
        registry.register_native("forward", Arc::new(Forward));
        let snap = registry.snapshot();
        let mut entities = vec![one_entity(vec!["forward"])];
        let mut env = Environment::new(100.0, 100.0);
        let spatial = SpatialIndex::new(50.0);
        let executor = TraitExecutor::new(ExecutorBudgets::default());
        let report = executor.run_tick(&mut entities, &snap, &mut env, &spatial);
        assert_eq!(entities[0].x, 1.0);
        assert!(report.faulted_entities.is_empty());
        assert!(entities[0].active_traits.contains(&"forward".to_string()));
    }

    #[test]
    fn failing_trait_is_deactivated_but_entity_survives() {
        let registry = TraitRegistry::new();
        registry.register_native("bad", Arc::new(AlwaysFails));
        let snap = registry.snapshot();
        let mut entities = vec![one_entity(vec!["bad"])];
        let mut env = Environment::new(100.0, 100.0);
        let spatial = SpatialIndex::new(50.0);
        let executor = TraitExecutor::new(ExecutorBudgets::default());
        executor.run_tick(&mut entities, &snap, &mut env, &spatial);
        assert!(entities[0].is_alive());
        assert!(!entities[0].active_traits.contains(&"bad".to_string()));
        assert!(entities[0].deactivated_traits.contains("bad"));
    }

    #[test]
    fn timeout_deactivates_trait_without_applying_its_effect() {
        let registry = TraitRegistry::new();
        registry.register_native("runaway", Arc::new(Runaway));
        let snap = registry.snapshot();
        let mut entities = vec![one_entity(vec!["runaway"])];
        let mut env = Environment::new(100.0, 100.0);
        let spatial = SpatialIndex::new(50.0);
        let budgets = ExecutorBudgets {
            per_trait: Duration::from_millis(1),
            per_tick: Duration::from_millis(14),
        };
        let executor = TraitExecutor::new(budgets);
        executor.run_tick(&mut entities, &snap, &mut env, &spatial);
        assert!(entities[0].deactivated_traits.contains("runaway"));
    }

    #[test]
    fn exhausted_global_budget_skips_remaining_entities_without_error() {
        let registry = TraitRegistry::new();
        registry.register_native("runaway", Arc::new(Runaway));
        let snap = registry.snapshot();
        let mut entities = vec![one_entity(vec!["runaway"]), one_entity(vec!["runaway"])];
        entities[1].id = EntityId(2);
        let mut env = Environment::new(100.0, 100.0);
        let spatial = SpatialIndex::new(50.0);
        let budgets = ExecutorBudgets {
            per_trait: Duration::from_millis(100),
            per_tick: Duration::from_millis(1),
        };
        let executor = TraitExecutor::new(budgets);
        let report = executor.run_tick(&mut entities, &snap, &mut env, &spatial);
        assert!(report.budget_exhausted);
        assert!(report.skipped_entity_count >= 1);
    }
}
