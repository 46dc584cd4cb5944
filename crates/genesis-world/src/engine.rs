//! The World Engine (spec.md §4.1): the fixed-rate tick loop that owns and
//! mutates all entity state. Runs on its own dedicated OS thread, never
//! shared with any I/O-bound agent (SPEC_FULL.md §4.1 / §5).

use crate::config::{EngineConfig, ParamChange};
use crate::entity::{DeathCause, Entity, EntityId, LifecycleState, SpeciesLimits};
use crate::environment::Environment;
use crate::executor::TraitExecutor;
use crate::registry::TraitRegistry;
use crate::snapshot::Snapshot;
use crate::spatial::SpatialIndex;
use genesis_protocol::frame::{EntityRecord, ResourceRecord, WorldFrame};
use genesis_rng::{GlobalSeed, RngSubsystem};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Called with every telemetry snapshot as it's captured.
pub type SnapshotHook = Arc<dyn Fn(Snapshot) + Send + Sync>;
/// Called with every world frame as it's captured.
pub type FrameHook = Arc<dyn Fn(WorldFrame) + Send + Sync>;
/// Called at the same cadence as [`FrameHook`] with a full clone of every
/// living entity plus the environment's public fields, for an operator
/// surface running on another thread to read without touching the engine.
pub type StateHook = Arc<dyn Fn(Vec<Entity>, &Environment) + Send + Sync>;

fn noop_snapshot_hook() -> SnapshotHook {
    Arc::new(|_| {})
}

fn noop_frame_hook() -> FrameHook {
    Arc::new(|_| {})
}

fn noop_state_hook() -> StateHook {
    Arc::new(|_, _| {})
}

/// The live, mutable world plus the engine that drives it.
pub struct Engine {
    config: EngineConfig,
    entities: Vec<Entity>,
    env: Environment,
    registry: Arc<TraitRegistry>,
    species_limits: SpeciesLimits,
    seed: GlobalSeed,
    tick: u64,
    next_entity_id: u64,
    deaths_since_last_snapshot: Vec<DeathCause>,
    pending_params: Arc<Mutex<Vec<ParamChange>>>,
    pending_kills: Arc<Mutex<Vec<EntityId>>>,
    on_snapshot: SnapshotHook,
    on_frame: FrameHook,
    on_state: StateHook,
}

/// The tick-loop's dedicated OS thread could not be spawned.
#[derive(Debug, thiserror::Error)]
#[error("failed to spawn genesis-engine-tick thread: {0}")]
pub struct EngineStartError(#[from] std::io::Error);

/// A live handle to a started engine: lets a caller queue parameter
/// changes, queue an entity kill, and request a cooperative,
/// tick-boundary-respecting stop.
pub struct EngineHandle {
    stop_flag: Arc<AtomicBool>,
    pending_params: Arc<Mutex<Vec<ParamChange>>>,
    pending_kills: Arc<Mutex<Vec<EntityId>>>,
    done_rx: Mutex<mpsc::Receiver<()>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl EngineHandle {
    /// Queue a parameter change; applied at the boundary of the next tick.
    pub fn apply_params(&self, changes: Vec<ParamChange>) {
        self.pending_params.lock().extend(changes);
    }

    /// Queue an entity for death by operator command; applied at the
    /// boundary of the next tick, alongside the other death causes.
    pub fn kill_entity(&self, id: EntityId) {
        self.pending_kills.lock().push(id);
    }

    /// Request a stop. Idempotent; blocks until the in-flight tick
    /// completes and the engine thread has exited.
    pub fn stop(&self) {
        if self.stop_flag.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.done_rx.lock().recv();
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Engine {
    /// Construct a fresh world: `population` entities spawned with the
    /// registry's current native traits, and no resources yet.
    pub fn new(config: EngineConfig, registry: Arc<TraitRegistry>, population: u64) -> Self {
        let seed = GlobalSeed::from_genesis(config.genesis_seed);
        let species_limits = SpeciesLimits { max_age: config.max_age };
        let env = Environment::new(config.world_width, config.world_height);
        let mut engine = Engine {
            config,
            entities: Vec::new(),
            env,
            registry,
            species_limits,
            seed,
            tick: 0,
            next_entity_id: 1,
            deaths_since_last_snapshot: Vec::new(),
            pending_params: Arc::new(Mutex::new(Vec::new())),
            pending_kills: Arc::new(Mutex::new(Vec::new())),
            on_snapshot: noop_snapshot_hook(),
            on_frame: noop_frame_hook(),
            on_state: noop_state_hook(),
        };
        for _ in 0..population {
            engine.spawn_entity();
        }
        engine
    }

    /// Attach the snapshot hook, typically "publish to the bus".
    pub fn with_snapshot_hook(mut self, hook: SnapshotHook) -> Self {
        self.on_snapshot = hook;
        self
    }

    /// Attach the world-frame hook, typically "hand to the Stream Multiplexer".
    pub fn with_frame_hook(mut self, hook: FrameHook) -> Self {
        self.on_frame = hook;
        self
    }

    /// Attach the world-state hook, typically "publish a read-only snapshot
    /// of entities and environment for the operator surface to poll".
    pub fn with_state_hook(mut self, hook: StateHook) -> Self {
        self.on_state = hook;
        self
    }

    /// The current tick number.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Current living entity count.
    pub fn alive_count(&self) -> usize {
        self.entities.iter().filter(|e| e.is_alive()).count()
    }

    /// Read-only access to entities, for operator inspection.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Read-only access to the environment, for operator inspection.
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Spawn the deficit to reach `min_population`, or respawn.
    fn spawn_entity(&mut self) -> EntityId {
        let id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;
        let snap = self.registry.snapshot();
        let mut traits = Vec::new();
        for name in snap.names() {
            let draw = self.seed.stream(RngSubsystem::Spawn, id.as_u64()).probability(0.5);
            if draw {
                traits.push(name.clone());
            }
        }
        let x = self.seed.stream(RngSubsystem::Spawn, id.as_u64()).range_f32(0.0, self.config.world_width.max(1.0));
        let y = self.seed.stream(RngSubsystem::Spawn, id.as_u64()).range_f32(0.0, self.config.world_height.max(1.0));
        let entity = Entity::spawn(id, x, y, 50.0, 100.0, self.tick, 0, None, 0x00_33_cc_88, 2.0, 0.5, traits);
        self.entities.push(entity);
        id
    }

    /// Run the seven-step tick procedure once. Public so tests and a
    /// single-step harness can drive it without the background thread.
    pub fn step(&mut self) {
        // 1. Apply queued parameter changes and operator-issued kills.
        let changes: Vec<ParamChange> = std::mem::take(&mut *self.pending_params.lock());
        for change in changes {
            self.apply_param(change);
        }
        let kills: Vec<EntityId> = std::mem::take(&mut *self.pending_kills.lock());
        for id in kills {
            if let Some(entity) = self.entities.iter_mut().find(|e| e.id == id && e.is_alive()) {
                entity.state = LifecycleState::Dead;
                self.deaths_since_last_snapshot.push(DeathCause::OperatorKill);
            }
        }

        // 2. Run traits, then age + drain, for as many entities as the
        // global tick budget allows.
        let mut spatial = SpatialIndex::new(self.config.cell_size);
        spatial.rebuild(self.entities.iter().filter(|e| e.is_alive()).map(|e| (e.id, e.x, e.y)));
        let before_positions: Vec<(f32, f32)> = self.entities.iter().map(|e| (e.x, e.y)).collect();
        let snap = self.registry.snapshot();
        let executor = TraitExecutor::new(self.config.executor_budgets);
        let report = executor.run_tick(&mut self.entities, &snap, &mut self.env, &spatial);
        let processed = self.entities.len().saturating_sub(report.skipped_entity_count);
        if report.budget_exhausted {
            tracing::warn!(tick = self.tick, skipped = report.skipped_entity_count, "tick global trait budget exhausted");
        }
        for idx in 0..processed {
            if self.entities[idx].is_alive() {
                self.entities[idx].age_and_drain();
            }
        }

        // 3. Environment physics: friction-damped displacement, bounds, collisions.
        for idx in 0..processed {
            if !self.entities[idx].is_alive() {
                continue;
            }
            let (before_x, before_y) = before_positions[idx];
            let raw_dx = self.entities[idx].x - before_x;
            let raw_dy = self.entities[idx].y - before_y;
            let damped_dx = raw_dx * (1.0 - self.config.friction);
            let damped_dy = raw_dy * (1.0 - self.config.friction);
            let (wrapped_x, wrapped_y) = self.env.wrap(before_x + damped_dx, before_y + damped_dy);
            self.entities[idx].x = wrapped_x;
            self.entities[idx].y = wrapped_y;
        }
        self.resolve_collisions();

        // 4. Mark death.
        for entity in self.entities.iter_mut() {
            if !entity.is_alive() {
                continue;
            }
            if let Some(cause) = entity.death_cause(self.species_limits) {
                entity.state = LifecycleState::Dead;
                self.deaths_since_last_snapshot.push(cause);
            }
        }
        self.entities.retain(|e| e.is_alive());

        // 5. Respawn policy.
        self.respawn_if_needed();
        self.respawn_resources_if_needed();

        // 6. Telemetry snapshot.
        if self.config.snapshot_interval > 0 && self.tick % self.config.snapshot_interval == 0 {
            let snapshot = Snapshot::capture(self.tick, &self.entities, &self.env, &self.deaths_since_last_snapshot);
            self.deaths_since_last_snapshot.clear();
            (self.on_snapshot)(snapshot);
        }

        // 7. World frame for the Stream Multiplexer, and a full state
        // snapshot for the operator surface, at the same cadence.
        if self.config.stream_interval > 0 && self.tick % self.config.stream_interval == 0 {
            let frame = self.build_frame();
            (self.on_frame)(frame);
            (self.on_state)(self.entities.clone(), &self.env);
        }

        self.tick += 1;
    }

    fn apply_param(&mut self, change: ParamChange) {
        match change {
            ParamChange::TickRateMs(v) => self.config.tick_rate_ms = v,
            ParamChange::MinPopulation(v) => self.config.min_population = v,
            ParamChange::MaxEntities(v) => self.config.max_entities = v,
            ParamChange::Friction(v) => self.config.friction = v,
            ParamChange::SpawnRate(v) => self.config.spawn_rate = v,
            ParamChange::ResourceSpawnRate(v) => self.config.resource_spawn_rate = v,
        }
    }

    fn resolve_collisions(&mut self) {
        let mut spatial = SpatialIndex::new(self.config.cell_size);
        spatial.rebuild(self.entities.iter().filter(|e| e.is_alive()).map(|e| (e.id, e.x, e.y)));
        let ids: Vec<EntityId> = self.entities.iter().filter(|e| e.is_alive()).map(|e| e.id).collect();
        for &id in &ids {
            let Some(pos) = self.entities.iter().find(|e| e.id == id).map(|e| (e.x, e.y, e.radius)) else {
                continue;
            };
            let neighbours = spatial.neighbours_of(pos.0, pos.1);
            for other_id in neighbours {
                if other_id == id || other_id.as_u64() <= id.as_u64() {
                    // lower id wins the tie-break and never moves itself
                    continue;
                }
                let Some(other_pos) = self.entities.iter().find(|e| e.id == other_id).map(|e| (e.x, e.y, e.radius))
                else {
                    continue;
                };
                let dx = other_pos.0 - pos.0;
                let dy = other_pos.1 - pos.1;
                let dist = (dx * dx + dy * dy).sqrt().max(0.001);
                let overlap = pos.2 + other_pos.2 - dist;
                if overlap > 0.0 {
                    let push_x = dx / dist * overlap;
                    let push_y = dy / dist * overlap;
                    if let Some(other) = self.entities.iter_mut().find(|e| e.id == other_id) {
                        let (wx, wy) = self.env.clamp(other.x + push_x, other.y + push_y);
                        other.x = wx;
                        other.y = wy;
                    }
                }
            }
        }
    }

    fn respawn_if_needed(&mut self) {
        let alive = self.alive_count() as u64;
        if alive < self.config.min_population {
            let deficit = self.config.min_population - alive;
            for _ in 0..deficit {
                self.spawn_entity();
            }
            return;
        }
        if alive >= self.config.max_entities {
            return;
        }
        let probability = if self.config.max_entities == 0 {
            0.0
        } else {
            self.config.spawn_rate / self.config.max_entities as f32
        };
        let roll = self.seed.stream(RngSubsystem::Respawn, self.tick).probability(probability);
        if roll {
            self.spawn_entity();
        }
    }

    fn respawn_resources_if_needed(&mut self) {
        let probability = self.config.resource_spawn_rate / (self.config.max_entities.max(1) as f32);
        let roll = self.seed.stream(RngSubsystem::Physics, self.tick).probability(probability);
        if roll {
            let x = self
                .seed
                .stream(RngSubsystem::Physics, self.tick)
                .range_f32(0.0, self.config.world_width.max(1.0));
            let y = self
                .seed
                .stream(RngSubsystem::Physics, self.tick)
                .range_f32(0.0, self.config.world_height.max(1.0));
            self.env.resources.push(crate::environment::Resource { x, y, amount: 20.0 });
        }
    }

    fn build_frame(&self) -> WorldFrame {
        let entities = self
            .entities
            .iter()
            .filter(|e| e.is_alive())
            .map(|e| EntityRecord {
                id: e.id.as_u64() as u32,
                x: e.x,
                y: e.y,
                radius: e.radius,
                color: e.color,
                flags: 0,
            })
            .collect();
        let resources = self.env.resources.iter().map(|r| ResourceRecord { x: r.x, y: r.y }).collect();
        WorldFrame {
            tick: self.tick as u32,
            entities,
            resources,
        }
    }

    /// Start the dedicated tick-loop thread. Consumes `self`; the returned
    /// handle is the only remaining way to interact with the engine.
    pub fn start(mut self) -> Result<EngineHandle, EngineStartError> {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let pending_params = self.pending_params.clone();
        let pending_kills = self.pending_kills.clone();
        let (done_tx, done_rx) = mpsc::channel();
        let thread_stop_flag = stop_flag.clone();

        let thread = std::thread::Builder::new()
            .name("genesis-engine-tick".to_string())
            .spawn(move || {
                let mut next_deadline = Instant::now();
                loop {
                    if thread_stop_flag.load(Ordering::SeqCst) {
                        break;
                    }
                    let tick_duration = self.config.tick_duration();
                    next_deadline += tick_duration;

                    self.step();

                    let now = Instant::now();
                    if now < next_deadline {
                        std::thread::sleep(next_deadline - now);
                    } else {
                        let lag = now - next_deadline;
                        if lag > Duration::ZERO {
                            tracing::warn!(tick = self.tick, lag_ms = lag.as_millis() as u64, "tick behind schedule");
                        }
                        // Do not try to catch up more than one tick.
                        next_deadline = now;
                    }
                }
                let _ = done_tx.send(());
            })?;

        Ok(EngineHandle {
            stop_flag,
            pending_params,
            pending_kills,
            done_rx: Mutex::new(done_rx),
            thread: Mutex::new(Some(thread)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with(config: EngineConfig, population: u64) -> Engine {
        let registry = Arc::new(TraitRegistry::new());
        registry.register_native(crate::builtin::WANDER, Arc::new(crate::builtin::Wander));
        Engine::new(config, registry, population)
    }

    #[test]
    fn ticks_are_strictly_increasing() {
        let mut engine = engine_with(EngineConfig::default(), 3);
        assert_eq!(engine.tick(), 0);
        engine.step();
        assert_eq!(engine.tick(), 1);
        engine.step();
        assert_eq!(engine.tick(), 2);
    }

    #[test]
    fn population_never_exceeds_max_entities() {
        let mut config = EngineConfig::default();
        config.max_entities = 5;
        config.min_population = 5;
        config.spawn_rate = 10.0;
        let mut engine = engine_with(config, 5);
        for _ in 0..20 {
            engine.step();
            assert!(engine.alive_count() <= 5);
        }
    }

    #[test]
    fn below_min_population_is_topped_up_by_next_tick() {
        let mut config = EngineConfig::default();
        config.min_population = 5;
        config.max_entities = 50;
        let mut engine = engine_with(config, 2);
        engine.step();
        assert!(engine.alive_count() >= 5);
    }

    #[test]
    fn active_traits_are_always_a_subset_of_the_registry() {
        let mut engine = engine_with(EngineConfig::default(), 10);
        for _ in 0..5 {
            engine.step();
        }
        let snap = engine.registry.snapshot();
        for e in engine.entities() {
            for t in &e.active_traits {
                assert!(snap.contains(t));
            }
        }
    }

    #[test]
    fn noop_param_change_does_not_alter_config_values_it_does_not_name() {
        let mut engine = engine_with(EngineConfig::default(), 3);
        let friction_before = engine.config.friction;
        engine.step();
        assert_eq!(engine.config.friction, friction_before);
    }
}
