//! Wiring for the AI-Genesis World Engine: the `Collaborators` bundle every
//! entry point (this crate's own binary, and `apps/server`) boots once and
//! then hands pieces of to the agent pipeline, the tick loop, and the
//! operator surface.
//!
//! No `static`/`lazy_static`/`OnceCell` globals: everything here is an
//! `Arc` built in [`bootstrap`] and threaded through constructor arguments.

use std::sync::Arc;
use std::time::Duration;

use genesis_agents::{architect, coder, watcher, LlmClient, Watcher, WatcherConfig};
use genesis_bus::{Channel, EventBus};
use genesis_events::Event;
use genesis_patcher::Patcher;
use genesis_store::MutationStore;
use genesis_stream::StreamMultiplexer;
use genesis_world::{builtin, Engine, EngineConfig, EngineHandle, EngineStartError, Entity, TraitRegistry};

/// A snapshot of the live world taken at the engine's stream cadence, for
/// the operator surface's `/stats` and `/entities*` routes — the engine's
/// own tick thread never blocks on a reader, it just replaces this view.
#[derive(Debug, Default, Clone)]
pub struct WorldState {
    /// Every living and recently-dead entity as of the last state hook call.
    pub entities: Vec<Entity>,
    /// World width in world units.
    pub width: f32,
    /// World height in world units.
    pub height: f32,
    /// Live resource count.
    pub resource_count: usize,
}

/// Everything a running world needs, bundled so `apps/engine` and
/// `apps/server` can each boot it once and reach whichever piece their own
/// surface needs.
pub struct Collaborators {
    /// The typed event bus every agent and the engine's hooks publish on.
    pub bus: Arc<EventBus>,
    /// The live trait registry; the Patcher is its only writer.
    pub registry: Arc<TraitRegistry>,
    /// Durable history of every trait source ever produced.
    pub store: Arc<MutationStore>,
    /// Fan-out to connected `/ws/stream` observers.
    pub stream: Arc<StreamMultiplexer>,
    /// Handle to the running tick loop: queue `ApplyParams`, request a stop,
    /// queue an operator-issued entity kill.
    pub engine: EngineHandle,
    /// Latest world view, refreshed every stream tick, read by the operator
    /// surface without touching the engine's own thread.
    pub world_state: Arc<parking_lot::RwLock<WorldState>>,
}

/// Everything that can go wrong assembling a [`Collaborators`] bundle.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// The mutation store's artifact directory or index could not be opened.
    #[error(transparent)]
    Store(#[from] genesis_store::StoreError),
    /// The engine's dedicated tick-loop thread could not be spawned.
    #[error(transparent)]
    EngineStart(#[from] EngineStartError),
}

/// Build the native traits the genesis population spawns with, before any
/// evolution cycle has installed an LLM-generated one.
fn register_native_traits(registry: &TraitRegistry) {
    registry.register_native(builtin::WANDER, Arc::new(builtin::Wander));
    registry.register_native(builtin::FORAGE, Arc::new(builtin::Forage));
}

/// Boot the full world: construct the registry and its native traits, the
/// bus, the mutation store, the stream multiplexer, start the Engine's
/// dedicated tick thread, and spawn the four agent pipeline tasks
/// (Watcher, Architect, Coder, Patcher) plus the bridges that carry
/// telemetry and world frames from the tick loop onto the bus and the
/// stream multiplexer.
///
/// `artifacts_dir` is the Mutation Store's root; `llm` is the external
/// collaborator the Architect and Coder call.
pub async fn bootstrap(
    config: EngineConfig,
    artifacts_dir: impl Into<std::path::PathBuf>,
    llm: Arc<dyn LlmClient>,
) -> Result<Collaborators, BootstrapError> {
    let registry = Arc::new(TraitRegistry::new());
    register_native_traits(&registry);

    let bus = Arc::new(EventBus::new());
    let store = Arc::new(MutationStore::open(artifacts_dir, 4)?);
    let stream = Arc::new(StreamMultiplexer::new());

    let snapshot_bus = bus.clone();
    let snapshot_hook: genesis_world::SnapshotHook = Arc::new(move |snapshot| {
        let bus = snapshot_bus.clone();
        tokio::spawn(async move {
            bus.publish(Event::Telemetry(snapshot)).await;
        });
    });

    let frame_stream = stream.clone();
    let frame_hook: genesis_world::FrameHook = Arc::new(move |frame| {
        let stream = frame_stream.clone();
        tokio::spawn(async move {
            stream.broadcast_frame(&frame).await;
        });
    });

    let population = config.min_population;
    let min_population = config.min_population;
    let max_entities = config.max_entities;
    let genesis_seed = config.genesis_seed;

    let state = Arc::new(parking_lot::RwLock::new(WorldState::default()));
    let state_hook_target = state.clone();
    let state_hook: genesis_world::StateHook = Arc::new(move |entities, env| {
        let mut guard = state_hook_target.write();
        guard.entities = entities;
        guard.width = env.width;
        guard.height = env.height;
        guard.resource_count = env.resources.len();
    });

    let engine = Engine::new(config, registry.clone(), population)
        .with_snapshot_hook(snapshot_hook)
        .with_frame_hook(frame_hook)
        .with_state_hook(state_hook)
        .start()?;

    let watcher = Watcher::new(WatcherConfig::default(), min_population, max_entities);
    tokio::spawn(watcher::run(watcher, bus.clone()));
    tokio::spawn(architect::run(bus.clone(), llm.clone(), registry.clone(), architect::DEFAULT_LLM_TIMEOUT));
    tokio::spawn(coder::run(bus.clone(), llm, store.clone(), coder::DEFAULT_LLM_TIMEOUT));

    let patcher = Patcher::new(registry.clone(), store.clone(), genesis_seed, Duration::from_secs(2));
    tokio::spawn(genesis_patcher::run(bus.clone(), patcher));

    tokio::spawn(bridge_narration_to_stream(bus.clone(), stream.clone()));

    Ok(Collaborators {
        bus,
        registry,
        store,
        stream,
        engine,
        world_state: state,
    })
}

/// Forward every `FeedMessage` narration onto the Stream Multiplexer so
/// connected observers see agent activity alongside world frames.
async fn bridge_narration_to_stream(bus: Arc<EventBus>, stream: Arc<StreamMultiplexer>) {
    let mut narrations = bus.subscribe(Channel::FeedMessage);
    loop {
        let Some(Event::FeedMessage(message)) = narrations.recv().await else { break };
        stream.broadcast_narration(&message).await;
    }
}
