//! Shared state handed to every axum handler: the booted [`Collaborators`]
//! bundle, a locally-maintained snapshot cache, and the rate limiters
//! guarding the operator command and stream-connection surfaces.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use genesis_agents::RateLimiter;
use genesis_bus::{Channel, EventBus};
use genesis_engine::{Collaborators, WorldState};
use genesis_events::Event;
use genesis_world::Snapshot;
use parking_lot::RwLock;

/// Everything an axum handler needs to read or act on the running world.
#[derive(Clone)]
pub struct AppState {
    pub collaborators: Arc<Collaborators>,
    /// The most recent telemetry snapshot, refreshed by [`bridge_snapshot_cache`].
    pub latest_snapshot: Arc<RwLock<Option<Snapshot>>>,
    /// Leaky-bucket limiter over `/command/*` routes, keyed by client IP.
    pub command_limiter: Arc<RateLimiter>,
    /// Leaky-bucket limiter over new `/ws/stream` connections, keyed by client IP.
    pub stream_connect_limiter: Arc<RateLimiter>,
    /// Mirrors the engine's current `min_population`, updated optimistically
    /// on every accepted `update_param` so `max_entities` validation doesn't
    /// need a round trip into the tick thread.
    min_population: Arc<AtomicU64>,
}

impl AppState {
    /// Build the app state around an already-booted [`Collaborators`]
    /// bundle, spawning the background task that mirrors `Telemetry` into
    /// [`AppState::latest_snapshot`].
    pub fn new(collaborators: Collaborators, initial_min_population: u64) -> Self {
        let latest_snapshot = Arc::new(RwLock::new(None));
        tokio::spawn(bridge_snapshot_cache(collaborators.bus.clone(), latest_snapshot.clone()));

        AppState {
            collaborators: Arc::new(collaborators),
            latest_snapshot,
            command_limiter: Arc::new(RateLimiter::new(20.0, 2.0)),
            stream_connect_limiter: Arc::new(RateLimiter::new(5.0, 0.5)),
            min_population: Arc::new(AtomicU64::new(initial_min_population)),
        }
    }

    /// The world view refreshed every stream tick by the Engine's state hook.
    pub fn world_state(&self) -> WorldState {
        self.collaborators.world_state.read().clone()
    }

    /// Current cached `min_population`, for validating a `max_entities` change.
    pub fn min_population(&self) -> u64 {
        self.min_population.load(Ordering::Relaxed)
    }

    /// Update the cached `min_population` after an accepted `update_param`.
    pub fn set_min_population(&self, value: u64) {
        self.min_population.store(value, Ordering::Relaxed);
    }
}

/// Mirror every `Telemetry` event into `cache`, so `/stats` can answer
/// without touching the engine's own tick thread.
async fn bridge_snapshot_cache(bus: Arc<EventBus>, cache: Arc<RwLock<Option<Snapshot>>>) {
    let mut telemetry = bus.subscribe(Channel::Telemetry);
    loop {
        let Some(Event::Telemetry(snapshot)) = telemetry.recv().await else { break };
        *cache.write() = Some(snapshot);
    }
}
