//! The Runtime Patcher (spec.md §4.8): the only writer of the live
//! [`TraitRegistry`]. Re-reads a Coder's artifact from disk, re-validates
//! it in isolation from whatever the Coder already checked, and installs
//! it under a bounded load timeout.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use genesis_bus::{Channel, EventBus};
use genesis_events::{Event, FailureStage, MutationAppliedEvent, MutationFailedEvent, MutationReadyEvent};
use genesis_protocol::narration::{AgentTag, FeedMessage, MutationMetadata, NarrationMetadata, RegistryMetadata};
use genesis_protocol::ErrorCode;
use genesis_rng::{GlobalSeed, RngSubsystem};
use genesis_sandbox::DslTrait;
use genesis_store::{MutationStatus, MutationStore};
use genesis_world::TraitRegistry;
use parking_lot::Mutex;

/// How long the Patcher allows for re-validation plus install before
/// reporting `IMPORT_TIMEOUT` (spec.md §4.8 step 6; unstated default,
/// chosen as a generous multiple of the sub-millisecond cost of parsing a
/// DSL trait body so only a genuinely hung install ever trips it).
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(2);

fn unix_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// Owns the one `GlobalSeed` every interpreted trait's `rand()` calls draw
/// from, independent of the Engine's own seed — spec.md leaves this an
/// open question; isolating the Patcher's seed keeps a newly-installed
/// trait's first draws reproducible across restarts without coupling it to
/// the physics/spawn/respawn streams the Engine advances every tick.
pub struct Patcher {
    registry: Arc<TraitRegistry>,
    store: Arc<MutationStore>,
    seed: Mutex<GlobalSeed>,
    load_timeout: Duration,
}

impl Patcher {
    /// Build a Patcher writing into `registry`, reading artifacts from
    /// `store`, seeded independently by `genesis_seed`.
    pub fn new(registry: Arc<TraitRegistry>, store: Arc<MutationStore>, genesis_seed: u64, load_timeout: Duration) -> Self {
        Patcher {
            registry,
            store,
            seed: Mutex::new(GlobalSeed::from_genesis(genesis_seed)),
            load_timeout,
        }
    }

    fn rng_for(&self, version: u32) -> genesis_rng::RngStream {
        self.seed.lock().stream(RngSubsystem::TraitDsl, version as u64).clone()
    }

    /// Handle one `MutationReady` event end to end: re-read, re-validate,
    /// install, and report the outcome. Never panics; every failure path
    /// returns a `MutationFailedEvent` instead.
    pub async fn handle_ready(&self, ready: MutationReadyEvent) -> Result<MutationAppliedEvent, MutationFailedEvent> {
        let outcome = tokio::time::timeout(self.load_timeout, self.install(&ready)).await;

        match outcome {
            Ok(Ok(applied)) => Ok(applied),
            Ok(Err((code, stage))) => Err(self.failure(&ready, code, stage)),
            Err(_) => Err(self.failure(&ready, ErrorCode::ImportTimeout, FailureStage::Patching)),
        }
    }

    async fn install(&self, ready: &MutationReadyEvent) -> Result<MutationAppliedEvent, (ErrorCode, FailureStage)> {
        let source = self
            .store
            .read_artifact(&ready.trait_name, ready.version)
            .map_err(|_| (ErrorCode::ClassNotFound, FailureStage::Patching))?;

        let own_hash = ready.code_hash;
        let already_seen_elsewhere = |hash: &[u8; 32]| self.store.already_seen(hash) && *hash != own_hash;
        let report = genesis_sandbox::validate(&source, &already_seen_elsewhere).map_err(|e| (e.code, FailureStage::Patching))?;

        if report.def.name != ready.trait_name {
            return Err((ErrorCode::ClassNotFound, FailureStage::Patching));
        }

        let rng = self.rng_for(ready.version);
        let implementation = Arc::new(DslTrait::new(report.def, rng));
        let registry_version = self.registry.install(ready.trait_name.clone(), implementation, ready.version);

        let applied_at = unix_seconds();
        let _ = self.store.mark_active(ready.mutation_id, applied_at);
        if let Some(previous) = self.previous_version_record(&ready.trait_name, ready.version) {
            let _ = self.store.mark_rolled_back(previous);
        }

        Ok(MutationAppliedEvent {
            cycle_id: ready.cycle_id,
            mutation_id: ready.mutation_id,
            trait_name: ready.trait_name.clone(),
            version: ready.version,
            registry_version,
            occurred_at: applied_at,
        })
    }

    fn previous_version_record(&self, trait_name: &str, except_version: u32) -> Option<uuid::Uuid> {
        self.store
            .list()
            .into_iter()
            .filter(|r| r.trait_name == trait_name && r.status == MutationStatus::Active && r.version != except_version)
            .max_by_key(|r| r.version)
            .map(|r| r.mutation_id)
    }

    fn failure(&self, ready: &MutationReadyEvent, code: ErrorCode, stage: FailureStage) -> MutationFailedEvent {
        let _ = self.store.mark_failed(ready.mutation_id, code.to_string());
        let rollback_to = self.store.previous_active_artifact(&ready.trait_name, ready.version);
        MutationFailedEvent {
            cycle_id: ready.cycle_id,
            mutation_id: ready.mutation_id,
            reason: code,
            stage,
            rollback_to,
            occurred_at: unix_seconds(),
        }
    }
}

fn success_narration(applied: &MutationAppliedEvent) -> FeedMessage {
    let mut metadata = NarrationMetadata::empty();
    metadata.cycle_id = Some(applied.cycle_id.to_string());
    metadata.mutation = Some(MutationMetadata {
        mutation_id: applied.mutation_id.to_string(),
        status: MutationStatus::Active.as_str().to_string(),
    });
    metadata.registry = Some(RegistryMetadata {
        registry_version: applied.registry_version,
        rollback_to: None,
    });
    FeedMessage {
        agent: AgentTag::Patcher,
        action: "mutation_applied".to_string(),
        message: format!("trait '{}' v{} is live (registry v{})", applied.trait_name, applied.version, applied.registry_version),
        timestamp: applied.occurred_at,
        metadata: Some(metadata),
    }
}

fn failure_narration(failure: &MutationFailedEvent) -> FeedMessage {
    let mut metadata = NarrationMetadata::empty();
    metadata.cycle_id = Some(failure.cycle_id.to_string());
    metadata.registry = Some(RegistryMetadata {
        registry_version: 0,
        rollback_to: failure.rollback_to.clone(),
    });
    FeedMessage {
        agent: AgentTag::Patcher,
        action: "mutation_failed".to_string(),
        message: format!("install failed: {}", failure.reason),
        timestamp: failure.occurred_at,
        metadata: Some(metadata),
    }
}

/// Run the Patcher as a long-lived task: consume `MutationReady` events
/// from `bus`, publishing `MutationApplied` or `MutationFailed` for each
/// one.
pub async fn run(bus: Arc<EventBus>, patcher: Patcher) {
    let mut ready_events = bus.subscribe(Channel::MutationReady);
    loop {
        let Some(Event::MutationReady(ready)) = ready_events.recv().await else { break };
        match patcher.handle_ready(ready).await {
            Ok(applied) => {
                let narration = success_narration(&applied);
                bus.publish_mutation_applied(applied).await;
                bus.narrate(narration).await;
            }
            Err(failure) => {
                let narration = failure_narration(&failure);
                bus.publish_mutation_failed(failure).await;
                bus.narrate(narration).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genesis_store::{MutationRecord, MutationStatus};
    use uuid::Uuid;

    fn ready_for(store: &MutationStore, trait_name: &str, version: u32, source: &str) -> MutationReadyEvent {
        let code_hash = genesis_sandbox::content_hash(source);
        let record = MutationRecord {
            mutation_id: Uuid::new_v4(),
            trait_name: trait_name.to_string(),
            version,
            status: MutationStatus::Validated,
            code_hash,
            source: source.to_string(),
            cycle_id: Uuid::new_v4(),
            trigger_type: "manual_test".to_string(),
            created_at: 0,
            applied_at: None,
            failure_reason: None,
        };
        let mutation_id = record.mutation_id;
        store.insert(record, source).unwrap();
        MutationReadyEvent {
            cycle_id: Uuid::new_v4(),
            mutation_id,
            trait_name: trait_name.to_string(),
            version,
            file_path: store.artifact_path(trait_name, version).to_string_lossy().into_owned(),
            code_hash,
            occurred_at: 0,
        }
    }

    #[tokio::test]
    async fn well_formed_artifact_installs_into_the_registry() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MutationStore::open(dir.path(), 4).unwrap());
        let registry = Arc::new(TraitRegistry::new());
        let patcher = Patcher::new(registry.clone(), store.clone(), 1, DEFAULT_LOAD_TIMEOUT);

        let ready = ready_for(&store, "foraging_v2", 1, "trait foraging_v2 { fn execute(entity) { entity.energy += 1.0; } }");
        let applied = patcher.handle_ready(ready).await.expect("applied");
        assert_eq!(applied.trait_name, "foraging_v2");
        assert!(registry.snapshot().contains("foraging_v2"));
        assert_eq!(store.get(applied.mutation_id).unwrap().status, MutationStatus::Active);
    }

    #[tokio::test]
    async fn newer_version_marks_the_prior_active_record_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MutationStore::open(dir.path(), 4).unwrap());
        let registry = Arc::new(TraitRegistry::new());
        let patcher = Patcher::new(registry.clone(), store.clone(), 1, DEFAULT_LOAD_TIMEOUT);

        let first = ready_for(&store, "forage", 1, "trait forage { fn execute(entity) { entity.energy += 1.0; } }");
        let first_id = first.mutation_id;
        patcher.handle_ready(first).await.expect("applied v1");

        let second = ready_for(&store, "forage", 2, "trait forage { fn execute(entity) { entity.energy += 2.0; } }");
        patcher.handle_ready(second).await.expect("applied v2");

        assert_eq!(store.get(first_id).unwrap().status, MutationStatus::RolledBack);
        assert_eq!(registry.snapshot().get("forage").unwrap().version, 2);
    }

    #[tokio::test]
    async fn missing_artifact_reports_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MutationStore::open(dir.path(), 4).unwrap());
        let registry = Arc::new(TraitRegistry::new());
        let patcher = Patcher::new(registry, store, 1, DEFAULT_LOAD_TIMEOUT);

        let ready = MutationReadyEvent {
            cycle_id: Uuid::new_v4(),
            mutation_id: Uuid::new_v4(),
            trait_name: "ghost".to_string(),
            version: 1,
            file_path: "/nonexistent".to_string(),
            code_hash: [0u8; 32],
            occurred_at: 0,
        };
        let failure = patcher.handle_ready(ready).await.expect_err("should fail");
        assert_eq!(failure.reason, ErrorCode::ClassNotFound);
    }
}
