//! The Coder Agent (spec.md §4.7): turns an `EvolutionPlan` into validated
//! trait DSL source, persists it via the Mutation Store, and publishes
//! `MutationReady`.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use genesis_bus::{Channel, EventBus};
use genesis_events::{Event, EvolutionPlanEvent, MutationReadyEvent};
use genesis_protocol::narration::{AgentTag, CodeMetadata, FeedMessage, NarrationMetadata};
use genesis_sandbox::validator::ValidationError;
use genesis_store::{MutationRecord, MutationStatus, MutationStore};
use uuid::Uuid;

use crate::llm::LlmClient;

/// How long the Coder waits for the LLM (spec.md §4.7 step 2; unstated
/// default, chosen to match the Architect's timeout).
pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(120);

/// The fixed set of modules a generated trait may notionally reference
/// (spec.md §4.7 step 1). The DSL's grammar has no import statement at
/// all, so this list exists only to appear in the prompt — the validator
/// enforces the restriction structurally rather than by name.
pub const ALLOWED_MODULES: &[&str] = &["math", "random", "dataclasses", "typing", "enum", "collections", "functools", "itertools"];

fn unix_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

fn build_prompt(plan: &EvolutionPlanEvent) -> String {
    format!(
        "Generate one trait in the following grammar only:\n\
         trait <name> {{ fn execute(entity) {{ <statements> }} }}\n\
         Allowed statements: entity.energy/entity.energy_consumption_rate assignment \
         (=, +=, -=, *=), entity.move(dx, dy), entity.consume_resource(radius), if/else, \
         for i in 0..N (N <= 100). Allowed reads: entity.x, entity.y, entity.energy, \
         entity.max_energy, entity.age, entity.generation, entity.metabolism_rate, \
         entity.energy_consumption_rate. Allowed builtins: abs, min, max, clamp, rand, \
         distance, nearest_resource_distance, nearest_entity_distance. No other modules, \
         imports, I/O, or reflection are permitted (notional allowed modules for your own \
         reasoning only, none of which apply here: {}). The target is '{}': {}\n\
         Reply with only the trait source, in a fenced code block.",
        ALLOWED_MODULES.join(", "),
        plan.plan.target_class,
        plan.plan.description,
    )
}

fn extract_code_block(text: &str) -> Option<String> {
    if let Some(start) = text.find("```") {
        let after_fence = &text[start + 3..];
        let after_lang = after_fence.trim_start_matches(|c: char| c.is_alphanumeric());
        if let Some(end) = after_lang.find("```") {
            return Some(after_lang[..end].trim().to_string());
        }
    }
    let trimmed = text.trim();
    if trimmed.contains("trait ") {
        Some(trimmed.to_string())
    } else {
        None
    }
}

fn failure_message(cycle_id: Uuid, action: &str, reason: String, validation_log: Option<Vec<String>>) -> FeedMessage {
    let mut metadata = NarrationMetadata::empty();
    metadata.cycle_id = Some(cycle_id.to_string());
    if let Some(log) = validation_log {
        metadata.code = Some(CodeMetadata { snippet: String::new(), validation_errors: Some(log.join("; ")) });
    }
    FeedMessage {
        agent: AgentTag::Coder,
        action: action.to_string(),
        message: reason,
        timestamp: unix_seconds(),
        metadata: Some(metadata),
    }
}

/// Handle one plan end to end. On success, returns the persisted record and
/// the `MutationReady` event to publish; on failure, a narration describing
/// why the cycle could not continue.
pub async fn handle_plan(
    llm: &dyn LlmClient,
    store: &MutationStore,
    plan: EvolutionPlanEvent,
    timeout: Duration,
) -> Result<(MutationRecord, MutationReadyEvent), FeedMessage> {
    let cycle_id = plan.cycle_id;
    let system = "You are the Coder for an artificial-life server, writing a tiny sandboxed trait DSL.";
    let user = build_prompt(&plan);

    let reply = llm
        .complete(system, &user, timeout)
        .await
        .map_err(|e| failure_message(cycle_id, "code_generation_failed", format!("llm call failed: {e}"), None))?;

    let Some(source) = extract_code_block(&reply) else {
        return Err(failure_message(cycle_id, "code_extraction_failed", "llm reply contained no extractable trait source".to_string(), None));
    };

    let validation = match validate_with_retry(llm, store, &plan, source, timeout).await {
        Ok(report) => report,
        Err((log, code)) => {
            return Err(failure_message(
                cycle_id,
                "validation_failed",
                format!("trait source rejected: {code}"),
                Some(log),
            ));
        }
    };

    let trait_name = validation.def.name.clone();
    let version = store.next_version(&trait_name);
    let code_hash = genesis_sandbox::validator::content_hash(&validation.source);
    let mutation_id = Uuid::new_v4();
    let record = MutationRecord {
        mutation_id,
        trait_name: trait_name.clone(),
        version,
        status: MutationStatus::Validated,
        code_hash,
        source: validation.source.clone(),
        cycle_id,
        trigger_type: plan.trigger.problem_type.as_str().to_string(),
        created_at: unix_seconds(),
        applied_at: None,
        failure_reason: None,
    };

    store
        .insert(record.clone(), &validation.source)
        .map_err(|e| failure_message(cycle_id, "mutation_persist_failed", format!("failed to persist mutation: {e}"), None))?;

    let file_path = store.artifact_path(&trait_name, version).to_string_lossy().into_owned();
    let ready = MutationReadyEvent {
        cycle_id,
        mutation_id,
        trait_name,
        version,
        file_path,
        code_hash,
        occurred_at: unix_seconds(),
    };
    Ok((record, ready))
}

struct ValidatedSource {
    def: genesis_sandbox::TraitDef,
    source: String,
}

/// Validate `source` against the store's duplicate-content index. On
/// rejection, re-prompt exactly once with the validator's audit log
/// appended, per spec.md §4.7 step 4's optional single retry.
async fn validate_with_retry(
    llm: &dyn LlmClient,
    store: &MutationStore,
    plan: &EvolutionPlanEvent,
    first_attempt: String,
    timeout: Duration,
) -> Result<ValidatedSource, (Vec<String>, genesis_protocol::ErrorCode)> {
    let already_seen = |hash: &[u8; 32]| store.already_seen(hash);

    match genesis_sandbox::validate(&first_attempt, &already_seen) {
        Ok(report) => return Ok(ValidatedSource { def: report.def, source: first_attempt }),
        Err(first_err) => {
            let retry_prompt = format!(
                "{}\nYour previous attempt was rejected with: {}. Validation log: {}. Please correct it and reply with only the corrected trait source.",
                build_prompt(plan),
                first_err.code,
                first_err.log.join("; "),
            );
            let reply = llm
                .complete("You are the Coder for an artificial-life server, writing a tiny sandboxed trait DSL.", &retry_prompt, timeout)
                .await
                .map_err(|_| (first_err.log.clone(), first_err.code))?;
            let Some(second_attempt) = extract_code_block(&reply) else {
                return Err((first_err.log, first_err.code));
            };
            genesis_sandbox::validate(&second_attempt, &already_seen)
                .map(|report| ValidatedSource { def: report.def, source: second_attempt })
                .map_err(|second_err: ValidationError| (second_err.log, second_err.code))
        }
    }
}

fn success_narration(ready: &MutationReadyEvent) -> FeedMessage {
    let mut metadata = NarrationMetadata::empty();
    metadata.cycle_id = Some(ready.cycle_id.to_string());
    metadata.mutation = Some(genesis_protocol::narration::MutationMetadata {
        mutation_id: ready.mutation_id.to_string(),
        status: MutationStatus::Validated.as_str().to_string(),
    });
    FeedMessage {
        agent: AgentTag::Coder,
        action: "mutation_ready".to_string(),
        message: format!("trait '{}' v{} passed validation and is ready to load", ready.trait_name, ready.version),
        timestamp: ready.occurred_at,
        metadata: Some(metadata),
    }
}

/// Run the Coder as a long-lived task: consume `EvolutionPlan` events from
/// `bus`, publishing `MutationReady` or a failure narration for each one.
pub async fn run(bus: Arc<EventBus>, llm: Arc<dyn LlmClient>, store: Arc<MutationStore>, timeout: Duration) {
    let mut plans = bus.subscribe(Channel::EvolutionPlan);
    loop {
        let Some(Event::EvolutionPlan(plan)) = plans.recv().await else { break };
        match handle_plan(llm.as_ref(), &store, plan, timeout).await {
            Ok((_, ready)) => {
                let narration = success_narration(&ready);
                bus.publish_mutation_ready(ready).await;
                bus.narrate(narration).await;
            }
            Err(failure) => bus.narrate(failure).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::StubLlmClient;
    use genesis_events::{ChangeType, EvolutionTrigger, Plan, ProblemType, Severity, WorldContext};

    fn plan_event() -> EvolutionPlanEvent {
        EvolutionPlanEvent {
            cycle_id: Uuid::new_v4(),
            plan: Plan {
                change_type: ChangeType::NewTrait,
                target_class: "foraging_v2".to_string(),
                target_method: None,
                description: "gain energy near resources".to_string(),
                expected_outcome: None,
                constraints: vec![],
            },
            trigger: EvolutionTrigger {
                cycle_id: Uuid::new_v4(),
                problem_type: ProblemType::Starvation,
                severity: Severity::High,
                snapshot_key: 1,
                world_context: WorldContext { entity_count: 5, mean_energy: 5.0, known_traits: vec![] },
                occurred_at: 0,
            },
            occurred_at: 0,
        }
    }

    #[tokio::test]
    async fn well_formed_source_persists_and_publishes() {
        let dir = tempfile::tempdir().unwrap();
        let store = MutationStore::open(dir.path(), 4).unwrap();
        let stub = StubLlmClient::always(
            "```\ntrait foraging_v2 { fn execute(entity) { entity.energy += 1.0; } }\n```",
        );
        let (record, ready) = handle_plan(&stub, &store, plan_event(), Duration::from_secs(1)).await.expect("ok");
        assert_eq!(record.trait_name, "foraging_v2");
        assert_eq!(ready.version, 1);
        assert_eq!(store.list().len(), 1);
    }

    #[tokio::test]
    async fn unextractable_reply_fails_the_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = MutationStore::open(dir.path(), 4).unwrap();
        let stub = StubLlmClient::always("sorry, I can't help with that");
        let result = handle_plan(&stub, &store, plan_event(), Duration::from_secs(1)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn retry_recovers_from_an_initially_rejected_source() {
        let dir = tempfile::tempdir().unwrap();
        let store = MutationStore::open(dir.path(), 4).unwrap();
        let stub = StubLlmClient::always("```\nimport os\ntrait bad { fn execute(entity) {} }\n```")
            .with_route("Your previous attempt", "```\ntrait fixed { fn execute(entity) { entity.energy += 1.0; } }\n```");
        let (record, _) = handle_plan(&stub, &store, plan_event(), Duration::from_secs(1)).await.expect("recovered");
        assert_eq!(record.trait_name, "fixed");
    }
}
