//! The Architect Agent (spec.md §4.6): turns an `EvolutionTrigger` into a
//! structured `Plan` by calling the LLM collaborator and forgivingly
//! parsing its JSON reply.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use genesis_bus::{Channel, EventBus};
use genesis_events::{ChangeType, Event, EvolutionPlanEvent, EvolutionTrigger, Plan};
use genesis_protocol::narration::{AgentTag, FeedMessage, PlanMetadata};
use genesis_world::RegistrySnapshot;

use crate::json_extract::extract_json_object;
use crate::llm::LlmClient;

/// How long the Architect waits for the LLM before treating the cycle as
/// failed (spec.md §4.6 step 3).
pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(120);

fn unix_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

fn change_type_from_str(s: &str) -> Option<ChangeType> {
    match s {
        "new_trait" => Some(ChangeType::NewTrait),
        "modify_trait" => Some(ChangeType::ModifyTrait),
        "adjust_params" => Some(ChangeType::AdjustParams),
        _ => None,
    }
}

fn build_system_prompt(known_traits: &[String]) -> String {
    format!(
        "You are the Architect for an artificial-life server. A problem has been \
         detected in the running simulation. You may propose introducing a new \
         trait, modifying an existing one, or adjusting engine parameters. \
         Currently known traits: {}. Do not write code; only describe the change. \
         Reply with a single JSON object with fields: change_type (one of \
         \"new_trait\", \"modify_trait\", \"adjust_params\"), target_class, \
         target_method (nullable), description, expected_outcome (optional), \
         constraints (list of strings).",
        known_traits.join(", ")
    )
}

fn build_user_prompt(trigger: &EvolutionTrigger) -> String {
    format!(
        "problem_type={} severity={:?} entity_count={} mean_energy={:.2}",
        trigger.problem_type.as_str(),
        trigger.severity,
        trigger.world_context.entity_count,
        trigger.world_context.mean_energy
    )
}

fn parse_plan(value: &serde_json::Value) -> Option<Plan> {
    let change_type = change_type_from_str(value.get("change_type")?.as_str()?)?;
    let target_class = value.get("target_class")?.as_str()?.to_string();
    let target_method = value.get("target_method").and_then(|v| v.as_str()).map(str::to_string);
    let description = value.get("description")?.as_str()?.to_string();
    let expected_outcome = value.get("expected_outcome").and_then(|v| v.as_str()).map(str::to_string);
    let constraints = value
        .get("constraints")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|c| c.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    Some(Plan {
        change_type,
        target_class,
        target_method,
        description,
        expected_outcome,
        constraints,
    })
}

/// Handle one trigger end to end: build the prompt, call the LLM, and
/// either return a usable `Plan` or a narration explaining the failure.
pub async fn handle_trigger(
    llm: &dyn LlmClient,
    trigger: EvolutionTrigger,
    known_traits: &[String],
    timeout: Duration,
) -> Result<EvolutionPlanEvent, FeedMessage> {
    let system = build_system_prompt(known_traits);
    let user = build_user_prompt(&trigger);

    let reply = match llm.complete(&system, &user, timeout).await {
        Ok(reply) => reply,
        Err(e) => {
            return Err(failure_message(&trigger, format!("llm call failed: {e}")));
        }
    };

    let Some(json) = extract_json_object(&reply) else {
        return Err(failure_message(&trigger, "llm reply contained no extractable JSON object"));
    };
    let Some(plan) = parse_plan(&json) else {
        return Err(failure_message(&trigger, "llm reply JSON did not match the plan contract"));
    };

    let occurred_at = unix_seconds();
    Ok(EvolutionPlanEvent {
        cycle_id: trigger.cycle_id,
        plan,
        trigger,
        occurred_at,
    })
}

fn failure_message(trigger: &EvolutionTrigger, reason: String) -> FeedMessage {
    let mut metadata = genesis_protocol::narration::NarrationMetadata::empty();
    metadata.cycle_id = Some(trigger.cycle_id.to_string());
    FeedMessage {
        agent: AgentTag::Architect,
        action: "plan_failed".to_string(),
        message: reason,
        timestamp: unix_seconds(),
        metadata: Some(metadata),
    }
}

fn success_narration(event: &EvolutionPlanEvent) -> FeedMessage {
    let mut metadata = genesis_protocol::narration::NarrationMetadata::empty();
    metadata.cycle_id = Some(event.cycle_id.to_string());
    metadata.plan = Some(PlanMetadata {
        trait_name: event.plan.target_class.clone(),
        summary: event.plan.description.clone(),
    });
    FeedMessage {
        agent: AgentTag::Architect,
        action: "plan_ready".to_string(),
        message: format!("proposed {:?} for '{}': {}", event.plan.change_type, event.plan.target_class, event.plan.description),
        timestamp: event.occurred_at,
        metadata: Some(metadata),
    }
}

/// Run the Architect as a long-lived task: consume `EvolutionTrigger`
/// events from `bus`, publishing `EvolutionPlan` or a failure narration for
/// each one. `registry` supplies the currently-known trait names.
pub async fn run(bus: Arc<EventBus>, llm: Arc<dyn LlmClient>, registry: Arc<genesis_world::TraitRegistry>, timeout: Duration) {
    let mut triggers = bus.subscribe(Channel::EvolutionTrigger);
    loop {
        let Some(Event::EvolutionTrigger(trigger)) = triggers.recv().await else { break };
        let known_traits = known_trait_names(&registry.snapshot());
        match handle_trigger(llm.as_ref(), trigger, &known_traits, timeout).await {
            Ok(event) => {
                let narration = success_narration(&event);
                bus.publish_plan(event).await;
                bus.narrate(narration).await;
            }
            Err(failure) => bus.narrate(failure).await,
        }
    }
}

fn known_trait_names(snapshot: &RegistrySnapshot) -> Vec<String> {
    snapshot.names().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::StubLlmClient;
    use genesis_events::{ProblemType, Severity, WorldContext};
    use uuid::Uuid;

    fn trigger() -> EvolutionTrigger {
        EvolutionTrigger {
            cycle_id: Uuid::new_v4(),
            problem_type: ProblemType::Starvation,
            severity: Severity::High,
            snapshot_key: 10,
            world_context: WorldContext { entity_count: 5, mean_energy: 5.0, known_traits: vec!["wander".to_string()] },
            occurred_at: 0,
        }
    }

    #[tokio::test]
    async fn well_formed_reply_produces_a_plan() {
        let stub = StubLlmClient::always(
            "```json\n{\"change_type\": \"new_trait\", \"target_class\": \"foraging_v2\", \"target_method\": null, \
             \"description\": \"add energy gain near resources\", \"constraints\": []}\n```",
        );
        let result = handle_trigger(&stub, trigger(), &["wander".to_string()], Duration::from_secs(1)).await;
        let event = result.expect("plan");
        assert_eq!(event.plan.target_class, "foraging_v2");
        assert_eq!(event.plan.change_type, ChangeType::NewTrait);
    }

    #[tokio::test]
    async fn unparseable_reply_produces_a_failure_narration() {
        let stub = StubLlmClient::always("I don't know what to propose.");
        let result = handle_trigger(&stub, trigger(), &[], Duration::from_secs(1)).await;
        let failure = result.expect_err("failure");
        assert_eq!(failure.action, "plan_failed");
    }
}
