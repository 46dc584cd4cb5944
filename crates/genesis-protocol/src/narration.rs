//! Agent narration: the JSON side of the stream surface, emitted whenever
//! a `FeedMessage` is published on the event bus.

use serde::{Deserialize, Serialize};

/// Which collaborator produced a narration entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentTag {
    /// The Watcher Agent.
    Watcher,
    /// The Architect Agent.
    Architect,
    /// The Coder Agent.
    Coder,
    /// The Runtime Patcher.
    Patcher,
    /// The engine itself, or any component with no dedicated agent tag.
    System,
}

/// Evolution-trigger detail attached to a narration entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerMetadata {
    /// The trigger's severity band.
    pub severity: String,
    /// Free-text reason, when supplied by an operator or the Watcher.
    pub reason: Option<String>,
}

/// Architect-produced plan detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanMetadata {
    /// The trait name the plan targets.
    pub trait_name: String,
    /// A short natural-language description of the intended change.
    pub summary: String,
}

/// Coder/mutation-record detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationMetadata {
    /// The mutation id this narration refers to.
    pub mutation_id: String,
    /// The mutation's lifecycle status at the time of narration.
    pub status: String,
}

/// Source-code detail, including validator output when rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeMetadata {
    /// A short, truncated snippet of the generated source.
    pub snippet: String,
    /// The validator's rejection detail, if any.
    pub validation_errors: Option<String>,
}

/// Registry-state detail, attached when a narration follows a swap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryMetadata {
    /// The registry version after the swap this narration describes.
    pub registry_version: u64,
    /// The mutation id rolled back to, if this narration follows a rollback.
    pub rollback_to: Option<String>,
}

/// The structured metadata block optionally attached to a narration entry.
/// All sub-objects are optional; only the ones relevant to the narrated
/// event are populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NarrationMetadata {
    /// The evolution cycle this narration belongs to, if any.
    pub cycle_id: Option<String>,
    /// Schema version of this metadata shape, bumped on breaking changes.
    pub metadata_schema_version: u32,
    /// Trigger detail, present on watcher/force-evolution narrations.
    pub trigger: Option<TriggerMetadata>,
    /// Plan detail, present on architect narrations.
    pub plan: Option<PlanMetadata>,
    /// Mutation detail, present on coder/patcher narrations.
    pub mutation: Option<MutationMetadata>,
    /// Code detail, present on coder narrations and validator rejections.
    pub code: Option<CodeMetadata>,
    /// Registry detail, present on patcher narrations.
    pub registry: Option<RegistryMetadata>,
}

impl NarrationMetadata {
    /// An empty metadata block at the current schema version.
    pub fn empty() -> Self {
        NarrationMetadata {
            metadata_schema_version: 1,
            ..Default::default()
        }
    }
}

/// A single agent narration entry, the JSON payload published to stream
/// observers for every `FeedMessage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedMessage {
    /// Which collaborator produced this entry.
    pub agent: AgentTag,
    /// A machine-readable action tag, stable across narrations of the same kind.
    pub action: String,
    /// Free-text message, safe to render directly to an operator.
    pub message: String,
    /// Unix seconds at the time of publication.
    pub timestamp: u64,
    /// Structured detail, when the action warrants it.
    pub metadata: Option<NarrationMetadata>,
}

impl FeedMessage {
    /// Build a narration entry with no structured metadata.
    pub fn plain(agent: AgentTag, action: impl Into<String>, message: impl Into<String>, timestamp: u64) -> Self {
        FeedMessage {
            agent,
            action: action.into(),
            message: message.into(),
            timestamp,
            metadata: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_tag_serializes_lowercase() {
        let json = serde_json::to_string(&AgentTag::Architect).expect("serialize");
        assert_eq!(json, "\"architect\"");
    }

    #[test]
    fn feed_message_round_trips_through_json() {
        let mut metadata = NarrationMetadata::empty();
        metadata.cycle_id = Some("cycle-1".to_string());
        metadata.mutation = Some(MutationMetadata {
            mutation_id: "mut-1".to_string(),
            status: "applied".to_string(),
        });
        let msg = FeedMessage {
            agent: AgentTag::Patcher,
            action: "mutation_applied".to_string(),
            message: "trait foraging_v2 is live".to_string(),
            timestamp: 1_700_000_000,
            metadata: Some(metadata),
        };
        let json = serde_json::to_string(&msg).expect("serialize");
        let decoded: FeedMessage = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(decoded.action, msg.action);
        assert_eq!(
            decoded.metadata.expect("metadata").cycle_id,
            Some("cycle-1".to_string())
        );
    }
}
