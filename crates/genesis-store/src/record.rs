//! The `MutationRecord` and its lifecycle status (spec.md §3 "Trait record",
//! §4.10, §6 "Persisted layout").

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A trait record's lifecycle status. `Pending` and `Validated` are
/// transient; `Active`, `Failed`, and `RolledBack` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationStatus {
    /// Source accepted by the Coder's first validation pass, not yet persisted.
    Pending,
    /// Source written to disk and recorded; awaiting the Patcher.
    Validated,
    /// Installed into the live Trait Registry.
    Active,
    /// Re-validation or dynamic load failed; never installed.
    Failed,
    /// Was active once, superseded by a later version of the same name.
    RolledBack,
}

impl MutationStatus {
    /// A stable lowercase label, used in narration and the operator surface.
    pub fn as_str(self) -> &'static str {
        match self {
            MutationStatus::Pending => "pending",
            MutationStatus::Validated => "validated",
            MutationStatus::Active => "active",
            MutationStatus::Failed => "failed",
            MutationStatus::RolledBack => "rolled_back",
        }
    }
}

/// One mutation attempt, addressed by `mutation_id`, carrying everything
/// needed to reconstruct its history for external inspection (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationRecord {
    /// Stable identifier for this attempt.
    pub mutation_id: Uuid,
    /// The logical trait name.
    pub trait_name: String,
    /// Monotonic version number for `trait_name`.
    pub version: u32,
    /// Current lifecycle status.
    pub status: MutationStatus,
    /// Content hash of the normalized source (`genesis_sandbox::validator::content_hash`).
    pub code_hash: [u8; 32],
    /// The full source text, retained for operator inspection and the
    /// validator's duplicate-content check.
    pub source: String,
    /// The evolution cycle this mutation belongs to.
    pub cycle_id: Uuid,
    /// The anomaly type (or `"manual_test"`) that opened the cycle.
    pub trigger_type: String,
    /// Unix seconds the Coder created this record.
    pub created_at: u64,
    /// Unix seconds the Patcher installed this mutation, if it ever was.
    pub applied_at: Option<u64>,
    /// Why this attempt failed, when `status` is `Failed`.
    pub failure_reason: Option<String>,
}

impl MutationRecord {
    /// The hex-encoded content hash, for wire surfaces and narration.
    pub fn code_hash_hex(&self) -> String {
        hex::encode(self.code_hash)
    }
}

impl From<&MutationRecord> for genesis_protocol::MutationSummary {
    fn from(record: &MutationRecord) -> Self {
        genesis_protocol::MutationSummary {
            mutation_id: record.mutation_id.to_string(),
            trait_name: record.trait_name.clone(),
            version: record.version,
            status: record.status.as_str().to_string(),
            created_at: record.created_at,
        }
    }
}
