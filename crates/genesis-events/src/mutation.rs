//! `MutationReady`, `MutationApplied`, and `MutationFailed` events, emitted
//! by the Coder and Runtime Patcher.

use genesis_protocol::ErrorCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which stage of the pipeline a failure occurred in, for narration and
/// operator inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// The Architect's LLM call or JSON extraction failed.
    Planning,
    /// The Coder's LLM call, extraction, or first validation failed.
    Coding,
    /// The Patcher's re-validation or dynamic load failed.
    Patching,
}

/// Published by the Coder once a trait's source has passed validation and
/// been written to the artifacts directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationReadyEvent {
    /// The cycle this mutation belongs to.
    pub cycle_id: Uuid,
    /// Stable identifier for this mutation attempt.
    pub mutation_id: Uuid,
    /// The logical trait name.
    pub trait_name: String,
    /// The version this attempt was assigned.
    pub version: u32,
    /// Absolute path to the written artifact.
    pub file_path: String,
    /// Content hash of the normalized source.
    pub code_hash: [u8; 32],
    /// Unix seconds at emission.
    pub occurred_at: u64,
}

/// Published by the Patcher once a mutation has been installed into the
/// live registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationAppliedEvent {
    /// The cycle this mutation belongs to.
    pub cycle_id: Uuid,
    /// The mutation that was applied.
    pub mutation_id: Uuid,
    /// The logical trait name.
    pub trait_name: String,
    /// The installed version.
    pub version: u32,
    /// The registry-wide version counter after the swap.
    pub registry_version: u64,
    /// Unix seconds at emission.
    pub occurred_at: u64,
}

/// Published whenever a cycle cannot proceed to a successful install.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationFailedEvent {
    /// The cycle this failure belongs to.
    pub cycle_id: Uuid,
    /// The mutation attempt that failed, when one had been created.
    pub mutation_id: Uuid,
    /// The stable error code for this failure.
    pub reason: ErrorCode,
    /// Which pipeline stage the failure occurred in.
    pub stage: FailureStage,
    /// The prior active version's artifact path, when one exists.
    pub rollback_to: Option<String>,
    /// Unix seconds at emission.
    pub occurred_at: u64,
}
