//! Operator command request/response shapes. The HTTP surface that parses
//! these into routes lives in `apps/server`; this module only owns the wire
//! shapes so the engine, agents, and server all agree on them.

use crate::error::ErrorEnvelope;
use serde::{Deserialize, Serialize};

/// Body of `POST /command/update_param`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateParamRequest {
    /// The parameter name; must be in the fixed recognized set.
    pub name: String,
    /// The new value, as JSON so both numeric and boolean parameters fit.
    pub value: serde_json::Value,
}

/// Body of `POST /command/force_evolution`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForceEvolutionRequest {
    /// Optional free-text reason, carried into the trigger's narration.
    pub reason: Option<String>,
    /// Optional severity override; defaults to `"forced"` when absent.
    pub severity: Option<String>,
}

/// One row of `GET /command/mutations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationSummary {
    /// The mutation's stable id.
    pub mutation_id: String,
    /// The trait name this mutation targets.
    pub trait_name: String,
    /// Monotonic version number for this trait name.
    pub version: u32,
    /// Lifecycle status: `pending`, `applied`, `rejected`, `failed`.
    pub status: String,
    /// Unix seconds at creation.
    pub created_at: u64,
}

/// Body of `GET /command/mutations`, ordered by descending `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListMutationsResponse {
    /// The mutation rows, newest first.
    pub mutations: Vec<MutationSummary>,
}

/// Body of `GET /command/mutations/:id/source`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationSourceResponse {
    /// The mutation id this source belongs to.
    pub mutation_id: String,
    /// The trait source text.
    pub source: String,
    /// The content hash of `source`, hex-encoded.
    pub code_hash: String,
}

/// A uniform envelope wrapping every operator command's result, so a
/// client can branch on `ok` without parsing two different shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "ok")]
pub enum CommandResponse<T> {
    /// The command succeeded; `data` carries the command-specific body.
    #[serde(rename = "true")]
    Success {
        /// The command-specific response body.
        data: T,
    },
    /// The command failed; `error` carries a stable code plus detail.
    #[serde(rename = "false")]
    Failure {
        /// The structured error.
        error: ErrorEnvelope,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn update_param_request_round_trips() {
        let req = UpdateParamRequest {
            name: "spawn_rate".to_string(),
            value: serde_json::json!(0.25),
        };
        let json = serde_json::to_string(&req).expect("serialize");
        let decoded: UpdateParamRequest = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(decoded.name, "spawn_rate");
    }

    #[test]
    fn command_response_failure_carries_error_code() {
        let resp: CommandResponse<()> = CommandResponse::Failure {
            error: ErrorEnvelope::new(ErrorCode::RateLimitExceeded, "too many requests"),
        };
        let json = serde_json::to_string(&resp).expect("serialize");
        assert!(json.contains("RATE_LIMIT_EXCEEDED"));
    }
}
