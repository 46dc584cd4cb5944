//! HTTP handlers for the operator command surface (spec.md §6
//! "Operator commands"): health, aggregate stats, parameter updates,
//! forced evolution, the mutation history, and entity inspection/kill.

use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{ConnectInfo, Path, State};
use axum::http::StatusCode;
use axum::Json;
use genesis_events::{EvolutionForceEvent, ParamsChangedEvent, Severity};
use genesis_protocol::{
    CommandResponse, ErrorCode, ErrorEnvelope, ForceEvolutionRequest, ListMutationsResponse, MutationSourceResponse,
    MutationSummary, UpdateParamRequest,
};
use genesis_world::{config::validate_param, Entity, EntityId, ParamChange, ParamError};
use serde_json::json;
use uuid::Uuid;

use crate::state::AppState;

fn unix_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

fn rate_limited<T>() -> (StatusCode, Json<CommandResponse<T>>) {
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(CommandResponse::Failure {
            error: ErrorEnvelope::new(ErrorCode::RateLimitExceeded, "operator command rate limit exceeded"),
        }),
    )
}

/// `GET /health`.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /stats`: the most recent telemetry snapshot plus a few
/// operator-facing counters the snapshot itself doesn't carry.
pub async fn stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.latest_snapshot.read().clone();
    let world = state.world_state();
    let mutation_count = state.collaborators.store.list().len();
    let session_count = state.collaborators.stream.registry().len();

    Json(json!({
        "snapshot": snapshot,
        "world_width": world.width,
        "world_height": world.height,
        "resource_count": world.resource_count,
        "mutation_count": mutation_count,
        "connected_sessions": session_count,
    }))
}

/// `POST /command/update_param`.
pub async fn update_param(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<UpdateParamRequest>,
) -> (StatusCode, Json<CommandResponse<serde_json::Value>>) {
    if !state.command_limiter.check(&addr.ip().to_string()) {
        return rate_limited();
    }

    match validate_param(&request.name, request.value.clone(), state.min_population()) {
        Ok(change) => {
            state.collaborators.engine.apply_params(vec![change]);
            if let ParamChange::MinPopulation(v) = change {
                state.set_min_population(v);
            }
            state
                .collaborators
                .bus
                .publish_params_changed(ParamsChangedEvent {
                    name: request.name.clone(),
                    value: request.value.clone(),
                    occurred_at: unix_seconds(),
                })
                .await;
            (StatusCode::OK, Json(CommandResponse::Success { data: json!({ "applied": request.name }) }))
        }
        Err(ParamError::UnknownName(name)) => (
            StatusCode::BAD_REQUEST,
            Json(CommandResponse::Failure {
                error: ErrorEnvelope::new(ErrorCode::ClassNotFound, format!("unrecognized parameter: {name}")),
            }),
        ),
        Err(ParamError::InvalidValue { name, value, reason }) => (
            StatusCode::BAD_REQUEST,
            Json(CommandResponse::Failure {
                error: ErrorEnvelope::new(ErrorCode::LoadFailed, format!("{name}={value} rejected: {reason}")),
            }),
        ),
    }
}

/// `POST /command/force_evolution`. The Watcher Agent owns all trigger
/// construction; this route only has to publish the raw request.
pub async fn force_evolution(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<ForceEvolutionRequest>,
) -> (StatusCode, Json<CommandResponse<serde_json::Value>>) {
    if !state.command_limiter.check(&addr.ip().to_string()) {
        return rate_limited();
    }

    let severity = match request.severity.as_deref() {
        Some(s) => match parse_severity(s) {
            Some(sev) => Some(sev),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(CommandResponse::Failure {
                        error: ErrorEnvelope::new(ErrorCode::ClassNotFound, format!("unrecognized severity: {s}")),
                    }),
                )
            }
        },
        None => None,
    };

    state
        .collaborators
        .bus
        .force_evolution(EvolutionForceEvent {
            reason: request.reason,
            severity,
            occurred_at: unix_seconds(),
        })
        .await;

    (StatusCode::OK, Json(CommandResponse::Success { data: json!({ "forced": true }) }))
}

fn parse_severity(s: &str) -> Option<Severity> {
    match s.to_ascii_lowercase().as_str() {
        "low" => Some(Severity::Low),
        "medium" => Some(Severity::Medium),
        "high" => Some(Severity::High),
        "critical" => Some(Severity::Critical),
        _ => None,
    }
}

/// `GET /command/mutations`, newest first.
pub async fn list_mutations(State(state): State<AppState>) -> Json<CommandResponse<ListMutationsResponse>> {
    let mut mutations: Vec<MutationSummary> = state.collaborators.store.list().iter().map(MutationSummary::from).collect();
    mutations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(CommandResponse::Success {
        data: ListMutationsResponse { mutations },
    })
}

/// `GET /command/mutations/:id/source`.
pub async fn mutation_source(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> (StatusCode, Json<CommandResponse<MutationSourceResponse>>) {
    let Some(record) = state.collaborators.store.get(id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(CommandResponse::Failure {
                error: ErrorEnvelope::new(ErrorCode::ClassNotFound, format!("no mutation with id {id}")),
            }),
        );
    };

    match state.collaborators.store.read_artifact(&record.trait_name, record.version) {
        Ok(source) => (
            StatusCode::OK,
            Json(CommandResponse::Success {
                data: MutationSourceResponse {
                    mutation_id: record.mutation_id.to_string(),
                    source,
                    code_hash: record.code_hash_hex(),
                },
            }),
        ),
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(CommandResponse::Failure {
                error: ErrorEnvelope::new(ErrorCode::LoadFailed, format!("artifact unavailable: {e}")),
            }),
        ),
    }
}

/// `GET /entities`.
pub async fn list_entities(State(state): State<AppState>) -> Json<Vec<Entity>> {
    Json(state.world_state().entities)
}

/// `GET /entities/:id`.
pub async fn get_entity(State(state): State<AppState>, Path(id): Path<u64>) -> (StatusCode, Json<Option<Entity>>) {
    let entity = state.world_state().entities.into_iter().find(|e| e.id == EntityId(id));
    match entity {
        Some(e) => (StatusCode::OK, Json(Some(e))),
        None => (StatusCode::NOT_FOUND, Json(None)),
    }
}

/// `POST /entities/:id/kill`.
pub async fn kill_entity(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(id): Path<u64>,
) -> (StatusCode, Json<CommandResponse<serde_json::Value>>) {
    if !state.command_limiter.check(&addr.ip().to_string()) {
        return rate_limited();
    }

    state.collaborators.engine.kill_entity(EntityId(id));
    (StatusCode::OK, Json(CommandResponse::Success { data: json!({ "queued": id }) }))
}
