//! The AI-Genesis operator HTTP/WebSocket surface (spec.md §6 "Operator
//! commands", SPEC_FULL.md §4.12): boots the same [`Collaborators`]
//! bundle `apps/engine` boots, then layers axum routes on top, following
//! the teacher's own `apps/server/src/main.rs` Router-plus-`CorsLayer`
//! idiom.

mod routes;
mod state;
mod websocket;

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use genesis_agents::{HttpLlmClient, StubLlmClient};
use genesis_world::EngineConfig;
use tower_http::cors::CorsLayer;
use tracing::info;

use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = EngineConfig::from_env();
    let min_population = config.min_population;
    info!(
        tick_rate_ms = config.tick_rate_ms,
        min_population,
        max_entities = config.max_entities,
        "operator server starting, booting world engine"
    );

    let artifacts_dir = env::var("GENESIS_ARTIFACTS_DIR").unwrap_or_else(|_| "./data/mutations".to_string());
    let llm = build_llm_client();
    let collaborators = genesis_engine::bootstrap(config, artifacts_dir, llm).await?;
    let state = AppState::new(collaborators, min_population);

    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/stats", get(routes::stats))
        .route("/command/update_param", post(routes::update_param))
        .route("/command/force_evolution", post(routes::force_evolution))
        .route("/command/mutations", get(routes::list_mutations))
        .route("/command/mutations/:id/source", get(routes::mutation_source))
        .route("/entities", get(routes::list_entities))
        .route("/entities/:id", get(routes::get_entity))
        .route("/entities/:id/kill", post(routes::kill_entity))
        .route("/ws/stream", get(websocket::ws_stream))
        .with_state(state)
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = env::var("GENESIS_SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string()).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "operator server listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

/// An `HttpLlmClient` against `GENESIS_LLM_ENDPOINT` when set, otherwise a
/// `StubLlmClient` that narrates failure for every trigger.
fn build_llm_client() -> Arc<dyn genesis_agents::LlmClient> {
    match env::var("GENESIS_LLM_ENDPOINT") {
        Ok(endpoint) => {
            let model = env::var("GENESIS_LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
            let api_key = env::var("GENESIS_LLM_API_KEY").ok();
            info!(endpoint, model, "using http llm collaborator");
            Arc::new(HttpLlmClient::new(endpoint, model, api_key))
        }
        Err(_) => {
            info!("GENESIS_LLM_ENDPOINT not set; using a stub llm collaborator that cannot propose real mutations");
            Arc::new(StubLlmClient::always(
                "no llm collaborator is configured for this run (set GENESIS_LLM_ENDPOINT)",
            ))
        }
    }
}
