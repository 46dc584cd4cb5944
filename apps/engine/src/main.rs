//! Boots the AI-Genesis World Engine standalone: the tick loop, the full
//! Watcher → Architect → Coder → Patcher pipeline, and the bus wiring
//! between them, with no network surface. Useful headless (the end-to-end
//! scenario tests under `tests/` run against this wiring directly) and as
//! the reference for `apps/server`, which boots the same [`Collaborators`]
//! bundle and layers an HTTP/WebSocket surface on top.

use std::env;
use std::sync::Arc;

use genesis_agents::{HttpLlmClient, StubLlmClient};
use genesis_engine::Collaborators;
use genesis_world::EngineConfig;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = EngineConfig::from_env();
    info!(
        tick_rate_ms = config.tick_rate_ms,
        min_population = config.min_population,
        max_entities = config.max_entities,
        genesis_seed = config.genesis_seed,
        "engine configuration loaded"
    );

    let artifacts_dir = env::var("GENESIS_ARTIFACTS_DIR").unwrap_or_else(|_| "./data/mutations".to_string());
    let llm = build_llm_client();

    let Collaborators { engine, .. } = genesis_engine::bootstrap(config, artifacts_dir, llm).await?;
    info!("world engine running; press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested, waiting for the in-flight tick to finish");
    engine.stop();
    info!("engine stopped cleanly");

    Ok(())
}

/// An `HttpLlmClient` against `GENESIS_LLM_ENDPOINT` when set, otherwise a
/// `StubLlmClient` that narrates failure for every trigger — a clearly
/// labelled stand-in rather than a silent no-op, for runs with no live LLM
/// collaborator configured.
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
