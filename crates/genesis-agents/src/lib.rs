//! The Watcher, Architect, and Coder agents: the detect -> plan -> generate
//! half of the evolution pipeline (spec.md §4.5-§4.7). The Runtime Patcher,
//! which installs a Coder's output into the live registry, lives in its own
//! crate since it depends on `genesis-world`'s mutable registry surface in
//! a way the other three don't.

/// The Architect Agent: trigger -> structured plan.
pub mod architect;
/// The Coder Agent: plan -> validated trait source.
pub mod coder;
/// Forgiving JSON-object extraction from free-form LLM replies.
pub mod json_extract;
/// The external LLM collaborator trait and its two implementations.
pub mod llm;
/// Per-key leaky-bucket rate limiting.
pub mod ratelimit;
/// The Watcher Agent: telemetry -> anomaly trigger.
pub mod watcher;

pub use architect::handle_trigger;
pub use coder::handle_plan;
pub use json_extract::extract_json_object;
pub use llm::{HttpLlmClient, LlmClient, LlmError, StubLlmClient};
pub use ratelimit::RateLimiter;
pub use watcher::{evaluate_anomaly, Watcher, WatcherConfig};
