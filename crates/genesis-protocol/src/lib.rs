//! Wire types shared by the engine, the agents, and the operator HTTP
//! surface: the error taxonomy, the binary world-frame codec, agent
//! narration, and operator command shapes.
//!
//! Nothing in this crate touches tokio, axum, or any transport; it only
//! describes bytes and JSON shapes so the crates on either side of a wire
//! agree without depending on each other.

/// Operator command request/response shapes.
pub mod command;
/// The closed, wire-stable error code taxonomy.
pub mod error;
/// Binary world-frame codec.
pub mod frame;
/// Agent narration JSON shapes.
pub mod narration;

pub use command::{
    CommandResponse, ForceEvolutionRequest, ListMutationsResponse, MutationSourceResponse, MutationSummary,
    UpdateParamRequest,
};
pub use error::{ErrorCode, ErrorEnvelope};
pub use frame::{EntityRecord, FrameError, ResourceRecord, WorldFrame, FLAG_INFECTED, FLAG_PREDATOR};
pub use narration::{
    AgentTag, CodeMetadata, FeedMessage, MutationMetadata, NarrationMetadata, PlanMetadata, RegistryMetadata,
    TriggerMetadata,
};
