//! The Stream Multiplexer (spec.md §4.11): the session registry and
//! fan-out logic behind `apps/server`'s `/ws/stream` route.

/// Per-session outbound queue with frame/narration overflow policy.
pub mod outbound;
/// The Stream Multiplexer itself.
pub mod multiplexer;
/// Session registry.
pub mod session;

pub use multiplexer::StreamMultiplexer;
pub use outbound::{OutboundMessage, OutboundQueue};
pub use session::{Session, SessionId, SessionRegistry, DEFAULT_SESSION_QUEUE_CAPACITY};
