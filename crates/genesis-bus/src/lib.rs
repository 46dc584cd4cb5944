//! The Event Bus: in-process, typed publish/subscribe decoupling the
//! World Engine's telemetry from the Watcher/Architect/Coder/Patcher
//! pipeline and the stream surface.
//!
//! Three backpressure policies cover the nine closed channels: a `watch`
//! slot for the coalescable `Telemetry` channel, bounded per-subscriber
//! `mpsc` queues with a short grace period for cycle-critical channels, and
//! a ring buffer with newest-overflow-drops-oldest semantics for everything
//! else.

/// The fixed `Channel` enum and its backpressure policy.
pub mod channel;
/// The Event Bus itself.
pub mod bus;
/// Ring-buffer backing for non-critical channels.
pub mod ring;
/// The cancelable subscriber handle.
pub mod subscription;

pub use bus::EventBus;
pub use channel::{Channel, ChannelPolicy};
pub use subscription::Subscription;
