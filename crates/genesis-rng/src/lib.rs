//! Deterministic, subsystem-isolated random number generation for the
//! AI-Genesis world engine.
//!
//! The Engine owns a single [`GlobalSeed`], derived once at genesis, and
//! threads every draw of randomness through a named [`RngSubsystem`] stream.
//! Given the same genesis seed and the same call order, every stream
//! reproduces byte-identical output, which is what makes a tick
//! reproducible across runs.

/// RFC 7539 ChaCha20 block generator.
pub mod chacha20;

/// Subsystem-isolated stream wrapper.
pub mod rng_stream;

/// Genesis seed management and stream derivation.
pub mod global_seed;

pub use chacha20::ChaCha20Rng;
pub use global_seed::GlobalSeed;
pub use rng_stream::{RngStream, RngSubsystem};
