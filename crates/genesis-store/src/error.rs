//! Errors surfaced by the mutation store.

use uuid::Uuid;

/// Failure modes for store operations. Every variant maps to a stable
/// [`genesis_protocol::ErrorCode`] at the API boundary; this crate keeps its
/// own richer type internally.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record exists for the given id.
    #[error("no mutation record for {0}")]
    NotFound(Uuid),
    /// The artifact directory could not be created, written, or read.
    #[error("artifact io failure for {trait_name} v{version}: {source}")]
    Io {
        trait_name: String,
        version: u32,
        #[source]
        source: std::io::Error,
    },
    /// The on-disk index failed to encode or decode.
    #[error("index (de)serialization failure: {0}")]
    Index(#[from] bincode::Error),
}
