//! The Mutation Store: durable, filesystem-backed history of every trait
//! source the Coder Agent has ever produced.
//!
//! There is no database (spec.md §6 non-goal): an in-memory index mirrored
//! to a `bincode`-encoded file on every write, and one artifact file per
//! `(trait_name, version)` under `artifacts/`. Retention keeps at most `K`
//! artifact files per trait name on disk; the index entries themselves are
//! never deleted, so `GET /command/mutations` can always answer for the
//! lifetime of a run.

mod error;
mod record;
mod store;

pub use error::StoreError;
pub use record::{MutationRecord, MutationStatus};
pub use store::MutationStore;
