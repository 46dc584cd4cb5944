//! The Runtime Patcher (spec.md §4.8): the sole writer of the live Trait
//! Registry, installing a Coder-validated mutation after an independent,
//! defense-in-depth re-validation pass.

mod patcher;

pub use patcher::{run, Patcher, DEFAULT_LOAD_TIMEOUT};
