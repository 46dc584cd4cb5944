//! The Trait ABI and the atomically-swapped Trait Registry (spec.md §4.3).
//!
//! Writers (only the Runtime Patcher) construct a new map that is the
//! current map with one entry added or replaced, then swap the whole `Arc`
//! in one write-lock acquisition. Readers take the read lock only long
//! enough to clone the `Arc`, then release it and use the clone — a
//! [`RegistrySnapshot`] — for the duration of one logical operation, which
//! is what gives spec.md's "one atomic snapshot of the registry" its
//! type-level guarantee rather than a convention every call site has to
//! remember.

use crate::entity::TraitName;
use crate::view::EntityView;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Why a trait invocation failed. Both variants are local to the entity
/// that hosted the invocation; neither ever propagates to the Engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraitFault {
    /// The invocation exceeded its per-trait hard budget. Raised by the
    /// executor, never by the trait implementation itself.
    Timeout,
    /// The trait implementation returned an error.
    Error(String),
}

impl std::fmt::Display for TraitFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraitFault::Timeout => write!(f, "trait exceeded its per-invocation time budget"),
            TraitFault::Error(msg) => write!(f, "trait raised a fault: {msg}"),
        }
    }
}

/// The narrow capability interface every behaviour — native or
/// DSL-interpreted — is reached through. spec.md §9: "a trait is a value
/// implementing a single `execute(entity_handle) -> outcome` operation."
pub trait Trait: Send + Sync {
    /// Run this trait's behaviour against one entity's view.
    fn execute(&self, view: &mut EntityView) -> Result<(), TraitFault>;
}

/// One registry slot: the active implementation plus its version number.
#[derive(Clone)]
pub struct RegistryEntry {
    /// The currently active implementation.
    pub implementation: Arc<dyn Trait>,
    /// The active version number for this trait name.
    pub version: u32,
}

type RegistryMap = BTreeMap<TraitName, RegistryEntry>;

/// An immutable point-in-time view of the registry, held for the duration
/// of one logical operation (e.g. one spawn).
#[derive(Clone)]
pub struct RegistrySnapshot(Arc<RegistryMap>);

impl RegistrySnapshot {
    /// Look up a trait's current entry by name.
    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.0.get(name)
    }

    /// `true` if `name` currently resolves to an implementation.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// All currently-registered trait names, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &TraitName> {
        self.0.keys()
    }

    /// Number of distinct registered trait names.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` if the registry currently holds no traits.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The single-writer, many-reader trait registry.
pub struct TraitRegistry {
    inner: RwLock<Arc<RegistryMap>>,
    registry_version: AtomicU64,
}

impl Default for TraitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TraitRegistry {
    /// An empty registry at registry-version zero.
    pub fn new() -> Self {
        TraitRegistry {
            inner: RwLock::new(Arc::new(BTreeMap::new())),
            registry_version: AtomicU64::new(0),
        }
    }

    /// Atomically replace (or add) the entry for `name`. Returns the new
    /// registry-wide version counter, used as `MutationApplied.registry_version`.
    pub fn install(&self, name: TraitName, implementation: Arc<dyn Trait>, version: u32) -> u64 {
        let mut guard = self.inner.write();
        let mut next: RegistryMap = (**guard).clone();
        next.insert(name, RegistryEntry { implementation, version });
        *guard = Arc::new(next);
        self.registry_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Register a native (built-in) trait at version 1, used at genesis for
    /// the entities the world boots with before any evolution cycle runs.
    pub fn register_native(&self, name: impl Into<String>, implementation: Arc<dyn Trait>) -> u64 {
        self.install(name.into(), implementation, 1)
    }

    /// Take a read-lock only long enough to clone the `Arc`; the returned
    /// snapshot is then lock-free for its holder's lifetime.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot(self.inner.read().clone())
    }

    /// The current registry-wide version counter.
    pub fn registry_version(&self) -> u64 {
        self.registry_version.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoOp;
    impl Trait for NoOp {
        fn execute(&self, _view: &mut EntityView) -> Result<(), TraitFault> {
            Ok(())
        }
    }

    #[test]
    fn install_is_visible_to_new_snapshots_only() {
        let registry = TraitRegistry::new();
        let before = registry.snapshot();
        registry.register_native("wander", Arc::new(NoOp));
        assert!(!before.contains("wander"));
        let after = registry.snapshot();
        assert!(after.contains("wander"));
    }

    #[test]
    fn install_never_holds_two_versions_for_one_name() {
        let registry = TraitRegistry::new();
        registry.install("forage".to_string(), Arc::new(NoOp), 1);
        registry.install("forage".to_string(), Arc::new(NoOp), 2);
        let snap = registry.snapshot();
        assert_eq!(snap.get("forage").expect("entry").version, 2);
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn registry_version_is_monotonic_across_installs() {
        let registry = TraitRegistry::new();
        let v1 = registry.install("a".to_string(), Arc::new(NoOp), 1);
        let v2 = registry.install("b".to_string(), Arc::new(NoOp), 1);
        assert!(v2 > v1);
    }
}
