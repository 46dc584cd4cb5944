//! The Molbot world: entities, environment, spatial index, trait registry
//! and executor, and the fixed-rate Engine tick loop that ties them
//! together.
//!
//! Every other crate in the workspace reaches the live world only through
//! [`Snapshot`], [`genesis_protocol::frame::WorldFrame`], or an
//! [`EngineHandle`] — never through a direct reference into [`Engine`]'s
//! internals, since the engine runs on its own dedicated thread.

/// A handful of native (non-DSL) traits available before any evolution
/// cycle has installed one.
pub mod builtin;
/// Engine configuration and `ApplyParams` validation.
pub mod config;
/// The fixed-rate tick loop and its public handle.
pub mod engine;
/// The Molbot entity type.
pub mod entity;
/// The bounded world rectangle and its resources.
pub mod environment;
/// Runs each entity's active traits under a hard per-trait budget.
pub mod executor;
/// The atomically-swapped trait registry and the `Trait` ABI.
pub mod registry;
/// Periodic aggregate telemetry.
pub mod snapshot;
/// Fixed-grid neighbour index, rebuilt once per tick.
pub mod spatial;
/// The owned, `Send`-safe view handed to a trait invocation.
pub mod view;

pub use config::{EngineConfig, ParamChange, ParamError};
pub use engine::{Engine, EngineHandle, EngineStartError, FrameHook, SnapshotHook, StateHook};
pub use entity::{DeathCause, Entity, EntityId, LifecycleState, SpeciesLimits, TraitName};
pub use environment::{Environment, Resource};
pub use executor::{ExecutorBudgets, TickExecutionReport, TraitExecutor};
pub use registry::{RegistryEntry, RegistrySnapshot, Trait, TraitFault, TraitRegistry};
pub use snapshot::Snapshot;
pub use spatial::{CellCoord, SpatialIndex, DEFAULT_CELL_SIZE};
pub use view::{ConsumeRequest, EntityView, NearbyEntity, NearbyResource};
