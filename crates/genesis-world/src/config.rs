//! Engine configuration: defaults, environment-variable overrides, and the
//! queued-parameter-change validation behind `ApplyParams` (spec.md §4.1).

use crate::executor::ExecutorBudgets;
use crate::spatial::DEFAULT_CELL_SIZE;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// World-engine configuration, constructible from defaults or from the
/// process environment (`GENESIS_*` variables), mirroring the
/// `parse_config()` idiom this workspace's binaries already use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Milliseconds per tick.
    pub tick_rate_ms: u64,
    /// Below this many living entities, the respawn policy force-spawns
    /// the deficit.
    pub min_population: u64,
    /// Hard cap on living entities.
    pub max_entities: u64,
    /// Velocity damping applied to every entity each tick, in `[0, 1]`.
    pub friction: f32,
    /// Stochastic spawn rate above `min_population`, in `spawn_rate / max_entities`.
    pub spawn_rate: f32,
    /// Stochastic resource respawn rate.
    pub resource_spawn_rate: f32,
    /// World rectangle width.
    pub world_width: f32,
    /// World rectangle height.
    pub world_height: f32,
    /// Spatial index cell size.
    pub cell_size: f32,
    /// Emit a telemetry snapshot every N ticks.
    pub snapshot_interval: u64,
    /// Emit a world frame every N ticks.
    pub stream_interval: u64,
    /// Species maximum age in ticks.
    pub max_age: u64,
    /// Genesis RNG seed.
    pub genesis_seed: u64,
    /// Trait executor budgets.
    pub executor_budgets: ExecutorBudgets,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            tick_rate_ms: 16,
            min_population: 5,
            max_entities: 200,
            friction: 0.05,
            spawn_rate: 1.0,
            resource_spawn_rate: 1.0,
            world_width: 1000.0,
            world_height: 1000.0,
            cell_size: DEFAULT_CELL_SIZE,
            snapshot_interval: 10,
            stream_interval: 2,
            max_age: 10_000,
            genesis_seed: 1337,
            executor_budgets: ExecutorBudgets::default(),
        }
    }
}

impl EngineConfig {
    /// Tick rate expressed as a [`Duration`].
    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms.max(1))
    }

    /// Build a config from defaults, overriding any field whose
    /// `GENESIS_*` environment variable is set and parses.
    pub fn from_env() -> Self {
        let mut cfg = EngineConfig::default();
        if let Some(v) = env_u64("GENESIS_TICK_RATE_MS") {
            cfg.tick_rate_ms = v.max(1);
        }
        if let Some(v) = env_u64("GENESIS_MIN_POPULATION") {
            cfg.min_population = v;
        }
        if let Some(v) = env_u64("GENESIS_MAX_ENTITIES") {
            cfg.max_entities = v.max(cfg.min_population);
        }
        if let Some(v) = env_f32("GENESIS_FRICTION") {
            cfg.friction = v.clamp(0.0, 1.0);
        }
        if let Some(v) = env_f32("GENESIS_SPAWN_RATE") {
            cfg.spawn_rate = v.max(0.0);
        }
        if let Some(v) = env_f32("GENESIS_RESOURCE_SPAWN_RATE") {
            cfg.resource_spawn_rate = v.max(0.0);
        }
        if let Some(v) = env_u64("GENESIS_SEED") {
            cfg.genesis_seed = v;
        }
        cfg
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

fn env_f32(key: &str) -> Option<f32> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

/// One recognized `ApplyParams` change, already validated against its
/// per-name constraint (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParamChange {
    /// New tick rate in milliseconds; must be positive.
    TickRateMs(u64),
    /// New minimum population; non-negative (always true for `u64`).
    MinPopulation(u64),
    /// New max entity cap; must be >= the (possibly also-changing) min population.
    MaxEntities(u64),
    /// New friction coefficient; must lie in `[0, 1]`.
    Friction(f32),
    /// New spawn rate; must be non-negative.
    SpawnRate(f32),
    /// New resource spawn rate; must be non-negative.
    ResourceSpawnRate(f32),
}

/// Why a requested parameter change was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    /// The name is not in the recognized set.
    #[error("unrecognized parameter: {0}")]
    UnknownName(String),
    /// The value failed its name-specific constraint.
    #[error("parameter {name} rejected value {value}: {reason}")]
    InvalidValue {
        /// The parameter name.
        name: String,
        /// The rejected value, stringified for the error message.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Parse and validate one `{name, value}` pair against the recognized set
/// and its per-name constraint. `max_entities` is validated against the
/// config's *current* `min_population` unless this same batch also changes
/// it (see [`validate_batch`]).
pub fn validate_param(name: &str, value: serde_json::Value, current_min_population: u64) -> Result<ParamChange, ParamError> {
    let as_u64 = || {
        value
            .as_u64()
            .ok_or_else(|| ParamError::InvalidValue {
                name: name.to_string(),
                value: value.to_string(),
                reason: "expected a non-negative integer".to_string(),
            })
    };
    let as_f32 = || {
        value
            .as_f64()
            .map(|f| f as f32)
            .ok_or_else(|| ParamError::InvalidValue {
                name: name.to_string(),
                value: value.to_string(),
                reason: "expected a number".to_string(),
            })
    };

    match name {
        "tick_rate_ms" => {
            let v = as_u64()?;
            if v == 0 {
                return Err(ParamError::InvalidValue {
                    name: name.to_string(),
                    value: value.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
            Ok(ParamChange::TickRateMs(v))
        }
        "min_population" => Ok(ParamChange::MinPopulation(as_u64()?)),
        "max_entities" => {
            let v = as_u64()?;
            if v < current_min_population {
                return Err(ParamError::InvalidValue {
                    name: name.to_string(),
                    value: value.to_string(),
                    reason: format!("must be >= min_population ({current_min_population})"),
                });
            }
            Ok(ParamChange::MaxEntities(v))
        }
        "friction" => {
            let v = as_f32()?;
            if !(0.0..=1.0).contains(&v) {
                return Err(ParamError::InvalidValue {
                    name: name.to_string(),
                    value: value.to_string(),
                    reason: "must lie in [0, 1]".to_string(),
                });
            }
            Ok(ParamChange::Friction(v))
        }
        "spawn_rate" => {
            let v = as_f32()?;
            if v < 0.0 {
                return Err(ParamError::InvalidValue {
                    name: name.to_string(),
                    value: value.to_string(),
                    reason: "must be >= 0".to_string(),
                });
            }
            Ok(ParamChange::SpawnRate(v))
        }
        "resource_spawn_rate" => {
            let v = as_f32()?;
            if v < 0.0 {
                return Err(ParamError::InvalidValue {
                    name: name.to_string(),
                    value: value.to_string(),
                    reason: "must be >= 0".to_string(),
                });
            }
            Ok(ParamChange::ResourceSpawnRate(v))
        }
        other => Err(ParamError::UnknownName(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_tick_rate_is_rejected() {
        let err = validate_param("tick_rate_ms", serde_json::json!(0), 5).unwrap_err();
        assert!(matches!(err, ParamError::InvalidValue { .. }));
    }

    #[test]
    fn max_entities_below_min_population_is_rejected() {
        let err = validate_param("max_entities", serde_json::json!(3), 5).unwrap_err();
        assert!(matches!(err, ParamError::InvalidValue { .. }));
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = validate_param("gravity", serde_json::json!(1), 5).unwrap_err();
        assert!(matches!(err, ParamError::UnknownName(_)));
    }

    #[test]
    fn valid_friction_is_accepted() {
        let change = validate_param("friction", serde_json::json!(0.2), 5).expect("valid");
        assert_eq!(change, ParamChange::Friction(0.2));
    }
}
