//! Logical simulation time and deterministic math shared across the engine
//! and the trait sandbox.
//!
//! Time in AI-Genesis is tick-based, never wall-clock-based: a [`SimTick`]
//! is the only clock any state-mutating code may read. Wall-clock time is
//! only ever attached to telemetry/narration as an informational field.

pub mod math;

pub use math::DeterministicMath;

use serde::{Deserialize, Serialize};

/// A monotonic simulation tick counter, starting at zero at genesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct SimTick(pub u64);

impl SimTick {
    /// The genesis tick.
    pub fn zero() -> Self {
        SimTick(0)
    }

    /// Advance by one tick, wrapping at `u64::MAX`.
    pub fn advance(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }

    /// The raw tick number.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_start_at_zero_and_advance() {
        let mut t = SimTick::zero();
        assert_eq!(t.as_u64(), 0);
        t.advance();
        assert_eq!(t.as_u64(), 1);
    }
}
