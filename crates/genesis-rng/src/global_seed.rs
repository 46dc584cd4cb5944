use super::rng_stream::{RngStream, RngSubsystem};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Owns the genesis seed and lazily derives one [`RngStream`] per
/// `(subsystem, stream_id)` pair the Engine asks for.
///
/// Only the 32-byte derived seed is serialized; on deserialize, streams are
/// recreated on demand so a resumed engine draws the same values a
/// from-scratch engine would at the same tick (given identical call order).
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalSeed {
    seed: [u8; 32],
    streams: BTreeMap<(RngSubsystem, u64), RngStream>,
}

impl Serialize for GlobalSeed {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.seed)
    }
}

impl<'de> Deserialize<'de> for GlobalSeed {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seed: [u8; 32] = Deserialize::deserialize(deserializer)?;
        Ok(GlobalSeed::from_seed_bytes(seed))
    }
}

impl GlobalSeed {
    /// Derive the 32-byte key from a `u64` genesis seed via `blake3`.
    pub fn from_genesis(seed: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&seed.to_le_bytes());
        Self::from_seed_bytes(*hasher.finalize().as_bytes())
    }

    fn from_seed_bytes(seed: [u8; 32]) -> Self {
        Self {
            seed,
            streams: BTreeMap::new(),
        }
    }

    /// Fetch (creating if absent) the stream for `(subsystem, stream_id)`.
    pub fn stream(&mut self, subsystem: RngSubsystem, stream_id: u64) -> &mut RngStream {
        self.streams
            .entry((subsystem, stream_id))
            .or_insert_with(|| RngStream::new(self.seed, subsystem, stream_id))
    }

    /// The derived 32-byte seed, useful for persisting alongside a snapshot.
    pub fn seed_bytes(&self) -> [u8; 32] {
        self.seed
    }

    /// Number of distinct streams created so far.
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_genesis_seed_derives_same_key() {
        let a = GlobalSeed::from_genesis(1337);
        let b = GlobalSeed::from_genesis(1337);
        assert_eq!(a.seed_bytes(), b.seed_bytes());
    }

    #[test]
    fn different_genesis_seeds_diverge() {
        let a = GlobalSeed::from_genesis(1337);
        let b = GlobalSeed::from_genesis(7331);
        assert_ne!(a.seed_bytes(), b.seed_bytes());
    }

    #[test]
    fn repeated_stream_lookups_are_stable() {
        let mut g = GlobalSeed::from_genesis(42);
        let first = g.stream(RngSubsystem::Physics, 0).next_u64();
        // a second, independent GlobalSeed with the same genesis seed and
        // the same call sequence must reproduce the same draw
        let mut g2 = GlobalSeed::from_genesis(42);
        let second = g2.stream(RngSubsystem::Physics, 0).next_u64();
        assert_eq!(first, second);
        assert_eq!(g.stream_count(), 1);
    }
}
