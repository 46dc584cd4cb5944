//! RFC 7539 ChaCha20 cipher stream generator, built on RustCrypto's
//! `chacha20` crate so the block function, quarter-round, and
//! counter/nonce handling are the audited implementation rather than a
//! from-scratch one.
//!
//! Wraps the cipher behind a small buffered-block reader so draws are
//! deterministic and reproducible: the same (key, nonce) pair always
//! produces the same sequence of values regardless of platform or run.

use chacha20::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use chacha20::ChaCha20;

const BLOCK_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct ChaCha20Rng {
    key: [u8; 32],
    nonce: [u8; 12],
    block_counter: u64,
    block_index: usize,
    current_block: [u8; BLOCK_SIZE],
}

impl ChaCha20Rng {
    /// Initialize from a 256-bit key and 96-bit nonce.
    pub fn new(key: [u8; 32], nonce: [u8; 12]) -> Self {
        Self {
            key,
            nonce,
            block_counter: 0,
            block_index: BLOCK_SIZE, // force generation of first block
            current_block: [0u8; BLOCK_SIZE],
        }
    }

    /// Generate the next 32-bit value.
    pub fn next_u32(&mut self) -> u32 {
        if self.block_index >= BLOCK_SIZE {
            self.generate_block();
            self.block_index = 0;
        }
        let bytes = &self.current_block[self.block_index..self.block_index + 4];
        let value = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        self.block_index += 4;
        value
    }

    /// Generate the next 64-bit value.
    pub fn next_u64(&mut self) -> u64 {
        let lo = self.next_u32() as u64;
        let hi = self.next_u32() as u64;
        (hi << 32) | lo
    }

    /// Generate the next f64 in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / 9_007_199_254_740_992.0)
    }

    /// Produce the keystream for block `self.block_counter` by seeking a
    /// fresh cipher instance to that block's byte offset and encrypting a
    /// zeroed buffer.
    fn generate_block(&mut self) {
        let mut cipher = ChaCha20::new(&self.key.into(), &self.nonce.into());
        cipher.seek(self.block_counter * BLOCK_SIZE as u64);
        self.current_block = [0u8; BLOCK_SIZE];
        cipher.apply_keystream(&mut self.current_block);
        self.block_counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chacha20_is_deterministic() {
        let key = [42u8; 32];
        let nonce = [0u8; 12];

        let mut rng1 = ChaCha20Rng::new(key, nonce);
        let mut rng2 = ChaCha20Rng::new(key, nonce);

        for _ in 0..10 {
            assert_eq!(rng1.next_u32(), rng2.next_u32());
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn different_keys_diverge() {
        let nonce = [0u8; 12];
        let mut rng1 = ChaCha20Rng::new([42u8; 32], nonce);
        let mut rng2 = ChaCha20Rng::new([43u8; 32], nonce);
        assert_ne!(rng1.next_u32(), rng2.next_u32());
    }

    #[test]
    fn next_f64_is_in_unit_range() {
        let mut rng = ChaCha20Rng::new([7u8; 32], [1u8; 12]);
        for _ in 0..100 {
            let val = rng.next_f64();
            assert!((0.0..1.0).contains(&val));
        }
    }

    #[test]
    fn crosses_block_boundary_without_repeating() {
        // BLOCK_SIZE bytes == 16 u32 draws per block; pull well past one
        // block to exercise the reseek-and-refill path.
        let mut rng = ChaCha20Rng::new([3u8; 32], [2u8; 12]);
        let draws: Vec<u32> = (0..40).map(|_| rng.next_u32()).collect();
        assert!(draws.windows(2).any(|w| w[0] != w[1]));
    }
}
