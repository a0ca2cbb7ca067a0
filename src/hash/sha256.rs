//! SHA-256 chunk hashing implementation.

use sha2::{Digest as _, Sha256};

use crate::chunk::ChunkHash;

/// A hasher that computes SHA-256 hashes.
#[derive(Debug, Clone, Default)]
pub struct Sha256Hasher {
    state: Sha256,
}

impl Sha256Hasher {
    /// Creates a new hasher.
    pub fn new() -> Self {
        Self {
            state: Sha256::new(),
        }
    }

    /// Updates the hasher with more data.
    pub fn update(&mut self, data: &[u8]) {
        self.state.update(data);
    }

    /// Finalizes and returns the hash without consuming the state.
    pub fn finalize(&self) -> ChunkHash {
        ChunkHash::new(self.state.clone().finalize().into())
    }

    /// Resets the hasher to its initial state.
    pub fn reset(&mut self) {
        self.state = Sha256::new();
    }
}
