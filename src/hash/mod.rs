//! Strong hash implementations for entry and chunk identity.
//!
//! SHA-256 is the canonical algorithm for manifests. BLAKE3 is available via
//! the `hash-blake3` feature.
//!
//! - [`DigestAlgorithm`] - Selects the algorithm
//! - [`Digester`] - Incremental hasher producing a [`Digest`](crate::Digest)

mod sha256;

#[cfg(feature = "hash-blake3")]
mod blake3;

use std::io;

use crate::chunk::Digest;

pub use sha256::Sha256Hasher;

#[cfg(feature = "hash-blake3")]
pub use blake3::Blake3Hasher;

/// Hash algorithm used for payload and chunk digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DigestAlgorithm {
    /// SHA-256, the canonical algorithm.
    #[default]
    Sha256,
    /// BLAKE3.
    #[cfg(feature = "hash-blake3")]
    Blake3,
}

impl DigestAlgorithm {
    /// Returns the identifier prefix, e.g. `sha256`.
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
            #[cfg(feature = "hash-blake3")]
            DigestAlgorithm::Blake3 => "blake3",
        }
    }

    /// Looks up an algorithm by its identifier prefix.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sha256" => Some(DigestAlgorithm::Sha256),
            #[cfg(feature = "hash-blake3")]
            "blake3" => Some(DigestAlgorithm::Blake3),
            _ => None,
        }
    }

    /// Creates a fresh incremental hasher.
    pub fn digester(&self) -> Digester {
        match self {
            DigestAlgorithm::Sha256 => Digester::Sha256(Sha256Hasher::new()),
            #[cfg(feature = "hash-blake3")]
            DigestAlgorithm::Blake3 => Digester::Blake3(Blake3Hasher::new()),
        }
    }

    /// Hashes `data` in one shot.
    pub fn digest(&self, data: &[u8]) -> Digest {
        let mut digester = self.digester();
        digester.update(data);
        digester.finalize()
    }
}

/// An incremental hasher for one of the supported algorithms.
///
/// Implements [`io::Write`] so it can sit next to the frame sink when the
/// payload is fanned out.
#[derive(Debug, Clone)]
pub enum Digester {
    /// SHA-256 state.
    Sha256(Sha256Hasher),
    /// BLAKE3 state.
    #[cfg(feature = "hash-blake3")]
    Blake3(Blake3Hasher),
}

impl Digester {
    /// Updates the hasher with more data.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Digester::Sha256(h) => h.update(data),
            #[cfg(feature = "hash-blake3")]
            Digester::Blake3(h) => h.update(data),
        }
    }

    /// Finalizes and returns the tagged digest.
    pub fn finalize(&self) -> Digest {
        match self {
            Digester::Sha256(h) => Digest::new(DigestAlgorithm::Sha256, h.finalize()),
            #[cfg(feature = "hash-blake3")]
            Digester::Blake3(h) => Digest::new(DigestAlgorithm::Blake3, h.finalize()),
        }
    }
}

impl io::Write for Digester {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
