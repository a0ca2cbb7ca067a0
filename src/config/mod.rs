//! Configuration for the chunked encoder.
//!
//! - [`CompressorConfig`] - Compression level, hole threshold, split mask and buffering
//!
//! # Example
//!
//! ```
//! use chunked_zstd::CompressorConfig;
//!
//! // Explicit values
//! let config = CompressorConfig::new(3, 4096)?;
//!
//! // Builder style on top of the defaults
//! let config = CompressorConfig::default()
//!     .with_level(19)
//!     .with_buffer_size(64 * 1024);
//! config.validate()?;
//!
//! # Ok::<(), chunked_zstd::Error>(())
//! ```

use crate::error::Error;
use crate::hash::DigestAlgorithm;

/// Default zstd compression level.
pub const DEFAULT_LEVEL: i32 = 10;

/// Default minimum length of a zero run reported as a hole (1 KiB).
pub const DEFAULT_HOLES_THRESHOLD: u64 = 1 << 10;

/// Default number of low rolling checksum bits that must be set for a split.
pub const DEFAULT_ROLLSUM_BITS: u32 = 16;

/// Default size of the payload buffer handed to the chunk reader (4 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 4 * 1024;

/// Default number of messages queued in the pipe before `write` blocks.
pub const DEFAULT_PIPE_CAPACITY: usize = 16;

/// Configuration for chunked compression.
///
/// `level` must be in [`zstd::compression_level_range`] (negative levels
/// and 0 included), `holes_threshold` at least 1 and
/// `rollsum_bits` in `1..=31`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompressorConfig {
    level: i32,
    holes_threshold: u64,
    rollsum_bits: u32,
    buffer_size: usize,
    pipe_capacity: usize,
    digest: DigestAlgorithm,
}

impl CompressorConfig {
    /// Creates a new configuration with the given level and hole threshold.
    ///
    /// Returns error if either value is out of range.
    pub fn new(level: i32, holes_threshold: u64) -> Result<Self, Error> {
        let config = Self {
            level,
            holes_threshold,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Sets the zstd compression level.
    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    /// Sets the minimum zero run length treated as a hole.
    pub fn with_holes_threshold(mut self, threshold: u64) -> Self {
        self.holes_threshold = threshold;
        self
    }

    /// Sets the number of rolling checksum bits used by the split predicate.
    pub fn with_rollsum_bits(mut self, bits: u32) -> Self {
        self.rollsum_bits = bits;
        self
    }

    /// Sets the payload buffer size.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Sets how many messages may be queued in the pipe.
    ///
    /// Each message holds at most 64 KiB of input.
    pub fn with_pipe_capacity(mut self, capacity: usize) -> Self {
        self.pipe_capacity = capacity;
        self
    }

    /// Sets the digest algorithm used for entry and chunk checksums.
    pub fn with_digest(mut self, digest: DigestAlgorithm) -> Self {
        self.digest = digest;
        self
    }

    /// Returns the compression level.
    pub fn level(&self) -> i32 {
        self.level
    }

    /// Returns the hole threshold.
    pub fn holes_threshold(&self) -> u64 {
        self.holes_threshold
    }

    /// Returns the rolling checksum split bits.
    pub fn rollsum_bits(&self) -> u32 {
        self.rollsum_bits
    }

    /// Returns the payload buffer size.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Returns the pipe capacity.
    pub fn pipe_capacity(&self) -> usize {
        self.pipe_capacity
    }

    /// Returns the digest algorithm.
    pub fn digest(&self) -> DigestAlgorithm {
        self.digest
    }

    /// Validates the current configuration.
    pub fn validate(&self) -> Result<(), Error> {
        if !zstd::compression_level_range().contains(&self.level) {
            return Err(Error::InvalidConfig {
                message: "compression level is outside the zstd range",
            });
        }

        if self.holes_threshold == 0 {
            return Err(Error::InvalidConfig {
                message: "holes threshold must be non-zero",
            });
        }

        if !(1..=31).contains(&self.rollsum_bits) {
            return Err(Error::InvalidConfig {
                message: "rollsum bits must be between 1 and 31",
            });
        }

        if self.buffer_size == 0 {
            return Err(Error::InvalidConfig {
                message: "buffer size must be non-zero",
            });
        }

        if self.pipe_capacity == 0 {
            return Err(Error::InvalidConfig {
                message: "pipe capacity must be non-zero",
            });
        }

        Ok(())
    }
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
            holes_threshold: DEFAULT_HOLES_THRESHOLD,
            rollsum_bits: DEFAULT_ROLLSUM_BITS,
            buffer_size: DEFAULT_BUFFER_SIZE,
            pipe_capacity: DEFAULT_PIPE_CAPACITY,
            digest: DigestAlgorithm::default(),
        }
    }
}
