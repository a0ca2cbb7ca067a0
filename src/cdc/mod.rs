//! Content-Defined Chunking (CDC) primitives.
//!
//! This module contains the rolling checksum that identifies chunk boundaries
//! based on content patterns rather than fixed sizes.
//!
//! - [`RollSum`] - bup-style rolling checksum

mod rollsum;

pub use rollsum::{RollSum, WINDOW_SIZE};
