//! Chunk types.
//!
//! - [`ChunkRecord`] - Offsets, size, digest and kind of one payload chunk
//! - [`ChunkType`] - Data or zeros
//! - [`ChunkHash`] - 32-byte cryptographic hash
//! - [`Digest`] - Hash tagged with its algorithm

mod data;
mod hash;

pub use data::{ChunkRecord, ChunkType};
pub use hash::{ChunkHash, Digest};
