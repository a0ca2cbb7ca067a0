//! chunked-zstd
//!
//! Streaming zstd:chunked encoder for tar archives.
//!
//! `chunked-zstd` compresses a tar stream so that every file, and every
//! content-defined chunk of a large file, lands in its own zstd frame. A JSON
//! table of contents appended in skippable frames records where each chunk
//! lives, so consumers can fetch and verify single files or byte ranges
//! without decompressing the whole archive. Plain zstd decoders still see
//! the original tar.
//!
//! The pieces, leaves first:
//!
//! - [`HoleFinder`] - reports long runs of zeros as holes
//! - [`RollingChecksumReader`] - content-defined chunk boundaries
//! - [`write_chunked_stream`] - tar in, chunked zstd plus manifest out
//! - [`ChunkedWriter`] - the same, as a `Write` driven from the caller's thread
//!
//! # Sync
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use std::fs::File;
//! use chunked_zstd::{CompressorConfig, Error, write_chunked_stream};
//!
//! fn main() -> Result<(), Error> {
//!     let input = File::open("layer.tar")?;
//!     let output = File::create("layer.tar.zst")?;
//!     let mut annotations = BTreeMap::new();
//!
//!     write_chunked_stream(output, &mut annotations, input, &CompressorConfig::default())?;
//!     for (key, value) in &annotations {
//!         println!("{}={}", key, value);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Push style
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use std::fs::File;
//! use std::io::{self, Write};
//! use chunked_zstd::compressor;
//!
//! fn main() -> io::Result<()> {
//!     let output = File::create("layer.tar.zst")?;
//!     let mut writer = compressor(output, BTreeMap::new(), Some(3))?;
//!
//!     io::copy(&mut File::open("layer.tar")?, &mut writer)?;
//!     let annotations = writer.close()?;
//!     println!("{:?}", annotations);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

mod archive;
mod chunk;
mod chunker;
mod config;
mod error;
mod frame;
mod manifest;
mod metadata;
mod stream;
mod writer;

mod buffer; // internal (thread-local reuse)
mod cdc; // internal rollsum impl
mod hash; // sha256 + optional blake3

//
// Public surface
//

pub use archive::{BLOCK_SIZE, TarHeader, TarReader};
pub use cdc::{RollSum, WINDOW_SIZE};
pub use chunk::{ChunkHash, ChunkRecord, ChunkType, Digest};
pub use chunker::{Fill, HoleEvent, HoleFinder, RollingChecksumReader};
pub use config::{
    CompressorConfig, DEFAULT_BUFFER_SIZE, DEFAULT_HOLES_THRESHOLD, DEFAULT_LEVEL,
    DEFAULT_PIPE_CAPACITY, DEFAULT_ROLLSUM_BITS,
};
pub use error::{Error, Result};
pub use frame::{
    CountingWriter, FrameSink, SKIPPABLE_FRAME_HEADER_SIZE, SKIPPABLE_FRAME_MAGIC, ZstdFrameSink,
    write_skippable_frame,
};
pub use hash::{DigestAlgorithm, Digester, Sha256Hasher};
pub use manifest::{
    FOOTER_MAGIC, FOOTER_SIZE, Footer, MANIFEST_CHECKSUM_KEY, MANIFEST_POSITION_KEY,
    MANIFEST_TYPE_CRFS, ManifestWriter, TocManifestWriter,
};
pub use metadata::{EntryType, FileMetadata, TOC_VERSION, Toc};
pub use stream::{write_chunked_stream, write_chunked_stream_with};
pub use writer::{ChunkedWriter, compressor, zstd_chunked_writer};

#[cfg(feature = "hash-blake3")]
pub use hash::Blake3Hasher;
