//! The chunk record - one content-defined split of an entry's payload.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Digest;

/// Kind of content a chunk holds.
///
/// Serialized with its manifest spelling; data chunks are the empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChunkType {
    /// Literal bytes bounded by the rolling checksum.
    #[default]
    #[serde(rename = "")]
    Data,
    /// A run of zero bytes (a hole in a sparse file).
    #[serde(rename = "zeros")]
    Zeros,
}

impl ChunkType {
    /// Returns the manifest spelling, empty for data chunks.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Data => "",
            ChunkType::Zeros => "zeros",
        }
    }

    /// Returns true for data chunks.
    pub fn is_data(&self) -> bool {
        matches!(self, ChunkType::Data)
    }
}

/// Bookkeeping for one chunk of an entry's payload.
///
/// # Example
///
/// ```
/// use chunked_zstd::{ChunkRecord, ChunkType, DigestAlgorithm};
///
/// let record = ChunkRecord {
///     chunk_offset: 0,
///     offset: 512,
///     checksum: DigestAlgorithm::Sha256.digest(b"hello"),
///     chunk_size: 5,
///     chunk_type: ChunkType::Data,
/// };
///
/// assert_eq!(record.range(), 0..5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRecord {
    /// Offset of the chunk within the uncompressed payload.
    pub chunk_offset: u64,

    /// Offset of the chunk's frame within the compressed stream.
    pub offset: u64,

    /// Digest of the chunk's payload bytes.
    pub checksum: Digest,

    /// Length of the chunk in payload bytes.
    pub chunk_size: u64,

    /// Whether the chunk is literal data or a hole.
    pub chunk_type: ChunkType,
}

impl ChunkRecord {
    /// Returns the end offset within the payload (exclusive).
    pub fn end(&self) -> u64 {
        self.chunk_offset + self.chunk_size
    }

    /// Returns the payload range covered by this chunk.
    pub fn range(&self) -> std::ops::Range<u64> {
        self.chunk_offset..self.end()
    }
}

impl fmt::Display for ChunkRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Chunk({} bytes @ {}, frame @ {}",
            self.chunk_size, self.chunk_offset, self.offset
        )?;
        if self.chunk_type == ChunkType::Zeros {
            write!(f, ", zeros")?;
        }
        write!(f, ", digest={})", self.checksum)
    }
}
