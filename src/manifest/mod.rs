//! Manifest trailer.
//!
//! The manifest closes the stream as two skippable frames:
//!
//! ```text
//! [frame: compressed TOC JSON][frame: footer]
//! footer = manifest offset | compressed len | uncompressed len | type | magic
//! ```
//!
//! All footer fields are little-endian `u64`, the magic is 8 bytes.

use std::collections::BTreeMap;
use std::io::Write;

use tracing::debug;

use crate::error::{Error, Result};
use crate::frame::{SKIPPABLE_FRAME_HEADER_SIZE, write_skippable_frame};
use crate::hash::DigestAlgorithm;
use crate::metadata::{FileMetadata, Toc};

/// Annotation holding the digest of the compressed manifest.
pub const MANIFEST_CHECKSUM_KEY: &str = "io.github.containers.zstd-chunked.manifest-checksum";

/// Annotation holding `offset:compressed:uncompressed:type`.
pub const MANIFEST_POSITION_KEY: &str = "io.github.containers.zstd-chunked.manifest-position";

/// Manifest type tag for the CRFS-style table of contents.
pub const MANIFEST_TYPE_CRFS: u64 = 1;

/// Magic closing the footer.
pub const FOOTER_MAGIC: [u8; 8] = *b"GnUlInUx";

/// Size of the footer frame payload.
pub const FOOTER_SIZE: usize = 40;

/// Writes the manifest trailer after the compressed entries.
pub trait ManifestWriter {
    /// Appends the manifest to `dest`.
    ///
    /// `offset` is the number of bytes already in the stream. Implementations
    /// record where the manifest landed in `annotations`.
    fn write_manifest(
        &self,
        dest: &mut dyn Write,
        annotations: &mut BTreeMap<String, String>,
        offset: u64,
        entries: Vec<FileMetadata>,
        level: i32,
    ) -> Result<()>;
}

/// Location of the manifest inside the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    /// Offset of the compressed manifest bytes, past the frame header.
    pub manifest_offset: u64,
    pub compressed_len: u64,
    pub uncompressed_len: u64,
    pub manifest_type: u64,
}

impl Footer {
    /// Encodes the footer frame payload.
    pub fn to_bytes(&self) -> [u8; FOOTER_SIZE] {
        let mut out = [0u8; FOOTER_SIZE];
        out[0..8].copy_from_slice(&self.manifest_offset.to_le_bytes());
        out[8..16].copy_from_slice(&self.compressed_len.to_le_bytes());
        out[16..24].copy_from_slice(&self.uncompressed_len.to_le_bytes());
        out[24..32].copy_from_slice(&self.manifest_type.to_le_bytes());
        out[32..40].copy_from_slice(&FOOTER_MAGIC);
        out
    }

    /// Decodes a footer frame payload; `None` if the size or magic is wrong.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() != FOOTER_SIZE || data[32..40] != FOOTER_MAGIC {
            return None;
        }
        let field = |i: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&data[i * 8..i * 8 + 8]);
            u64::from_le_bytes(bytes)
        };
        Some(Self {
            manifest_offset: field(0),
            compressed_len: field(1),
            uncompressed_len: field(2),
            manifest_type: field(3),
        })
    }

    /// Formats the position annotation value.
    pub fn position(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.manifest_offset, self.compressed_len, self.uncompressed_len, self.manifest_type
        )
    }
}

/// Writes the entries as a zstd-compressed JSON table of contents.
#[derive(Debug, Clone, Copy, Default)]
pub struct TocManifestWriter {
    digest: DigestAlgorithm,
}

impl TocManifestWriter {
    /// Creates a writer that checksums the manifest with `digest`.
    pub fn new(digest: DigestAlgorithm) -> Self {
        Self { digest }
    }
}

impl ManifestWriter for TocManifestWriter {
    fn write_manifest(
        &self,
        dest: &mut dyn Write,
        annotations: &mut BTreeMap<String, String>,
        offset: u64,
        entries: Vec<FileMetadata>,
        level: i32,
    ) -> Result<()> {
        let manifest = serde_json::to_vec(&Toc::new(entries)).map_err(Error::Manifest)?;
        let compressed = zstd::stream::encode_all(&manifest[..], level)?;

        let footer = Footer {
            manifest_offset: offset + SKIPPABLE_FRAME_HEADER_SIZE,
            compressed_len: compressed.len() as u64,
            uncompressed_len: manifest.len() as u64,
            manifest_type: MANIFEST_TYPE_CRFS,
        };
        debug!(position = %footer.position(), "writing manifest");

        annotations.insert(
            MANIFEST_CHECKSUM_KEY.to_string(),
            self.digest.digest(&compressed).to_string(),
        );
        annotations.insert(MANIFEST_POSITION_KEY.to_string(), footer.position());

        write_skippable_frame(dest, &compressed)?;
        write_skippable_frame(dest, &footer.to_bytes())?;
        Ok(())
    }
}
