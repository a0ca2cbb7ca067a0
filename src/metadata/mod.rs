//! Manifest records.
//!
//! One [`FileMetadata`] describes a tar entry, or one extra chunk of an entry
//! whose payload was split more than once. The records are collected into a
//! [`Toc`] and serialized as JSON.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::archive::TarHeader;
use crate::chunk::{ChunkRecord, ChunkType};
use crate::error::{Error, Result};

/// Version written into every table of contents.
pub const TOC_VERSION: u32 = 1;

/// Kind of a manifest record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EntryType {
    #[default]
    #[serde(rename = "reg")]
    Regular,
    #[serde(rename = "hardlink")]
    HardLink,
    #[serde(rename = "symlink")]
    Symlink,
    #[serde(rename = "char")]
    Char,
    #[serde(rename = "block")]
    Block,
    #[serde(rename = "dir")]
    Dir,
    #[serde(rename = "fifo")]
    Fifo,
    /// Secondary record for a chunk after the first.
    #[serde(rename = "chunk")]
    Chunk,
}

impl EntryType {
    /// Maps a tar type flag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedEntryType`] for anything that is not a
    /// regular file, link, device, directory or FIFO.
    pub fn from_typeflag(flag: u8) -> Result<Self> {
        match flag {
            b'0' | 0 => Ok(EntryType::Regular),
            b'1' => Ok(EntryType::HardLink),
            b'2' => Ok(EntryType::Symlink),
            b'3' => Ok(EntryType::Char),
            b'4' => Ok(EntryType::Block),
            b'5' => Ok(EntryType::Dir),
            b'6' => Ok(EntryType::Fifo),
            other => Err(Error::UnsupportedEntryType(other)),
        }
    }

    /// Returns the manifest spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Regular => "reg",
            EntryType::HardLink => "hardlink",
            EntryType::Symlink => "symlink",
            EntryType::Char => "char",
            EntryType::Block => "block",
            EntryType::Dir => "dir",
            EntryType::Fifo => "fifo",
            EntryType::Chunk => "chunk",
        }
    }
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

fn is_zero_mode(v: &u32) -> bool {
    *v == 0
}

/// One manifest record.
///
/// Empty and zero fields are left out of the JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub link_name: String,
    #[serde(default, skip_serializing_if = "is_zero_mode")]
    pub mode: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub size: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub uid: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub gid: u64,
    #[serde(rename = "modtime", default, skip_serializing_if = "Option::is_none")]
    pub mod_time: Option<DateTime<Utc>>,
    #[serde(rename = "accesstime", default, skip_serializing_if = "Option::is_none")]
    pub access_time: Option<DateTime<Utc>>,
    #[serde(rename = "changetime", default, skip_serializing_if = "Option::is_none")]
    pub change_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub dev_major: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub dev_minor: u64,
    /// Extended attributes, values base64 encoded.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub xattrs: BTreeMap<String, String>,
    /// Digest of the whole payload; empty for entries without payload.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub digest: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub offset: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub end_offset: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub chunk_size: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub chunk_offset: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub chunk_digest: String,
    #[serde(default, skip_serializing_if = "ChunkType::is_data")]
    pub chunk_type: ChunkType,
}

impl FileMetadata {
    /// Builds the primary record for a tar entry, without payload fields.
    pub fn from_header(header: &TarHeader) -> Result<Self> {
        Ok(Self {
            entry_type: EntryType::from_typeflag(header.typeflag)?,
            name: header.name.clone(),
            link_name: header.link_name.clone(),
            mode: header.mode,
            size: header.size,
            uid: header.uid,
            gid: header.gid,
            mod_time: header.mtime,
            access_time: header.atime,
            change_time: header.ctime,
            dev_major: header.dev_major,
            dev_minor: header.dev_minor,
            xattrs: header
                .xattrs
                .iter()
                .map(|(k, v)| (k.clone(), STANDARD.encode(v)))
                .collect(),
            ..Default::default()
        })
    }

    /// Builds the secondary record for a chunk after the first.
    pub fn chunk(name: &str, chunk_offset: u64) -> Self {
        Self {
            entry_type: EntryType::Chunk,
            name: name.to_string(),
            chunk_offset,
            ..Default::default()
        }
    }

    /// Copies chunk bookkeeping onto this record.
    pub fn set_chunk(&mut self, chunk: &ChunkRecord) {
        self.chunk_size = chunk.chunk_size;
        self.offset = chunk.offset;
        self.chunk_digest = chunk.checksum.to_string();
        self.chunk_type = chunk.chunk_type;
    }

    /// Decodes the base64 extended attribute values.
    pub fn decoded_xattrs(&self) -> Result<BTreeMap<String, Vec<u8>>> {
        self.xattrs
            .iter()
            .map(|(k, v)| {
                STANDARD
                    .decode(v)
                    .map(|v| (k.clone(), v))
                    .map_err(|e| Error::InvalidArchive(format!("xattr {}: {}", k, e)))
            })
            .collect()
    }
}

/// Table of contents serialized into the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toc {
    pub version: u32,
    pub entries: Vec<FileMetadata>,
}

impl Toc {
    /// Wraps `entries` with the current version.
    pub fn new(entries: Vec<FileMetadata>) -> Self {
        Self {
            version: TOC_VERSION,
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::DigestAlgorithm;

    fn header() -> TarHeader {
        let mut xattrs = BTreeMap::new();
        xattrs.insert("user.bin".to_string(), vec![0u8, 255, 1]);
        TarHeader {
            typeflag: b'0',
            name: "usr/bin/tool".into(),
            link_name: String::new(),
            mode: 0o755,
            size: 42,
            uid: 0,
            gid: 10,
            mtime: DateTime::from_timestamp(1_600_000_000, 0),
            atime: None,
            ctime: None,
            dev_major: 0,
            dev_minor: 0,
            xattrs,
        }
    }

    #[test]
    fn test_type_mapping() {
        assert_eq!(EntryType::from_typeflag(0).unwrap(), EntryType::Regular);
        // Contiguous files are not accepted as regular
        assert!(matches!(
            EntryType::from_typeflag(b'7'),
            Err(Error::UnsupportedEntryType(b'7'))
        ));
        assert_eq!(EntryType::from_typeflag(b'5').unwrap(), EntryType::Dir);
        assert!(matches!(
            EntryType::from_typeflag(b'g'),
            Err(Error::UnsupportedEntryType(b'g'))
        ));
    }

    #[test]
    fn test_primary_record_json() {
        let meta = FileMetadata::from_header(&header()).unwrap();
        let json = serde_json::to_value(&meta).unwrap();

        assert_eq!(json["type"], "reg");
        assert_eq!(json["name"], "usr/bin/tool");
        assert_eq!(json["mode"], 0o755);
        assert_eq!(json["size"], 42);
        assert_eq!(json["gid"], 10);
        assert_eq!(json["modtime"], "2020-09-13T12:26:40Z");
        assert_eq!(json["xattrs"]["user.bin"], "AP8B");
        assert!(json.get("uid").is_none());
        assert!(json.get("linkName").is_none());
        assert!(json.get("digest").is_none());
        assert!(json.get("chunkType").is_none());
        assert!(json.get("accesstime").is_none());

        assert_eq!(meta.decoded_xattrs().unwrap()["user.bin"], vec![0u8, 255, 1]);
    }

    #[test]
    fn test_chunk_record_json() {
        let mut meta = FileMetadata::chunk("big.img", 8192);
        meta.set_chunk(&ChunkRecord {
            chunk_offset: 8192,
            offset: 700,
            checksum: DigestAlgorithm::Sha256.digest(b""),
            chunk_size: 4096,
            chunk_type: ChunkType::Zeros,
        });
        let json = serde_json::to_value(&meta).unwrap();

        assert_eq!(json["type"], "chunk");
        assert_eq!(json["chunkOffset"], 8192);
        assert_eq!(json["chunkSize"], 4096);
        assert_eq!(json["offset"], 700);
        assert_eq!(json["chunkType"], "zeros");
        assert!(json["chunkDigest"].as_str().unwrap().starts_with("sha256:"));
    }

    #[test]
    fn test_toc_parses_back() {
        let toc = Toc::new(vec![
            FileMetadata::from_header(&header()).unwrap(),
            FileMetadata::chunk("usr/bin/tool", 10),
        ]);
        let text = serde_json::to_string(&toc).unwrap();
        assert!(text.starts_with("{\"version\":1,"));
        let parsed: Toc = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, toc);
    }
}
