//! Tar input with raw byte accounting.
//!
//! [`TarReader`] splits a tar stream into entry payloads and everything
//! else. The orchestrator compresses both, but only payloads are chunked.

mod pax;
mod reader;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

pub use reader::{BLOCK_SIZE, TarReader};

/// Header of one tar entry, with PAX and GNU extensions applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarHeader {
    /// Raw type flag byte.
    pub typeflag: u8,
    pub name: String,
    pub link_name: String,
    pub mode: u32,
    /// Logical size from the header. Header-only types carry no payload
    /// regardless of this value.
    pub size: u64,
    pub uid: u64,
    pub gid: u64,
    pub mtime: Option<DateTime<Utc>>,
    pub atime: Option<DateTime<Utc>>,
    pub ctime: Option<DateTime<Utc>>,
    pub dev_major: u64,
    pub dev_minor: u64,
    pub xattrs: BTreeMap<String, Vec<u8>>,
}

impl TarHeader {
    /// Returns the entry type as understood by the `tar` crate.
    pub fn entry_type(&self) -> tar::EntryType {
        tar::EntryType::new(self.typeflag)
    }

    /// True for link, symlink, device, directory and FIFO entries.
    pub fn is_header_only(&self) -> bool {
        matches!(self.typeflag, b'1'..=b'6')
    }
}
