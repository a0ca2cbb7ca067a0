//! Sequential tar reader that keeps every non-payload byte.

use std::io::{self, Read, Write};

use chrono::{DateTime, Utc};

use super::TarHeader;
use super::pax::PaxOverrides;
use crate::error::{Error, Result};

/// Size of a tar block.
pub const BLOCK_SIZE: usize = 512;

/// Upper bound for PAX and GNU long name/link payloads (1 MiB).
const MAX_EXTENSION_SIZE: u64 = 1 << 20;

/// Reads a tar stream entry by entry with raw accounting.
///
/// Every byte that is not entry payload (header blocks, PAX and GNU
/// extension headers, payload padding, the end-of-archive marker) is
/// collected and exposed through [`raw_bytes`](TarReader::raw_bytes).
/// Bytes after the end marker are streamed out by
/// [`copy_trailing`](TarReader::copy_trailing). Raw bytes and payloads
/// interleaved in order, then the trailing bytes, reproduce the input
/// exactly.
///
/// The reader itself implements [`Read`] over the current entry's payload.
///
/// # Example
///
/// ```
/// use chunked_zstd::TarReader;
/// use std::io::Read;
///
/// let mut builder = tar::Builder::new(Vec::new());
/// let mut header = tar::Header::new_ustar();
/// header.set_path("hello.txt")?;
/// header.set_size(5);
/// header.set_mode(0o644);
/// header.set_cksum();
/// builder.append(&header, &b"hello"[..])?;
/// let archive = builder.into_inner()?;
///
/// let mut reader = TarReader::new(&archive[..]);
/// let entry = reader.next_entry()?.expect("one entry");
/// assert_eq!(entry.name, "hello.txt");
/// assert_eq!(reader.raw_bytes().len(), 512);
///
/// let mut payload = String::new();
/// reader.read_to_string(&mut payload)?;
/// assert_eq!(payload, "hello");
///
/// assert!(reader.next_entry()?.is_none());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct TarReader<R> {
    inner: R,
    raw: Vec<u8>,
    remaining: u64,
    padding: u64,
    finished: bool,
}

impl<R: Read> TarReader<R> {
    /// Creates a reader over a tar stream.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            raw: Vec::with_capacity(BLOCK_SIZE),
            remaining: 0,
            padding: 0,
            finished: false,
        }
    }

    /// Raw bytes consumed by the last [`next_entry`](TarReader::next_entry) call.
    ///
    /// After `next_entry` returns `None` these are the end-of-archive blocks.
    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Copies whatever follows the end-of-archive marker into `dest`.
    ///
    /// Does nothing until [`next_entry`](TarReader::next_entry) has returned
    /// `None`. Returns the number of bytes copied.
    pub fn copy_trailing<W: Write + ?Sized>(&mut self, dest: &mut W) -> Result<u64> {
        if !self.finished {
            return Ok(0);
        }
        Ok(io::copy(&mut self.inner, dest)?)
    }

    /// Payload bytes of the current entry not read yet.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Advances to the next entry.
    ///
    /// Unread payload of the current entry is discarded. Returns `None` at
    /// the end-of-archive marker or at a clean end of stream.
    pub fn next_entry(&mut self) -> Result<Option<TarHeader>> {
        self.raw.clear();
        if self.finished {
            return Ok(None);
        }

        if self.remaining > 0 {
            let skipped = io::copy(&mut (&mut self.inner).take(self.remaining), &mut io::sink())?;
            if skipped < self.remaining {
                return Err(truncated());
            }
            self.remaining = 0;
        }
        let padding = std::mem::take(&mut self.padding);
        self.read_raw(padding)?;

        let mut pax = PaxOverrides::default();
        let mut long_name = None;
        let mut long_link = None;

        loop {
            let start = self.raw.len();
            if !self.read_block()? {
                self.finished = true;
                return Ok(None);
            }

            if is_zero_block(&self.raw[start..]) {
                self.finished = true;
                // The end marker is two zero blocks; a lone zero block
                // followed by a header is corrupt
                let second = self.raw.len();
                if self.read_block()? && !is_zero_block(&self.raw[second..]) {
                    return Err(Error::InvalidArchive(
                        "header follows a single zero block".into(),
                    ));
                }
                return Ok(None);
            }

            let block = &self.raw[start..];

            let header = tar::Header::from_byte_slice(block).clone();
            verify_checksum(&header)?;
            let size = numeric(&header.as_old().size)?;

            match header.as_old().linkflag[0] {
                b'x' => {
                    let data = self.read_extension(size)?;
                    pax.merge(&data)?;
                }
                b'L' => long_name = Some(c_string(&self.read_extension(size)?)),
                b'K' => long_link = Some(c_string(&self.read_extension(size)?)),
                _ => {
                    let entry = build_header(&header, size, pax, long_name, long_link)?;
                    self.remaining = if entry.is_header_only() { 0 } else { entry.size };
                    self.padding = padding_for(self.remaining);
                    return Ok(Some(entry));
                }
            }
        }
    }

    /// Reads one block into `raw`; false on a clean end of stream.
    fn read_block(&mut self) -> Result<bool> {
        let start = self.raw.len();
        self.raw.resize(start + BLOCK_SIZE, 0);
        let mut filled = 0;
        while filled < BLOCK_SIZE {
            match self.inner.read(&mut self.raw[start + filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if filled == 0 {
            self.raw.truncate(start);
            return Ok(false);
        }
        if filled < BLOCK_SIZE {
            return Err(truncated());
        }
        Ok(true)
    }

    fn read_raw(&mut self, len: u64) -> Result<()> {
        let start = self.raw.len();
        self.raw.resize(start + len as usize, 0);
        self.inner.read_exact(&mut self.raw[start..]).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                truncated()
            } else {
                e.into()
            }
        })
    }

    /// Reads an extension header payload plus padding, returning the payload.
    fn read_extension(&mut self, size: u64) -> Result<Vec<u8>> {
        if size > MAX_EXTENSION_SIZE {
            return Err(Error::InvalidArchive(format!(
                "extension header of {} bytes exceeds limit",
                size
            )));
        }
        let start = self.raw.len();
        self.read_raw(size + padding_for(size))?;
        Ok(self.raw[start..start + size as usize].to_vec())
    }
}

impl<R: Read> Read for TarReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let max = self.remaining.min(buf.len() as u64) as usize;
        let n = self.inner.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "archive truncated inside entry payload",
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

fn build_header(
    header: &tar::Header,
    size: u64,
    pax: PaxOverrides,
    long_name: Option<String>,
    long_link: Option<String>,
) -> Result<TarHeader> {
    let old = header.as_old();

    let name = pax
        .path
        .or(long_name)
        .unwrap_or_else(|| String::from_utf8_lossy(&header.path_bytes()).into_owned());
    let link_name = pax.link_path.or(long_link).unwrap_or_else(|| {
        header
            .link_name_bytes()
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default()
    });

    let mode = u32::try_from(numeric(&old.mode)?)
        .map_err(|_| Error::InvalidArchive("mode out of range".into()))?;

    let mtime = match pax.mtime {
        Some(t) => Some(t),
        None => Some(timestamp(numeric(&old.mtime)?)?),
    };

    let (mut atime, mut ctime) = (None, None);
    let (mut dev_major, mut dev_minor) = (0, 0);
    if let Some(gnu) = header.as_gnu() {
        atime = optional_timestamp(numeric(&gnu.atime)?)?;
        ctime = optional_timestamp(numeric(&gnu.ctime)?)?;
        dev_major = numeric(&gnu.dev_major)?;
        dev_minor = numeric(&gnu.dev_minor)?;
    } else if let Some(ustar) = header.as_ustar() {
        dev_major = numeric(&ustar.dev_major)?;
        dev_minor = numeric(&ustar.dev_minor)?;
    }

    Ok(TarHeader {
        typeflag: old.linkflag[0],
        name,
        link_name,
        mode,
        size: pax.size.unwrap_or(size),
        uid: pax.uid.map_or_else(|| numeric(&old.uid), Ok)?,
        gid: pax.gid.map_or_else(|| numeric(&old.gid), Ok)?,
        mtime,
        atime: pax.atime.or(atime),
        ctime: pax.ctime.or(ctime),
        dev_major,
        dev_minor,
        xattrs: pax.xattrs,
    })
}

/// Parses a numeric header field: octal text, or GNU base-256 when the
/// high bit of the first byte is set. Empty fields read as zero.
fn numeric(field: &[u8]) -> Result<u64> {
    match field.first() {
        Some(&first) if first & 0x80 != 0 => {
            if first == 0xff {
                return Err(Error::InvalidArchive("negative numeric field".into()));
            }
            let mut value = u64::from(first & 0x7f);
            for &b in &field[1..] {
                if value >> 56 != 0 {
                    return Err(Error::InvalidArchive("numeric field overflows".into()));
                }
                value = (value << 8) | u64::from(b);
            }
            Ok(value)
        }
        _ => {
            let text = trim(field);
            if text.is_empty() {
                return Ok(0);
            }
            std::str::from_utf8(text)
                .ok()
                .and_then(|s| u64::from_str_radix(s, 8).ok())
                .ok_or_else(|| {
                    Error::InvalidArchive(format!(
                        "numeric field is not octal: {:?}",
                        String::from_utf8_lossy(text)
                    ))
                })
        }
    }
}

fn trim(field: &[u8]) -> &[u8] {
    let is_pad = |b: &u8| *b == b' ' || *b == 0;
    let start = field.iter().position(|b| !is_pad(b)).unwrap_or(field.len());
    let end = field.iter().rposition(|b| !is_pad(b)).map_or(start, |i| i + 1);
    &field[start..end]
}

fn verify_checksum(header: &tar::Header) -> Result<()> {
    let expected = numeric(&header.as_old().cksum)?;
    let bytes = header.as_bytes();
    let (mut unsigned, mut signed) = (0u64, 0i64);
    for (i, &b) in bytes.iter().enumerate() {
        let b = if (148..156).contains(&i) { b' ' } else { b };
        unsigned += u64::from(b);
        signed += i64::from(b as i8);
    }
    if expected == unsigned || expected as i64 == signed {
        Ok(())
    } else {
        Err(Error::InvalidArchive(format!(
            "header checksum mismatch: expected {}, computed {}",
            expected, unsigned
        )))
    }
}

fn timestamp(secs: u64) -> Result<DateTime<Utc>> {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .ok_or_else(|| Error::InvalidArchive("timestamp out of range".into()))
}

fn optional_timestamp(secs: u64) -> Result<Option<DateTime<Utc>>> {
    if secs == 0 {
        return Ok(None);
    }
    timestamp(secs).map(Some)
}

fn c_string(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).into_owned()
}

fn is_zero_block(block: &[u8]) -> bool {
    block.iter().all(|&b| b == 0)
}

fn padding_for(size: u64) -> u64 {
    let block = BLOCK_SIZE as u64;
    (block - size % block) % block
}

fn truncated() -> Error {
    Error::InvalidArchive("unexpected end of archive".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regular(path: &str, data: &[u8]) -> (tar::Header, Vec<u8>) {
        let mut header = tar::Header::new_gnu();
        header.set_path(path).unwrap();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_uid(1000);
        header.set_gid(100);
        header.set_mtime(1_700_000_000);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        (header, data.to_vec())
    }

    fn build(entries: &[(tar::Header, Vec<u8>)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (header, data) in entries {
            builder.append(header, &data[..]).unwrap();
        }
        builder.into_inner().unwrap()
    }

    /// Reassembles the archive from raw bytes and payloads.
    fn reassemble(archive: &[u8]) -> (Vec<u8>, Vec<TarHeader>) {
        let mut reader = TarReader::new(archive);
        let mut out = Vec::new();
        let mut headers = Vec::new();
        while let Some(header) = reader.next_entry().unwrap() {
            out.extend_from_slice(reader.raw_bytes());
            reader.read_to_end(&mut out).unwrap();
            headers.push(header);
        }
        out.extend_from_slice(reader.raw_bytes());
        reader.copy_trailing(&mut out).unwrap();
        (out, headers)
    }

    #[test]
    fn test_reassembles_exactly() {
        let archive = build(&[
            regular("a.txt", b"hello"),
            regular("b.bin", &[7u8; 1500]),
            regular("empty", b""),
        ]);
        let (out, headers) = reassemble(&archive);
        assert_eq!(out, archive);
        assert_eq!(headers.len(), 3);
        assert_eq!(headers[0].name, "a.txt");
        assert_eq!(headers[1].size, 1500);
        assert_eq!(headers[0].uid, 1000);
        assert_eq!(headers[0].gid, 100);
        assert_eq!(headers[0].mode, 0o644);
        assert_eq!(headers[0].mtime.unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_long_names_use_extension_headers() {
        let long = format!("{}/file.txt", "d".repeat(150));
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(3);
        header.set_mode(0o600);
        builder.append_data(&mut header, &long, &b"abc"[..]).unwrap();
        let archive = builder.into_inner().unwrap();

        let (out, headers) = reassemble(&archive);
        assert_eq!(out, archive);
        assert_eq!(headers[0].name, long);
    }

    #[test]
    fn test_pax_xattrs() {
        let mut builder = tar::Builder::new(Vec::new());
        builder
            .append_pax_extensions([("SCHILY.xattr.user.test", &b"\x00\x01bin"[..])])
            .unwrap();
        let (header, data) = regular("x", b"payload");
        builder.append(&header, &data[..]).unwrap();
        let archive = builder.into_inner().unwrap();

        let (out, headers) = reassemble(&archive);
        assert_eq!(out, archive);
        assert_eq!(
            headers[0].xattrs.get("user.test").map(Vec::as_slice),
            Some(&b"\x00\x01bin"[..])
        );
    }

    #[test]
    fn test_header_only_types_have_no_payload() {
        let mut header = tar::Header::new_ustar();
        header.set_path("dir/").unwrap();
        header.set_entry_type(tar::EntryType::Directory);
        header.set_mode(0o755);
        header.set_size(0);
        header.set_cksum();
        let archive = build(&[(header, Vec::new()), regular("dir/f", b"1")]);

        let mut reader = TarReader::new(&archive[..]);
        let dir = reader.next_entry().unwrap().unwrap();
        assert!(dir.is_header_only());
        assert_eq!(reader.remaining(), 0);
        let file = reader.next_entry().unwrap().unwrap();
        assert_eq!(file.name, "dir/f");
        assert_eq!(reader.remaining(), 1);
    }

    #[test]
    fn test_unread_payload_is_skipped() {
        let archive = build(&[regular("a", &[1u8; 700]), regular("b", b"x")]);
        let mut reader = TarReader::new(&archive[..]);
        reader.next_entry().unwrap().unwrap();
        let b = reader.next_entry().unwrap().unwrap();
        assert_eq!(b.name, "b");
    }

    #[test]
    fn test_bad_checksum() {
        let mut archive = build(&[regular("a", b"x")]);
        archive[0] ^= 0x01;
        let mut reader = TarReader::new(&archive[..]);
        assert!(matches!(reader.next_entry(), Err(Error::InvalidArchive(_))));
    }

    #[test]
    fn test_truncated_header() {
        let archive = build(&[regular("a", b"x")]);
        let mut reader = TarReader::new(&archive[..100]);
        assert!(matches!(reader.next_entry(), Err(Error::InvalidArchive(_))));
    }

    #[test]
    fn test_clean_end_without_marker() {
        let archive = build(&[regular("a", b"x")]);
        // Header plus one padded payload block, no end-of-archive blocks
        let cut = &archive[..1024];
        let (out, headers) = reassemble(cut);
        assert_eq!(out, cut);
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_header_after_single_zero_block_fails() {
        let mut archive = build(&[regular("a", &[3u8; 1024])]);
        // Keep the entry, then one zero block, then a whole second archive
        archive.truncate(512 + 1024);
        archive.extend([0u8; BLOCK_SIZE]);
        archive.extend(build(&[regular("b", b"hidden")]));

        let mut reader = TarReader::new(&archive[..]);
        assert_eq!(reader.next_entry().unwrap().unwrap().name, "a");
        assert!(matches!(reader.next_entry(), Err(Error::InvalidArchive(_))));
    }

    #[test]
    fn test_single_zero_block_at_end() {
        let mut archive = build(&[regular("a", b"x")]);
        archive.truncate(1024);
        archive.extend([0u8; BLOCK_SIZE]);
        let (out, headers) = reassemble(&archive);
        assert_eq!(out, archive);
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_trailing_bytes_are_streamed() {
        let mut archive = build(&[regular("a", b"x")]);
        archive.extend(vec![0xabu8; 100_000]);

        let mut reader = TarReader::new(&archive[..]);
        let mut out = Vec::new();
        assert_eq!(reader.copy_trailing(&mut out).unwrap(), 0);
        while reader.next_entry().unwrap().is_some() {}
        // Payload padding, then the two end blocks
        assert_eq!(reader.raw_bytes().len(), 511 + 2 * BLOCK_SIZE);
        assert_eq!(reader.copy_trailing(&mut out).unwrap(), 100_000);
        assert_eq!(out, vec![0xabu8; 100_000]);
    }

    #[test]
    fn test_numeric_fields() {
        assert_eq!(numeric(b"0000644\0").unwrap(), 0o644);
        assert_eq!(numeric(b"  755 \0").unwrap(), 0o755);
        assert_eq!(numeric(b"\0\0\0\0").unwrap(), 0);
        assert_eq!(numeric(&[0x80, 0, 0, 0, 0, 0, 1, 0]).unwrap(), 256);
        assert!(numeric(b"89").is_err());
    }
}
