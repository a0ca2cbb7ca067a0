//! PAX extended header records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Prefix of extended attribute records written by star/GNU tar.
const XATTR_PREFIX: &str = "SCHILY.xattr.";

/// Fields a PAX header can override on the entry that follows it.
#[derive(Debug, Default)]
pub(crate) struct PaxOverrides {
    pub(crate) path: Option<String>,
    pub(crate) link_path: Option<String>,
    pub(crate) size: Option<u64>,
    pub(crate) uid: Option<u64>,
    pub(crate) gid: Option<u64>,
    pub(crate) mtime: Option<DateTime<Utc>>,
    pub(crate) atime: Option<DateTime<Utc>>,
    pub(crate) ctime: Option<DateTime<Utc>>,
    pub(crate) xattrs: BTreeMap<String, Vec<u8>>,
}

impl PaxOverrides {
    /// Parses `"<len> <key>=<value>\n"` records and merges them in.
    pub(crate) fn merge(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            // Trailing NUL padding ends the record list
            if data[0] == 0 {
                break;
            }
            let space = data
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| invalid("missing record length"))?;
            let len: usize = std::str::from_utf8(&data[..space])
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| invalid("bad record length"))?;
            if len <= space + 1 || len > data.len() || data[len - 1] != b'\n' {
                return Err(invalid("malformed record"));
            }

            let record = &data[space + 1..len - 1];
            let eq = record
                .iter()
                .position(|&b| b == b'=')
                .ok_or_else(|| invalid("record without '='"))?;
            let key = std::str::from_utf8(&record[..eq]).map_err(|_| invalid("non-utf8 key"))?;
            self.apply(key, &record[eq + 1..])?;

            data = &data[len..];
        }
        Ok(())
    }

    fn apply(&mut self, key: &str, value: &[u8]) -> Result<()> {
        let text = || String::from_utf8_lossy(value).into_owned();
        match key {
            "path" => self.path = Some(text()),
            "linkpath" => self.link_path = Some(text()),
            "size" => self.size = Some(parse_decimal(value)?),
            "uid" => self.uid = Some(parse_decimal(value)?),
            "gid" => self.gid = Some(parse_decimal(value)?),
            "mtime" => self.mtime = Some(parse_time(value)?),
            "atime" => self.atime = Some(parse_time(value)?),
            "ctime" => self.ctime = Some(parse_time(value)?),
            _ => {
                if let Some(name) = key.strip_prefix(XATTR_PREFIX) {
                    self.xattrs.insert(name.to_string(), value.to_vec());
                }
            }
        }
        Ok(())
    }
}

fn invalid(what: &str) -> Error {
    Error::InvalidArchive(format!("pax header: {}", what))
}

fn parse_decimal(value: &[u8]) -> Result<u64> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| invalid("bad numeric value"))
}

/// Parses `seconds[.fraction]`, with an optional leading `-`.
fn parse_time(value: &[u8]) -> Result<DateTime<Utc>> {
    let s = std::str::from_utf8(value).map_err(|_| invalid("bad timestamp"))?;
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (secs, frac) = s.split_once('.').unwrap_or((s, ""));
    let secs: i64 = secs.parse().map_err(|_| invalid("bad timestamp"))?;

    // Keep nanosecond precision, drop anything finer
    let mut nanos: u32 = 0;
    for (i, c) in frac.chars().take(9).enumerate() {
        let digit = c.to_digit(10).ok_or_else(|| invalid("bad timestamp"))?;
        nanos += digit * 10u32.pow(8 - i as u32);
    }

    let (secs, nanos) = if negative && nanos > 0 {
        (-secs - 1, 1_000_000_000 - nanos)
    } else if negative {
        (-secs, 0)
    } else {
        (secs, nanos)
    };
    DateTime::from_timestamp(secs, nanos).ok_or_else(|| invalid("timestamp out of range"))
}
