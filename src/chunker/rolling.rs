//! Content-defined chunk reader.
//!
//! [`RollingChecksumReader`] fills caller buffers with payload bytes and
//! reports where chunks end. Boundaries come from two sources:
//!
//! - the rolling checksum matching its split mask (data chunks)
//! - a hole from the [`HoleFinder`], which closes the current chunk and is
//!   then delivered as a chunk of its own (zeros chunk)
//!
//! # Example
//!
//! ```
//! use chunked_zstd::RollingChecksumReader;
//! use std::io::Cursor;
//!
//! let mut payload = b"header".to_vec();
//! payload.extend(vec![0u8; 2048]);
//! payload.extend(b"trailer");
//!
//! let mut reader = RollingChecksumReader::new(Cursor::new(payload), 1024, 16);
//! let mut buf = [0u8; 4096];
//! let mut chunks = Vec::new();
//! let mut start = 0;
//! loop {
//!     let fill = reader.fill(&mut buf)?;
//!     if fill.split || fill.exhausted {
//!         if reader.written_out() > start {
//!             chunks.push((start, reader.written_out(), reader.is_last_chunk_zeros()));
//!         }
//!         start = reader.written_out();
//!     }
//!     if fill.exhausted {
//!         break;
//!     }
//! }
//!
//! assert_eq!(chunks, vec![(0, 6, false), (6, 2054, true), (2054, 2061, false)]);
//! # Ok::<(), std::io::Error>(())
//! ```

use std::io::{self, Read};

use super::holes::{HoleEvent, HoleFinder};
use crate::cdc::RollSum;

/// Result of one [`RollingChecksumReader::fill`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fill {
    /// A chunk ends after the bytes written by this call.
    pub split: bool,
    /// Number of bytes written into the caller's buffer.
    pub written: usize,
    /// The payload is exhausted; set only when `written` is 0.
    pub exhausted: bool,
}

impl Fill {
    const END: Fill = Fill {
        split: false,
        written: 0,
        exhausted: true,
    };

    fn data(split: bool, written: usize) -> Self {
        Self {
            split,
            written,
            exhausted: false,
        }
    }
}

/// Splits a payload into content-defined chunks.
pub struct RollingChecksumReader<R> {
    reader: HoleFinder<R>,
    rollsum: RollSum,
    split_bits: u32,
    pending_hole: u64,
    closed: bool,
    written_out: u64,
    last_chunk_zeros: bool,
}

impl<R: Read> RollingChecksumReader<R> {
    /// Creates a reader over `payload`.
    ///
    /// # Arguments
    ///
    /// * `payload` - The entry payload
    /// * `holes_threshold` - Minimum zero run reported as a hole
    /// * `split_bits` - Number of low checksum bits that must be ones for a split
    pub fn new(payload: R, holes_threshold: u64, split_bits: u32) -> Self {
        Self {
            reader: HoleFinder::new(payload, holes_threshold),
            rollsum: RollSum::new(),
            split_bits,
            pending_hole: 0,
            closed: false,
            written_out: 0,
            last_chunk_zeros: false,
        }
    }

    /// Total payload bytes delivered so far, holes included.
    pub fn written_out(&self) -> u64 {
        self.written_out
    }

    /// Whether the bytes returned by the last `fill` belong to a hole.
    pub fn is_last_chunk_zeros(&self) -> bool {
        self.last_chunk_zeros
    }

    /// Fills `buf` with payload bytes, stopping early at a chunk boundary.
    ///
    /// Returns [`Fill::exhausted`] once no bytes remain; a call that delivers
    /// the final bytes of the payload reports them without the flag.
    pub fn fill(&mut self, buf: &mut [u8]) -> io::Result<Fill> {
        self.last_chunk_zeros = false;

        if self.pending_hole > 0 {
            let n = self.pending_hole.min(buf.len() as u64) as usize;
            buf[..n].fill(0);
            self.pending_hole -= n as u64;
            self.written_out += n as u64;
            self.last_chunk_zeros = true;

            // The hole is its own chunk: close it once fully delivered
            return Ok(Fill::data(self.pending_hole == 0, n));
        }

        if self.closed {
            return Ok(Fill::END);
        }

        for i in 0..buf.len() {
            match self.reader.next_event()? {
                HoleEvent::End => {
                    self.closed = true;
                    if i == 0 {
                        return Ok(Fill::END);
                    }
                    return Ok(Fill::data(false, i));
                }
                HoleEvent::Hole(len) => {
                    for _ in 0..len {
                        self.rollsum.roll(0);
                    }
                    self.pending_hole = len;
                    return Ok(Fill::data(true, i));
                }
                HoleEvent::Byte(b) => {
                    buf[i] = b;
                    self.written_out += 1;
                    self.rollsum.roll(b);
                    if self.rollsum.on_split_with_bits(self.split_bits) {
                        return Ok(Fill::data(true, i + 1));
                    }
                }
            }
        }
        Ok(Fill::data(false, buf.len()))
    }
}
