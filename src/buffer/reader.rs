//! Buffered single-byte reader with one byte of push-back.

use std::io::{self, Read};

use super::Buffer;

/// Size of the read-ahead window.
const READ_AHEAD: usize = 4 * 1024;

/// Reads a byte stream one byte at a time.
///
/// The most recently read byte can be pushed back with [`unread_byte`],
/// which is what the hole finder needs to hand a non-zero byte back to the
/// literal path after it ends a zero run.
///
/// [`unread_byte`]: ByteReader::unread_byte
pub(crate) struct ByteReader<R> {
    inner: R,
    buf: Buffer,
    pos: usize,
    filled: usize,
}

impl<R: Read> ByteReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Buffer::take(READ_AHEAD),
            pos: 0,
            filled: 0,
        }
    }

    /// Returns the next byte, or `None` at end of stream.
    pub(crate) fn read_byte(&mut self) -> io::Result<Option<u8>> {
        if self.pos == self.filled {
            let n = loop {
                match self.inner.read(&mut self.buf) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            };
            if n == 0 {
                return Ok(None);
            }
            self.pos = 0;
            self.filled = n;
        }

        let byte = self.buf[self.pos];
        self.pos += 1;
        Ok(Some(byte))
    }

    /// Pushes back the byte returned by the last successful `read_byte`.
    ///
    /// Only valid directly after `read_byte` returned `Some`.
    pub(crate) fn unread_byte(&mut self) {
        debug_assert!(self.pos > 0, "unread_byte without a preceding read");
        self.pos -= 1;
    }
}
