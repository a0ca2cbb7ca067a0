//! zstd frame sink.

use std::io::{self, Write};

use zstd::stream::raw::{Encoder, InBuffer, Operation, OutBuffer};

use super::{CountingWriter, FrameSink};
use crate::error::Error;

/// Size of the compressed output staging buffer (128 KiB).
const OUT_BUFFER_SIZE: usize = 128 * 1024;

/// Writes zstd frames into a byte-counting destination.
///
/// One compression context is created on first use and reset at every frame
/// boundary. Frames are opened lazily on the first non-empty write, so
/// cutting twice in a row never produces an empty frame.
///
/// Any error leaves the sink poisoned: every later call fails.
///
/// # Example
///
/// ```
/// use chunked_zstd::{FrameSink, ZstdFrameSink};
/// use std::io::Write;
///
/// let mut sink = ZstdFrameSink::new(Vec::new(), 3);
/// sink.write_all(b"first frame")?;
/// let offset = sink.cut_frame()?;
/// assert_eq!(sink.cut_frame()?, offset);
/// sink.write_all(b"second frame")?;
///
/// let out = sink.finish()?.into_inner();
/// assert_eq!(zstd::stream::decode_all(&out[..])?, b"first framesecond frame");
/// assert_eq!(zstd::stream::decode_all(&out[offset as usize..])?, b"second frame");
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct ZstdFrameSink<W: Write> {
    dest: CountingWriter<W>,
    encoder: Option<Encoder<'static>>,
    out: Vec<u8>,
    level: i32,
    open: bool,
    poisoned: bool,
}

impl<W: Write> ZstdFrameSink<W> {
    /// Creates a sink writing frames at compression `level` into `dest`.
    pub fn new(dest: W, level: i32) -> Self {
        Self {
            dest: CountingWriter::new(dest),
            encoder: None,
            out: Vec::with_capacity(OUT_BUFFER_SIZE),
            level,
            open: false,
            poisoned: false,
        }
    }

    /// Returns the compression level.
    pub fn level(&self) -> i32 {
        self.level
    }

    /// Closes the open frame, if any, and returns the destination.
    pub fn finish(mut self) -> io::Result<CountingWriter<W>> {
        self.cut_frame()?;
        Ok(self.dest)
    }

    fn check(&self) -> io::Result<()> {
        if self.poisoned {
            return Err(io::Error::other(Error::FrameSinkPoisoned));
        }
        Ok(())
    }

    /// Runs `op` and poisons the sink if it fails.
    fn guarded<T>(&mut self, op: impl FnOnce(&mut Self) -> io::Result<T>) -> io::Result<T> {
        self.check()?;
        self.poisoned = true;
        let value = op(self)?;
        self.poisoned = false;
        Ok(value)
    }

    fn compress(&mut self, buf: &[u8]) -> io::Result<()> {
        let encoder = match &mut self.encoder {
            Some(encoder) => encoder,
            slot @ None => slot.insert(Encoder::new(self.level)?),
        };
        self.open = true;

        let mut input = InBuffer::around(buf);
        while input.pos() < buf.len() {
            self.out.clear();
            {
                let mut output = OutBuffer::around(&mut self.out);
                encoder.run(&mut input, &mut output)?;
            }
            self.dest.write_all(&self.out)?;
        }
        Ok(())
    }

    /// Drains the context with `step` until it reports nothing pending.
    fn drain(
        &mut self,
        mut step: impl FnMut(&mut Encoder<'static>, &mut OutBuffer<'_, Vec<u8>>) -> io::Result<usize>,
    ) -> io::Result<()> {
        let Some(encoder) = self.encoder.as_mut() else {
            return Ok(());
        };
        loop {
            self.out.clear();
            let pending = {
                let mut output = OutBuffer::around(&mut self.out);
                step(encoder, &mut output)?
            };
            self.dest.write_all(&self.out)?;
            if pending == 0 {
                return Ok(());
            }
        }
    }
}

impl<W: Write> Write for ZstdFrameSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.guarded(|sink| sink.compress(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.guarded(|sink| {
            if sink.open {
                sink.drain(|encoder, output| encoder.flush(output))?;
            }
            sink.dest.flush()
        })
    }
}

impl<W: Write> FrameSink for ZstdFrameSink<W> {
    fn cut_frame(&mut self) -> io::Result<u64> {
        self.guarded(|sink| {
            if sink.open {
                sink.drain(|encoder, output| encoder.finish(output, true))?;
                if let Some(encoder) = sink.encoder.as_mut() {
                    // Keeps the level; drops only the finished session
                    encoder.reinit()?;
                }
                sink.dest.flush()?;
                sink.open = false;
            }
            Ok(sink.dest.count())
        })
    }

    fn bytes_written(&self) -> u64 {
        self.dest.count()
    }
}
