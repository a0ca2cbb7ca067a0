//! In-memory pipe between the caller and the encoder thread.

use std::io::{self, Read, Write};

use bytes::{Buf, Bytes};
use crossbeam_channel::{Receiver, Sender, bounded};

/// Largest message carried by the pipe (64 KiB).
///
/// Queued input is bounded by `capacity * MAX_MESSAGE_SIZE` bytes.
pub(crate) const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Creates a pipe holding at most `capacity` pending messages.
pub(crate) fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = bounded(capacity);
    (
        PipeWriter { tx: Some(tx) },
        PipeReader {
            rx,
            current: Bytes::new(),
        },
    )
}

/// Write end. Blocks once `capacity` messages are queued.
///
/// A single `write` accepts at most [`MAX_MESSAGE_SIZE`] bytes.
#[derive(Debug)]
pub(crate) struct PipeWriter {
    tx: Option<Sender<Bytes>>,
}

impl PipeWriter {
    /// Closes the write end; the reader sees end of stream after draining.
    pub(crate) fn close(&mut self) {
        self.tx = None;
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))?;
        let n = buf.len().min(MAX_MESSAGE_SIZE);
        tx.send(Bytes::copy_from_slice(&buf[..n]))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader gone"))?;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Read end. Returns end of stream once the writer is closed and drained.
#[derive(Debug)]
pub(crate) struct PipeReader {
    rx: Receiver<Bytes>,
    current: Bytes,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.current.is_empty() {
            match self.rx.recv() {
                Ok(chunk) => self.current = chunk,
                Err(_) => return Ok(0),
            }
        }
        let n = self.current.len().min(buf.len());
        buf[..n].copy_from_slice(&self.current[..n]);
        self.current.advance(n);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_bytes_arrive_in_order() {
        let (mut writer, mut reader) = pipe(2);
        let producer = thread::spawn(move || {
            for i in 0..100u8 {
                writer.write_all(&[i; 7]).unwrap();
            }
        });

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        producer.join().unwrap();

        let expected: Vec<u8> = (0..100u8).flat_map(|i| [i; 7]).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_small_reads_split_messages() {
        let (mut writer, mut reader) = pipe(4);
        writer.write_all(b"abcdef").unwrap();
        writer.close();

        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_large_write_is_split() {
        let (mut writer, mut reader) = pipe(1);
        let data: Vec<u8> = (0..3 * MAX_MESSAGE_SIZE + 10).map(|i| i as u8).collect();

        assert_eq!(writer.write(&data).unwrap(), MAX_MESSAGE_SIZE);
        // The single slot is taken; the next message cannot be queued
        assert!(writer.tx.as_ref().unwrap().is_full());

        let expected = data.clone();
        let producer = thread::spawn(move || {
            writer.write_all(&data[MAX_MESSAGE_SIZE..]).unwrap();
        });

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        producer.join().unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_write_after_reader_dropped() {
        let (mut writer, reader) = pipe(1);
        drop(reader);
        let err = writer.write(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_write_after_close() {
        let (mut writer, _reader) = pipe(1);
        writer.close();
        assert!(writer.write(b"x").is_err());
        assert_eq!(writer.write(b"").unwrap(), 0);
    }
}
