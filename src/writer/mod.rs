//! Push-style writer around the chunked stream encoder.
//!
//! [`write_chunked_stream`](crate::write_chunked_stream) pulls its input from
//! a reader. [`ChunkedWriter`] turns that around: the encoder runs on a
//! background thread fed through an in-memory pipe, and the caller simply
//! writes the tar bytes and closes.

mod pipe;

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, TryRecvError, bounded};
use tracing::warn;

use crate::config::CompressorConfig;
use crate::error::{Error, Result};
use crate::stream::write_chunked_stream;
use pipe::{PipeWriter, pipe};

/// Name of the background encoder thread.
const THREAD_NAME: &str = "zstd-chunked";

/// Writer that encodes a tar stream as zstd:chunked on a background thread.
///
/// Writes block only when the encoder falls behind by more than the
/// configured pipe capacity. An encoder failure is reported by the next
/// [`write`](Write::write) or by [`close`](ChunkedWriter::close), and every
/// call after that reports the same failure.
///
/// # Example
///
/// ```
/// use chunked_zstd::compressor;
/// use std::collections::BTreeMap;
/// use std::io::Write;
///
/// let mut builder = tar::Builder::new(Vec::new());
/// let mut header = tar::Header::new_gnu();
/// header.set_size(4);
/// header.set_mode(0o644);
/// builder.append_data(&mut header, "data", &b"1234"[..])?;
/// let archive = builder.into_inner()?;
///
/// let mut writer = compressor(Vec::new(), BTreeMap::new(), None)?;
/// writer.write_all(&archive)?;
/// let annotations = writer.close()?;
/// assert!(annotations.contains_key(chunked_zstd::MANIFEST_POSITION_KEY));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ChunkedWriter {
    pipe: PipeWriter,
    errors: Receiver<Error>,
    handle: Option<JoinHandle<BTreeMap<String, String>>>,
    failure: Option<Arc<Error>>,
    annotations: Option<BTreeMap<String, String>>,
}

/// Starts an encoder writing to `out`.
///
/// `annotations` is handed to the manifest writer and returned, extended with
/// the manifest location, by [`ChunkedWriter::close`].
///
/// # Errors
///
/// Fails if `config` is invalid or the background thread cannot be spawned.
pub fn zstd_chunked_writer<W>(
    out: W,
    annotations: BTreeMap<String, String>,
    config: CompressorConfig,
) -> Result<ChunkedWriter>
where
    W: Write + Send + 'static,
{
    config.validate()?;

    let (pipe, mut reader) = pipe(config.pipe_capacity());
    let (error_tx, errors) = bounded(1);

    let handle = thread::Builder::new()
        .name(THREAD_NAME.to_string())
        .spawn(move || {
            let mut annotations = annotations;
            if let Err(err) = write_chunked_stream(out, &mut annotations, &mut reader, &config) {
                warn!(error = %err, "chunked encoder failed");
                // Capacity 1 and a single send: never blocks
                let _ = error_tx.send(err);
            }
            // Keep the caller's writes flowing until it closes its end
            let _ = io::copy(&mut reader, &mut io::sink());
            annotations
        })?;

    Ok(ChunkedWriter {
        pipe,
        errors,
        handle: Some(handle),
        failure: None,
        annotations: None,
    })
}

/// Starts an encoder at compression `level`, 10 when `None`.
pub fn compressor<W>(
    out: W,
    annotations: BTreeMap<String, String>,
    level: Option<i32>,
) -> Result<ChunkedWriter>
where
    W: Write + Send + 'static,
{
    let mut config = CompressorConfig::default();
    if let Some(level) = level {
        config = config.with_level(level);
    }
    zstd_chunked_writer(out, annotations, config)
}

impl ChunkedWriter {
    /// Closes the input and waits for the encoder to finish.
    ///
    /// Returns the annotations with the manifest checksum and position added.
    pub fn close(&mut self) -> io::Result<BTreeMap<String, String>> {
        // The encoder reads to end of stream before it reports
        self.pipe.close();

        if let Some(handle) = self.handle.take() {
            if let Ok(err) = self.errors.recv() {
                self.record(err);
            }
            match handle.join() {
                Ok(annotations) => self.annotations = Some(annotations),
                Err(_) => {
                    if self.failure.is_none() {
                        self.record(Error::Io(io::Error::other("encoder thread panicked")));
                    }
                }
            }
        }

        if let Some(failure) = &self.failure {
            return Err(io::Error::other(Arc::clone(failure)));
        }
        self.annotations
            .clone()
            .ok_or_else(|| io::Error::other("encoder produced no result"))
    }

    fn record(&mut self, err: Error) -> io::Error {
        let failure = Arc::new(err);
        self.failure = Some(Arc::clone(&failure));
        self.pipe.close();
        io::Error::other(failure)
    }

    fn check(&mut self) -> io::Result<()> {
        if let Some(failure) = &self.failure {
            return Err(io::Error::other(Arc::clone(failure)));
        }
        match self.errors.try_recv() {
            Ok(err) => Err(self.record(err)),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => Ok(()),
        }
    }
}

impl Write for ChunkedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check()?;
        match self.pipe.write(buf) {
            Ok(n) => Ok(n),
            Err(err) => {
                // The encoder may have failed between the check and the write
                self.check()?;
                Err(err)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Output buffer shared with the encoder thread.
    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Failing;

    impl Write for Failing {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn archive(payload: &[u8]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(payload.len() as u64);
        header.set_mode(0o644);
        builder.append_data(&mut header, "file", payload).unwrap();
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_roundtrip_through_thread() {
        let out = Shared::default();
        let tar = archive(&[5u8; 10_000]);

        let mut writer = compressor(out.clone(), BTreeMap::new(), Some(3)).unwrap();
        for piece in tar.chunks(333) {
            writer.write_all(piece).unwrap();
        }
        let annotations = writer.close().unwrap();

        let encoded = out.0.lock().unwrap().clone();
        assert_eq!(zstd::stream::decode_all(&encoded[..]).unwrap(), tar);
        assert!(annotations.contains_key(crate::manifest::MANIFEST_CHECKSUM_KEY));
    }

    #[test]
    fn test_annotations_pass_through() {
        let mut annotations = BTreeMap::new();
        annotations.insert("org.example".to_string(), "value".to_string());
        let mut writer = compressor(Vec::new(), annotations, None).unwrap();
        writer.write_all(&archive(b"x")).unwrap();
        let annotations = writer.close().unwrap();
        assert_eq!(annotations["org.example"], "value");
        assert_eq!(annotations.len(), 3);
    }

    #[test]
    fn test_bad_input_replays_failure() {
        let mut writer = compressor(Vec::new(), BTreeMap::new(), None).unwrap();
        // Not a tar header: checksum cannot match
        let _ = writer.write_all(&[b'1'; 512]);

        let first = writer.close().unwrap_err().to_string();
        assert!(first.contains("checksum"), "{}", first);

        let again = writer.write(b"more").unwrap_err().to_string();
        assert_eq!(again, first);
        assert_eq!(writer.close().unwrap_err().to_string(), first);
    }

    #[test]
    fn test_output_failure_surfaces() {
        let mut writer = compressor(Failing, BTreeMap::new(), None).unwrap();
        let tar = archive(&[1u8; 100_000]);
        // Depending on timing the failure shows up here or on close
        let written = writer.write_all(&tar);
        let closed = writer.close();
        assert!(written.is_err() || closed.is_err());
        assert!(closed.is_err());
    }

    #[test]
    fn test_invalid_level() {
        assert!(matches!(
            compressor(Vec::new(), BTreeMap::new(), Some(99)),
            Err(Error::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_write_after_successful_close() {
        let mut writer = compressor(Vec::new(), BTreeMap::new(), None).unwrap();
        writer.write_all(&archive(b"abc")).unwrap();
        let first = writer.close().unwrap();
        assert_eq!(writer.close().unwrap(), first);
        assert!(writer.write(b"late").is_err());
    }
}
