//! Chunked stream encoder.
//!
//! Reads a tar stream and writes it as a sequence of zstd frames:
//!
//! ```text
//! [raw bytes + ...][chunk 1][chunk 2]...[raw bytes + ...][chunk 1]...[trailer][manifest]
//! ```
//!
//! Raw tar bytes (headers, padding) share a frame with whatever precedes the
//! next payload. Every payload chunk starts a fresh frame, so each chunk can be
//! fetched and decompressed on its own using the offsets in the manifest.
//! Concatenating all frames and decompressing them yields the input tar
//! byte for byte.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use tracing::{debug, trace};

use crate::archive::TarReader;
use crate::buffer::Buffer;
use crate::chunk::{ChunkRecord, ChunkType, Digest};
use crate::chunker::RollingChecksumReader;
use crate::config::CompressorConfig;
use crate::error::Result;
use crate::frame::{FrameSink, ZstdFrameSink};
use crate::manifest::{ManifestWriter, TocManifestWriter};
use crate::metadata::FileMetadata;

/// Encodes the tar stream `reader` into `dest`.
///
/// The manifest is written with [`TocManifestWriter`] and its position is
/// recorded in `annotations`.
///
/// # Example
///
/// ```
/// use chunked_zstd::{CompressorConfig, write_chunked_stream};
/// use std::collections::BTreeMap;
///
/// let mut builder = tar::Builder::new(Vec::new());
/// let mut header = tar::Header::new_gnu();
/// header.set_size(11);
/// header.set_mode(0o644);
/// builder.append_data(&mut header, "greeting.txt", &b"hello world"[..])?;
/// let archive = builder.into_inner()?;
///
/// let mut out = Vec::new();
/// let mut annotations = BTreeMap::new();
/// write_chunked_stream(&mut out, &mut annotations, &archive[..], &CompressorConfig::default())?;
///
/// assert_eq!(zstd::stream::decode_all(&out[..])?, archive);
/// assert_eq!(annotations.len(), 2);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn write_chunked_stream<W: Write, R: Read>(
    dest: W,
    annotations: &mut BTreeMap<String, String>,
    reader: R,
    config: &CompressorConfig,
) -> Result<()> {
    let manifest = TocManifestWriter::new(config.digest());
    write_chunked_stream_with(dest, annotations, reader, config, &manifest)
}

/// Like [`write_chunked_stream`], with a custom manifest writer.
pub fn write_chunked_stream_with<W, R, M>(
    dest: W,
    annotations: &mut BTreeMap<String, String>,
    reader: R,
    config: &CompressorConfig,
    manifest: &M,
) -> Result<()>
where
    W: Write,
    R: Read,
    M: ManifestWriter + ?Sized,
{
    config.validate()?;

    let mut sink = ZstdFrameSink::new(dest, config.level());
    let mut archive = TarReader::new(reader);
    let mut buf = Buffer::take(config.buffer_size());
    let mut metadata = Vec::new();

    while let Some(header) = archive.next_entry()? {
        sink.write_all(archive.raw_bytes())?;

        let payload = encode_payload(&mut sink, &mut archive, &mut buf, config)?;
        debug!(
            name = %header.name,
            size = header.size,
            chunks = payload.chunks.len(),
            "encoded entry"
        );

        let mut primary = FileMetadata::from_header(&header)?;
        primary.digest = payload.digest.map(|d| d.to_string()).unwrap_or_default();
        primary.offset = payload.start.unwrap_or(0);
        primary.end_offset = payload.end;
        metadata.extend(merge_chunks(primary, &payload.chunks));
    }

    sink.write_all(archive.raw_bytes())?;
    let trailing = archive.copy_trailing(&mut sink)?;
    if trailing > 0 {
        debug!(bytes = trailing, "copied bytes after end of archive");
    }
    sink.flush()?;
    let mut dest = sink.finish()?;

    let offset = dest.count();
    manifest.write_manifest(&mut dest, annotations, offset, metadata, config.level())?;
    dest.flush()?;
    Ok(())
}

/// Outcome of encoding one entry's payload.
#[derive(Debug, Default)]
struct Payload {
    /// Stream offset of the first payload frame; `None` for empty payloads.
    start: Option<u64>,
    /// Stream offset right after the last payload frame.
    end: u64,
    /// Whole-payload digest, only when payload bytes were written.
    digest: Option<Digest>,
    chunks: Vec<ChunkRecord>,
}

fn encode_payload<S, R>(
    sink: &mut S,
    payload: R,
    buf: &mut [u8],
    config: &CompressorConfig,
) -> Result<Payload>
where
    S: FrameSink,
    R: Read,
{
    let algorithm = config.digest();
    let mut reader =
        RollingChecksumReader::new(payload, config.holes_threshold(), config.rollsum_bits());

    let mut payload_digest = algorithm.digester();
    let mut chunk_digest = algorithm.digester();
    let mut start = None;
    let mut last_offset = 0;
    let mut last_chunk_offset = 0;
    let mut chunks = Vec::new();

    loop {
        let fill = reader.fill(buf)?;

        if fill.written > 0 {
            if start.is_none() {
                let offset = sink.cut_frame()?;
                start = Some(offset);
                last_offset = offset;
            }
            let data = &buf[..fill.written];
            payload_digest.update(data);
            chunk_digest.update(data);
            sink.write_all(data)?;
        }

        if (fill.split || fill.exhausted) && start.is_some() {
            let offset = sink.cut_frame()?;

            let chunk_size = reader.written_out() - last_chunk_offset;
            if chunk_size > 0 {
                let chunk = ChunkRecord {
                    chunk_offset: last_chunk_offset,
                    offset: last_offset,
                    checksum: chunk_digest.finalize(),
                    chunk_size,
                    chunk_type: if reader.is_last_chunk_zeros() {
                        ChunkType::Zeros
                    } else {
                        ChunkType::Data
                    },
                };
                trace!(%chunk, "chunk");
                chunks.push(chunk);
            }

            last_offset = offset;
            last_chunk_offset = reader.written_out();
            chunk_digest = algorithm.digester();
        }

        if fill.exhausted {
            return Ok(Payload {
                start,
                end: last_offset,
                digest: start.map(|_| payload_digest.finalize()),
                chunks,
            });
        }
    }
}

/// Turns an entry's chunks into manifest records.
///
/// The first chunk lives in the primary record. Each further chunk gets a
/// secondary record. Chunk fields are filled in on every record, the primary
/// included, only when there is more than one chunk.
fn merge_chunks(primary: FileMetadata, chunks: &[ChunkRecord]) -> Vec<FileMetadata> {
    let name = primary.name.clone();
    let mut records = Vec::with_capacity(chunks.len().max(1));
    records.push(primary);
    records.extend(
        chunks
            .iter()
            .skip(1)
            .map(|chunk| FileMetadata::chunk(&name, chunk.chunk_offset)),
    );

    if chunks.len() > 1 {
        for (record, chunk) in records.iter_mut().zip(chunks) {
            record.set_chunk(chunk);
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::DigestAlgorithm;
    use crate::metadata::EntryType;
    use std::io::Cursor;

    fn encode(payload: &[u8], config: &CompressorConfig) -> (Vec<u8>, Payload) {
        let mut sink = ZstdFrameSink::new(Vec::new(), config.level());
        // Stand-in for the raw tar header already in the open frame
        sink.write_all(b"raw header").unwrap();
        let mut buf = vec![0u8; config.buffer_size()];
        let result = encode_payload(&mut sink, Cursor::new(payload), &mut buf, config).unwrap();
        (sink.finish().unwrap().into_inner(), result)
    }

    fn chunk(chunk_offset: u64, offset: u64, size: u64, chunk_type: ChunkType) -> ChunkRecord {
        ChunkRecord {
            chunk_offset,
            offset,
            checksum: DigestAlgorithm::Sha256.digest(&chunk_offset.to_le_bytes()),
            chunk_size: size,
            chunk_type,
        }
    }

    #[test]
    fn test_empty_payload() {
        let (out, payload) = encode(b"", &CompressorConfig::default());
        assert!(payload.start.is_none());
        assert_eq!(payload.end, 0);
        assert!(payload.digest.is_none());
        assert!(payload.chunks.is_empty());
        assert_eq!(zstd::stream::decode_all(&out[..]).unwrap(), b"raw header");
    }

    #[test]
    fn test_single_chunk() {
        let config = CompressorConfig::default();
        let (out, payload) = encode(b"some file contents", &config);

        let start = payload.start.unwrap();
        assert!(start > 0);
        assert_eq!(payload.chunks.len(), 1);
        assert_eq!(payload.chunks[0].offset, start);
        assert_eq!(payload.chunks[0].chunk_size, 18);
        assert_eq!(payload.end, out.len() as u64);
        assert_eq!(
            payload.digest.as_ref(),
            Some(&DigestAlgorithm::Sha256.digest(b"some file contents"))
        );
        assert_eq!(payload.chunks[0].checksum, payload.digest.unwrap());

        let frame = &out[start as usize..payload.end as usize];
        assert_eq!(zstd::stream::decode_all(frame).unwrap(), b"some file contents");
    }

    #[test]
    fn test_hole_makes_three_chunks() {
        let config = CompressorConfig::default();
        let mut data = b"left".to_vec();
        data.extend(vec![0u8; 1024]);
        data.extend(b"right");
        let (out, payload) = encode(&data, &config);

        let kinds: Vec<_> = payload.chunks.iter().map(|c| c.chunk_type).collect();
        assert_eq!(kinds, vec![ChunkType::Data, ChunkType::Zeros, ChunkType::Data]);
        let offsets: Vec<_> = payload.chunks.iter().map(|c| c.chunk_offset).collect();
        assert_eq!(offsets, vec![0, 4, 1028]);
        assert_eq!(payload.chunks[2].end(), data.len() as u64);

        // Each chunk is its own frame
        for pair in payload.chunks.windows(2) {
            let frame = &out[pair[0].offset as usize..pair[1].offset as usize];
            let range = pair[0].range();
            assert_eq!(
                zstd::stream::decode_all(frame).unwrap(),
                &data[range.start as usize..range.end as usize]
            );
        }
    }

    #[test]
    fn test_hole_at_start_and_end() {
        let config = CompressorConfig::default().with_buffer_size(512);
        let mut data = vec![0u8; 3000];
        data.extend(b"middle");
        data.extend(vec![0u8; 2000]);
        let (_, payload) = encode(&data, &config);

        let summary: Vec<_> = payload
            .chunks
            .iter()
            .map(|c| (c.chunk_offset, c.chunk_size, c.chunk_type))
            .collect();
        assert_eq!(
            summary,
            vec![
                (0, 3000, ChunkType::Zeros),
                (3000, 6, ChunkType::Data),
                (3006, 2000, ChunkType::Zeros),
            ]
        );
    }

    #[test]
    fn test_merge_single_chunk() {
        let primary = FileMetadata {
            name: "a".into(),
            offset: 10,
            end_offset: 50,
            ..Default::default()
        };
        let records = merge_chunks(primary.clone(), &[chunk(0, 10, 5, ChunkType::Data)]);
        assert_eq!(records, vec![primary]);
    }

    #[test]
    fn test_merge_many_chunks() {
        let primary = FileMetadata {
            name: "big".into(),
            offset: 10,
            end_offset: 90,
            ..Default::default()
        };
        let chunks = [
            chunk(0, 10, 100, ChunkType::Data),
            chunk(100, 40, 2000, ChunkType::Zeros),
            chunk(2100, 60, 7, ChunkType::Data),
        ];
        let records = merge_chunks(primary, &chunks);

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].entry_type, EntryType::Regular);
        assert_eq!(records[0].end_offset, 90);
        for (record, chunk) in records.iter().zip(&chunks) {
            assert_eq!(record.name, "big");
            assert_eq!(record.offset, chunk.offset);
            assert_eq!(record.chunk_size, chunk.chunk_size);
            assert_eq!(record.chunk_type, chunk.chunk_type);
            assert_eq!(record.chunk_digest, chunk.checksum.to_string());
        }
        assert_eq!(records[1].entry_type, EntryType::Chunk);
        assert_eq!(records[1].chunk_offset, 100);
        assert_eq!(records[2].chunk_offset, 2100);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = CompressorConfig::default().with_level(23);
        let mut annotations = BTreeMap::new();
        let result = write_chunked_stream(Vec::new(), &mut annotations, &b""[..], &config);
        assert!(matches!(result, Err(crate::error::Error::InvalidConfig { .. })));
    }
}
