//! Compressed frame output.
//!
//! - [`CountingWriter`] - Tracks how many bytes reached the destination
//! - [`FrameSink`] - A writer whose output can be cut into independent frames
//! - [`ZstdFrameSink`] - zstd implementation, one frame per cut
//! - [`write_skippable_frame`] - Appends a zstd skippable frame

mod counter;
mod zstd_sink;

use std::io::{self, Write};

pub use counter::CountingWriter;
pub use zstd_sink::ZstdFrameSink;

/// Magic number of the first zstd skippable frame variant (`0x184D2A50`).
pub const SKIPPABLE_FRAME_MAGIC: [u8; 4] = [0x50, 0x2a, 0x4d, 0x18];

/// Size of a skippable frame header: magic plus 32-bit length.
pub const SKIPPABLE_FRAME_HEADER_SIZE: u64 = 8;

/// A writer producing a sequence of independently decodable frames.
pub trait FrameSink: Write {
    /// Closes the current frame, if one is open, and returns the number of
    /// bytes written to the destination so far.
    ///
    /// The next write starts a new frame at the returned offset. Calling this
    /// again without intervening writes returns the same offset and emits
    /// nothing.
    fn cut_frame(&mut self) -> io::Result<u64>;

    /// Returns the number of compressed bytes already in the destination.
    ///
    /// Bytes buffered inside an open frame are not counted.
    fn bytes_written(&self) -> u64;
}

/// Appends `data` as a zstd skippable frame.
///
/// Decoders skip these frames, which is what lets the manifest ride along
/// in the same stream as the compressed archive.
pub fn write_skippable_frame<W: Write + ?Sized>(dest: &mut W, data: &[u8]) -> io::Result<()> {
    let len = u32::try_from(data.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "skippable frame payload exceeds 4 GiB",
        )
    })?;
    dest.write_all(&SKIPPABLE_FRAME_MAGIC)?;
    dest.write_all(&len.to_le_bytes())?;
    dest.write_all(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skippable_frame_layout() {
        let mut out = Vec::new();
        write_skippable_frame(&mut out, b"manifest").unwrap();
        assert_eq!(&out[..4], &[0x50, 0x2a, 0x4d, 0x18]);
        assert_eq!(u32::from_le_bytes(out[4..8].try_into().unwrap()), 8);
        assert_eq!(&out[8..], b"manifest");
    }

    #[test]
    fn test_skippable_frame_is_ignored_by_decoder() {
        let mut out = zstd::stream::encode_all(&b"payload"[..], 3).unwrap();
        write_skippable_frame(&mut out, b"ignored").unwrap();
        let decoded = zstd::stream::decode_all(&out[..]).unwrap();
        assert_eq!(decoded, b"payload");
    }
}
