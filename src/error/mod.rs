//! Error types for chunked-zstd.

/// Errors that can occur while encoding a chunked stream.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error occurred while reading the archive or writing output.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration parameter.
    #[error("invalid config: {message}")]
    InvalidConfig {
        /// Description of what was invalid.
        message: &'static str,
    },

    /// The input is not a well-formed tar archive.
    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    /// The archive contains an entry type the manifest cannot describe.
    #[error("unknown tarball type: {:?}", char::from(*.0))]
    UnsupportedEntryType(u8),

    /// The manifest could not be serialized.
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    /// A previous frame operation failed and the sink lost its writer.
    #[error("frame sink is unusable after an earlier failure")]
    FrameSinkPoisoned,
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(err) => err,
            other => std::io::Error::other(other),
        }
    }
}
