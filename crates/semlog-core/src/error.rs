//! Error surface for the compression core.
//!
//! Split into three enums by call site, mirroring the layering of the
//! pipeline: codecs fail on malformed byte streams, the container fails on
//! malformed or foreign files, and the query engine fails on caller misuse.

use thiserror::Error;

/// Failures raised by the low-level byte codecs (varint, zigzag, RLE-v2,
/// BWT, per-template word substitution).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("varint stream ended before a terminating byte was read")]
    TruncatedVarint,

    #[error("varint exceeds 64 bits")]
    VarintOverflow,

    #[error("RLE-v2 stream ended before {expected} elements were decoded, got {got}")]
    TruncatedRle { expected: usize, got: usize },

    #[error("RLE-v2 stream produced {got} elements, more than the expected {expected}")]
    RleOverrun { expected: usize, got: usize },

    #[error("RLE-v2 pattern length {0} is outside the supported 2..=19 range")]
    InvalidPatternLength(usize),

    #[error("BWT block header is truncated")]
    TruncatedBwtHeader,

    #[error("BWT block last-column length does not match declared block size")]
    BwtBlockSizeMismatch,

    #[error("word-substitution code {0:#x} has no dictionary entry")]
    UnknownWordCode(u8),
}

/// Failures raised while writing or reading the container file.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("container version {found:?} is not supported (expected {expected:?})")]
    UnsupportedVersion { found: String, expected: String },

    #[error("container is corrupt: {0}")]
    CorruptContainer(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures raised by query entry points.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("query issued before the container was loaded")]
    NotLoaded,

    #[error("index {index} is out of range for {original_count} logical lines")]
    OutOfRange { index: usize, original_count: usize },

    #[error(transparent)]
    Decode(#[from] CodecError),
}
