use thiserror::Error;

/// Invalid splitter parameters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SplitError {
    #[error("chunk_size must be > 0")]
    ZeroChunkSize,

    #[error("chunk_overlap ({overlap}) must be smaller than chunk_size ({size})")]
    OverlapTooLarge { overlap: usize, size: usize },

    #[error("at least one separator is required")]
    NoSeparators,
}

/// Errors raised while building, merging or searching a [`VectorIndex`](crate::VectorIndex).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("vector has {found} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("cannot combine indexes built with different models ({left} vs {right})")]
    ModelMismatch { left: String, right: String },

    #[error("{chunks} chunks but {vectors} vectors")]
    CountMismatch { chunks: usize, vectors: usize },

    #[error("cannot merge: entry id {0} exists in both indexes")]
    DuplicateId(String),
}

/// Errors raised while decoding a persisted snapshot.
///
/// A snapshot that fails any check is rejected as a whole; decoding never
/// falls back to an empty index.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("file is {len} bytes, shorter than the snapshot header")]
    Truncated { len: usize },

    #[error("missing snapshot magic; not an index file")]
    BadMagic,

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u16),

    #[error("payload checksum mismatch; file is corrupted")]
    ChecksumMismatch,

    #[error("payload could not be decoded: {0}")]
    Decode(String),

    #[error("payload could not be encoded: {0}")]
    Encode(String),

    #[error("inconsistent payload: {0}")]
    Inconsistent(String),
}
