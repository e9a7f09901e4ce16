use crate::digest::Digest;
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for pack operations
pub type Result<T> = std::result::Result<T, PakError>;

/// Which of the two per-entry digests failed to match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashKind {
    Decompressed,
    Compressed,
}

impl fmt::Display for HashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashKind::Decompressed => f.write_str("decompressed"),
            HashKind::Compressed => f.write_str("compressed"),
        }
    }
}

/// Unified error type for all pack operations
#[derive(Debug, Error)]
pub enum PakError {
    // Container structure
    #[error("Invalid pack header: expected magic, found {}", hex::encode(.found))]
    InvalidHeader { found: [u8; 16] },

    #[error("Unsupported pack version {found} (this build reads {supported_major}.x)")]
    InvalidVersion {
        found: crate::pak::Version,
        supported_major: u16,
    },

    #[error("Invalid content offset: expected {expected:#x}, got {actual:#x}")]
    InvalidContentOffset { expected: u64, actual: u64 },

    #[error("Invalid pack footer: expected magic, found {}", hex::encode(.found))]
    InvalidFooter { found: Vec<u8> },

    #[error("Content hash mismatch: expected {expected}, got {actual}")]
    ContentHashMismatch { expected: Digest, actual: Digest },

    #[error("Entry '{path}' {kind} hash mismatch: expected {expected}, got {actual}")]
    EntryHashMismatch {
        kind: HashKind,
        path: String,
        expected: Digest,
        actual: Digest,
    },

    #[error("Entry extends past the content region: needs {needed} bytes, {remaining} remain")]
    ContentOverrun { needed: u64, remaining: u64 },

    // Typed values
    #[error("Unexpected item type: expected {expected:#04x}, found {found:#04x}")]
    UnexpectedItemType { expected: u8, found: u8 },

    #[error("Invalid bool encoding: {0:#010x}")]
    InvalidBool(u32),

    #[error("Invalid string: {0}")]
    InvalidString(String),

    #[error("Invalid float text: {0:?}")]
    InvalidFloat(String),

    // Compression
    #[error("Compression failed: {0}")]
    CompressionFailure(String),

    #[error("Decompression failed: {0}")]
    DecompressionFailure(String),

    // Lookup
    #[error("Entry not found in pack: {0}")]
    EntryNotFound(String),

    #[error("Duplicate entry key: {0}")]
    DuplicateKey(String),

    #[error("Pack reader already failed at the {stage} stage")]
    ReaderFailed { stage: crate::pak::Stage },

    #[error("Pack writer unusable after an earlier write error")]
    WriterPoisoned,

    #[error("Unknown atom id: {0}")]
    UnknownAtom(u32),

    // I/O errors
    #[error("Short read while reading {what}")]
    ShortRead { what: &'static str },

    #[error("Unable to allocate {requested} bytes")]
    AllocationFailure { requested: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Path error: {0}")]
    PathError(String),

    // Configuration and serialization
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("TOML error: {0}")]
    Toml(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<toml::de::Error> for PakError {
    fn from(err: toml::de::Error) -> Self {
        PakError::Toml(err.to_string())
    }
}

impl From<toml::ser::Error> for PakError {
    fn from(err: toml::ser::Error) -> Self {
        PakError::Toml(err.to_string())
    }
}
