//! Error types for the tag store

use crate::tag::TagId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the explicit-path persistence layer and by mutations
/// that address a tag which is not live.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing a snapshot file failed.
    #[error("I/O error on {}: {}", path.display(), source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serializing the snapshot body failed.
    #[error("failed to encode snapshot: {0}")]
    Encode(String),

    /// The snapshot body could not be decoded.
    #[error("failed to decode snapshot: {0}")]
    Decode(String),

    /// The file does not start with the snapshot magic.
    #[error("not a tag snapshot (bad magic)")]
    BadMagic,

    /// The header names a format this build cannot read.
    #[error("unsupported snapshot format version {0}")]
    UnsupportedVersion(u16),

    /// A mutation addressed a tag id with no live bitmap.
    #[error("unknown tag id {0}")]
    UnknownTag(TagId),

    /// The background save thread could not be started.
    #[error("failed to start save worker: {0}")]
    Worker(#[source] std::io::Error),

    /// The configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
