//! Error types surfaced by the cache layer

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from a durable storage backend
///
/// These never reach a cache consumer: read failures degrade to a miss and
/// write failures only cost persistence for future sessions.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Entry could not be serialized for writing
    #[error("Failed to encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),

    /// The in-memory backend's lock was poisoned by a panicking writer
    #[error("Storage lock poisoned")]
    Poisoned,

    /// Backend refused the write (read-only, quota exceeded, ...)
    #[error("Storage rejected write for '{key}': {reason}")]
    Rejected { key: String, reason: String },
}

/// A failed fetch, as shown to the consumer of a cached key
///
/// Fetchers each have their own error enum; the cache keeps only the rendered
/// message so the error can be cloned into every observer's state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct FetchError {
    message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Converts any displayable fetcher error
    pub fn from_display<E: fmt::Display>(err: E) -> Self {
        Self::new(err.to_string())
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
