//! Error types for snapshot operations.

use std::path::PathBuf;

/// Errors that can occur while reading or writing the build snapshot.
///
/// Loading is fail-safe: an unreadable snapshot is treated as absent and
/// forces a full build. These errors surface only when hashing sources or
/// persisting a new snapshot.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The snapshot could not be serialized.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },
}
