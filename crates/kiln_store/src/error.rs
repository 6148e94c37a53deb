//! Error types for artifact store operations.

use std::path::PathBuf;

use kiln_common::Location;

/// Errors raised while scanning, reading or writing a root's backing store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An I/O error occurred on a path of the backing store.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A write or delete was attempted on a store that cannot be modified.
    #[error("{location} is read-only")]
    ReadOnly {
        /// The location that was to be modified.
        location: Location,
    },

    /// An archive could not be opened or decoded.
    #[error("cannot open archive {path}: {reason}")]
    Archive {
        /// The archive file.
        path: PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// A location does not name any artifact of the store.
    #[error("no artifact at {location}")]
    NotFound {
        /// The location that was looked up.
        location: Location,
    },

    /// An inclusion pattern is not a valid glob.
    #[error("invalid include pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Description of the problem.
        reason: String,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
