//! Error types for the build engine.

use kiln_config::ConfigError;
use kiln_store::{RootId, StoreError};

use crate::transform::StructuredError;

/// Errors raised by the engine's lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A root could not read, write or scan its store.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The build-path declaration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A transform reported a problem in one of its sources and the project
    /// is configured to fail on it. The marker has already been recorded.
    #[error("{0}")]
    Transform(StructuredError),

    /// A transform reported a problem in a file no root tracks.
    #[error("cannot attribute error in '{filename}' to any artifact: {message}")]
    UnmappedError {
        /// The filename the transform reported.
        filename: String,
        /// The transform's message.
        message: String,
    },

    /// A transform failed without pointing at a source.
    #[error("transform '{transform}' failed: {source}")]
    Fatal {
        /// Name of the rule whose transform failed.
        transform: String,
        /// The underlying failure.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// No transform is registered under this builder id.
    #[error("unknown builder '{0}'")]
    UnknownBuilder(String),

    /// An external container referenced by a rule could not be opened.
    #[error("container '{id}' is unavailable: {source}")]
    Unavailable {
        /// The container id.
        id: String,
        /// Why it could not be opened.
        source: StoreError,
    },

    /// A rule refers to a root that is not registered.
    #[error("no root registered as {0:?}")]
    MissingRoot(RootId),
}
