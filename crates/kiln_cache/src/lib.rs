//! Persisted source snapshots for one-shot builds.
//!
//! A long-running host feeds the build engine change notifications as they
//! happen. A command-line run has no such feed, so this crate records a
//! content hash for every source after each successful build and, on the
//! next run, diffs the current sources against that snapshot to recover the
//! added, changed and removed notifications.

#![warn(missing_docs)]

pub mod error;
pub mod hasher;
pub mod manifest;
pub mod tracker;

pub use error::CacheError;
pub use hasher::{ChangeSet, SourceHasher};
pub use manifest::{BuildManifest, FileRecord};
pub use tracker::{ChangeTracker, CACHE_DIR};
