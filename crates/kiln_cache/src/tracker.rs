//! Snapshot bookkeeping across command-line runs.

use std::path::{Path, PathBuf};

use kiln_common::ContentHash;
use tracing::debug;

use crate::error::CacheError;
use crate::hasher::{ChangeSet, SourceHasher};
use crate::manifest::{BuildManifest, FileRecord};

/// Name of the cache directory at the project root.
pub const CACHE_DIR: &str = ".kiln";

/// Loads the previous snapshot, diffs sources against it and records the
/// next one.
///
/// A missing, corrupt or version-mismatched snapshot is indistinguishable
/// from no snapshot, which callers answer with a full build.
#[derive(Debug)]
pub struct ChangeTracker {
    cache_dir: PathBuf,
    kiln_version: String,
    previous: Option<BuildManifest>,
}

impl ChangeTracker {
    /// Opens the snapshot kept in `cache_dir`.
    pub fn open(cache_dir: &Path, kiln_version: &str) -> Self {
        let previous = BuildManifest::load(cache_dir).filter(|m| {
            let ok = m.is_compatible(kiln_version);
            if !ok {
                debug!(found = %m.kiln_version, "ignoring snapshot from another version");
            }
            ok
        });
        Self {
            cache_dir: cache_dir.to_path_buf(),
            kiln_version: kiln_version.to_string(),
            previous,
        }
    }

    /// Returns the directory the snapshot lives in.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns `true` if a usable snapshot was found.
    pub fn has_snapshot(&self) -> bool {
        self.previous.is_some()
    }

    /// Returns `true` if the declaration hash differs from the snapshot's.
    /// Without a snapshot nothing is considered changed.
    pub fn config_changed(&self, config_hash: Option<ContentHash>) -> bool {
        self.previous
            .as_ref()
            .is_some_and(|m| m.config_hash != config_hash)
    }

    /// Diffs `sources` against the snapshot. Without one, every source is new.
    pub fn detect(&self, sources: &[PathBuf]) -> ChangeSet {
        let current = SourceHasher::hash_files(sources);
        match &self.previous {
            Some(manifest) => SourceHasher::detect_changes(&current, manifest),
            None => ChangeSet {
                new_files: current.into_keys().collect(),
                ..ChangeSet::default()
            },
        }
    }

    /// Replaces the snapshot with the current state of `sources` and writes
    /// it to disk.
    pub fn record(
        &mut self,
        config_hash: Option<ContentHash>,
        sources: &[PathBuf],
    ) -> Result<(), CacheError> {
        let mut manifest = BuildManifest::new(&self.kiln_version);
        manifest.config_hash = config_hash;
        for (path, content_hash) in SourceHasher::hash_files(sources) {
            manifest.files.insert(path, FileRecord { content_hash });
        }
        manifest.save(&self.cache_dir)?;
        debug!(files = manifest.files.len(), "recorded build snapshot");
        self.previous = Some(manifest);
        Ok(())
    }

    /// Deletes the snapshot so the next run builds everything.
    pub fn discard(&mut self) -> Result<(), CacheError> {
        self.previous = None;
        BuildManifest::remove(&self.cache_dir)
    }
}
