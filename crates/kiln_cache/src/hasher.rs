//! Source hashing and change detection against a snapshot.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use kiln_common::ContentHash;

use crate::error::CacheError;
use crate::manifest::BuildManifest;

/// Sources sorted by how they differ from the recorded snapshot.
///
/// Every list is sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Sources not in the snapshot.
    pub new_files: Vec<PathBuf>,
    /// Sources whose hash differs from the snapshot.
    pub modified_files: Vec<PathBuf>,
    /// Snapshot entries with no current source.
    pub deleted_files: Vec<PathBuf>,
    /// Sources whose hash matches the snapshot.
    pub unchanged_files: Vec<PathBuf>,
}

impl ChangeSet {
    /// Returns `true` if nothing was added, modified or deleted.
    pub fn is_empty(&self) -> bool {
        self.new_files.is_empty() && self.modified_files.is_empty() && self.deleted_files.is_empty()
    }

    /// Returns the number of sources that must be rebuilt.
    pub fn dirty_count(&self) -> usize {
        self.new_files.len() + self.modified_files.len()
    }
}

/// Hashes sources and compares them to a snapshot.
pub struct SourceHasher;

impl SourceHasher {
    /// Streams a file through the content hasher.
    pub fn hash_file(path: &Path) -> Result<ContentHash, CacheError> {
        let io_err = |e| CacheError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        let file = File::open(path).map_err(io_err)?;
        ContentHash::from_reader(file).map_err(io_err)
    }

    /// Hashes every readable file in `paths`. Unreadable files are left out
    /// and so show up as deleted.
    pub fn hash_files(paths: &[PathBuf]) -> BTreeMap<PathBuf, ContentHash> {
        paths
            .iter()
            .filter_map(|p| Self::hash_file(p).ok().map(|h| (p.clone(), h)))
            .collect()
    }

    /// Classifies current hashes against the snapshot.
    pub fn detect_changes(
        current: &BTreeMap<PathBuf, ContentHash>,
        manifest: &BuildManifest,
    ) -> ChangeSet {
        let mut changes = ChangeSet::default();
        for (path, hash) in current {
            match manifest.files.get(path) {
                Some(record) if record.content_hash == *hash => {
                    changes.unchanged_files.push(path.clone())
                }
                Some(_) => changes.modified_files.push(path.clone()),
                None => changes.new_files.push(path.clone()),
            }
        }
        changes.deleted_files = manifest
            .files
            .keys()
            .filter(|p| !current.contains_key(*p))
            .cloned()
            .collect();
        changes
    }
}
