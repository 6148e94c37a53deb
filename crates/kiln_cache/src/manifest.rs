//! The persisted snapshot of the last successful build.
//!
//! Stored as `manifest.json` in the cache directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use kiln_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Name of the manifest file within the cache directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Source hashes and configuration hash recorded after a successful build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    /// Tool version that wrote the snapshot. Any other version is ignored.
    pub kiln_version: String,
    /// Hash of the build-path declaration at the time of the build.
    pub config_hash: Option<ContentHash>,
    /// Per-source state, keyed by physical path.
    pub files: BTreeMap<PathBuf, FileRecord>,
}

/// Recorded state of one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Content hash when the source was last built.
    pub content_hash: ContentHash,
}

impl BuildManifest {
    /// Creates an empty manifest for the given tool version.
    pub fn new(kiln_version: &str) -> Self {
        Self {
            kiln_version: kiln_version.to_string(),
            config_hash: None,
            files: BTreeMap::new(),
        }
    }

    /// Loads the manifest from `cache_dir`, returning `None` if it is
    /// missing or unreadable.
    pub fn load(cache_dir: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(cache_dir.join(MANIFEST_FILE)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Saves the manifest, creating `cache_dir` if needed.
    pub fn save(&self, cache_dir: &Path) -> Result<(), CacheError> {
        std::fs::create_dir_all(cache_dir).map_err(|e| CacheError::Io {
            path: cache_dir.to_path_buf(),
            source: e,
        })?;
        let path = cache_dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        std::fs::write(&path, json).map_err(|e| CacheError::Io { path, source: e })
    }

    /// Deletes the manifest from `cache_dir`. A missing manifest is not an
    /// error.
    pub fn remove(cache_dir: &Path) -> Result<(), CacheError> {
        let path = cache_dir.join(MANIFEST_FILE);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io { path, source: e }),
        }
    }

    /// Returns `true` if this manifest was written by `current_version`.
    pub fn is_compatible(&self, current_version: &str) -> bool {
        self.kiln_version == current_version
    }
}
