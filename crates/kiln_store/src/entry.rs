//! Single named artifacts.

use std::time::SystemTime;

use kiln_common::{Location, PathId};

use crate::content::ContentType;
use crate::error::StoreError;
use crate::storage::Storage;

/// One typed artifact tracked by a root.
///
/// Content is loaded lazily and cached. The cache is trusted only while the
/// entry is locally modified or has not been refreshed since loading:
/// [`Entry::refresh`] drops it unless there are unflushed local changes.
#[derive(Debug, Clone)]
pub struct Entry {
    id: PathId,
    content_type: ContentType,
    suffix: String,
    location: Location,
    last_modified: Option<SystemTime>,
    cached: Option<Vec<u8>>,
    modified: bool,
}

impl Entry {
    /// Creates an entry bound to `location` with nothing loaded yet.
    pub fn new(
        id: PathId,
        content_type: ContentType,
        suffix: impl Into<String>,
        location: Location,
        last_modified: Option<SystemTime>,
    ) -> Self {
        Self {
            id,
            content_type,
            suffix: suffix.into(),
            location,
            last_modified,
            cached: None,
            modified: false,
        }
    }

    /// Returns the entry's id within its root.
    pub fn id(&self) -> &PathId {
        &self.id
    }

    /// Returns the entry's content type.
    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    /// Returns the physical suffix, without the dot.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Returns where the entry lives.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Returns the modification time observed at the last load or refresh.
    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    /// Returns `true` if there are local changes not yet flushed.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Returns `true` if content is currently cached.
    pub fn is_loaded(&self) -> bool {
        self.cached.is_some()
    }

    /// Returns the entry's content, loading it on first access.
    pub fn read(&mut self, storage: &dyn Storage) -> Result<&[u8], StoreError> {
        if self.cached.is_none() {
            let bytes = storage.read(&self.location)?;
            self.last_modified = storage.modified(&self.location);
            self.cached = Some(bytes);
        }
        Ok(self.cached.as_deref().unwrap_or_default())
    }

    /// Replaces the cached content and marks the entry modified.
    pub fn stage(&mut self, bytes: Vec<u8>) {
        self.cached = Some(bytes);
        self.modified = true;
    }

    /// Persists staged content, if any, and clears the modified flag.
    pub fn flush(&mut self, storage: &mut dyn Storage) -> Result<(), StoreError> {
        if !self.modified {
            return Ok(());
        }
        let bytes = self.cached.as_deref().unwrap_or_default();
        storage.write(&self.location, bytes)?;
        self.modified = false;
        self.last_modified = storage.modified(&self.location);
        Ok(())
    }

    /// Stages and immediately persists `bytes`.
    pub fn write(&mut self, storage: &mut dyn Storage, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.stage(bytes);
        self.flush(storage)
    }

    /// Re-syncs the timestamp with the store and drops cached content
    /// unless there are unflushed local changes.
    pub fn refresh(&mut self, storage: &dyn Storage) {
        self.last_modified = storage.modified(&self.location);
        if !self.modified {
            self.cached = None;
        }
    }

    /// Returns `true` if the artifact currently exists in the store.
    pub fn exists(&self, storage: &dyn Storage) -> bool {
        storage.exists(&self.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DirStorage;

    fn entry_in(store: &DirStorage, id: &str) -> Entry {
        let id = PathId::parse(id);
        let location = store.locate(&id, "src");
        Entry::new(id, ContentType::SOURCE, "src", location, None)
    }

    #[test]
    fn write_refresh_read_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = DirStorage::new(tmp.path());
        let mut entry = entry_in(&store, "util/list");

        entry.write(&mut store, b"content".to_vec()).unwrap();
        assert!(!entry.is_modified());
        assert!(entry.last_modified().is_some());

        entry.refresh(&store);
        assert!(!entry.is_loaded());
        assert_eq!(entry.read(&store).unwrap(), b"content");
    }

    #[test]
    fn refresh_keeps_unflushed_changes() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirStorage::new(tmp.path());
        let mut entry = entry_in(&store, "a");

        entry.stage(b"local".to_vec());
        entry.refresh(&store);
        assert!(entry.is_modified());
        assert_eq!(entry.read(&store).unwrap(), b"local");
        assert!(!entry.exists(&store));
    }

    #[test]
    fn refresh_observes_external_edit() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = DirStorage::new(tmp.path());
        let mut entry = entry_in(&store, "a");
        entry.write(&mut store, b"one".to_vec()).unwrap();
        assert_eq!(entry.read(&store).unwrap(), b"one");

        std::fs::write(entry.location().as_file().unwrap(), "two").unwrap();
        assert_eq!(entry.read(&store).unwrap(), b"one");
        entry.refresh(&store);
        assert_eq!(entry.read(&store).unwrap(), b"two");
    }

    #[test]
    fn read_missing_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirStorage::new(tmp.path());
        let mut entry = entry_in(&store, "missing");
        assert!(matches!(entry.read(&store), Err(StoreError::Io { .. })));
    }
}
