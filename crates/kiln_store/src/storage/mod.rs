//! Physical storage strategies behind a root.
//!
//! A [`Storage`] knows how to enumerate, read and write the artifacts of one
//! backing store. Roots own exactly one storage and never touch the
//! filesystem directly, so live and archived roots differ only in the
//! strategy they are constructed with.

mod archive;
mod dir;

pub use archive::ArchiveStorage;
pub use dir::DirStorage;

use std::path::Path;
use std::time::SystemTime;

use kiln_common::{Location, PathId};

use crate::error::StoreError;

/// One item found while listing a folder of a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    /// A nested folder, by segment name.
    Folder(String),
    /// An artifact file.
    File {
        /// File name without its suffix; the last segment of the entry id.
        stem: String,
        /// Suffix after the final dot, empty if there is none.
        suffix: String,
        /// Where the artifact lives.
        location: Location,
    },
}

/// Scan, read and write primitives for one backing store.
pub trait Storage {
    /// Returns the directory or archive file this store is backed by.
    fn base(&self) -> &Path;

    /// Returns `true` if the store is rescanned on refresh.
    fn is_live(&self) -> bool;

    /// Lists the immediate children of folder `dir`.
    ///
    /// A folder that does not exist lists as empty.
    fn list(&self, dir: &PathId) -> Result<Vec<Listing>, StoreError>;

    /// Reads the whole artifact at `location`.
    fn read(&self, location: &Location) -> Result<Vec<u8>, StoreError>;

    /// Returns up to `len` leading bytes of the artifact, if it can be read.
    fn peek(&self, location: &Location, len: usize) -> Option<Vec<u8>> {
        let mut bytes = self.read(location).ok()?;
        bytes.truncate(len);
        Some(bytes)
    }

    /// Returns `true` if an artifact currently exists at `location`.
    fn exists(&self, location: &Location) -> bool;

    /// Returns the last modification time of the artifact, if known.
    fn modified(&self, location: &Location) -> Option<SystemTime>;

    /// Computes where an artifact with this id and suffix would live.
    fn locate(&self, id: &PathId, suffix: &str) -> Location;

    /// Maps a location back to the id and suffix it would have in this
    /// store, or `None` if it falls outside the store.
    fn resolve(&self, location: &Location) -> Option<(PathId, String)>;

    /// Creates whatever physical folders must exist before `location` can
    /// be written.
    fn prepare(&mut self, location: &Location) -> Result<(), StoreError>;

    /// Writes `bytes` to `location`, creating parent folders as needed.
    fn write(&mut self, location: &Location, bytes: &[u8]) -> Result<(), StoreError>;

    /// Deletes the artifact at `location`. Returns `false` if there was
    /// nothing to delete.
    fn delete(&mut self, location: &Location) -> Result<bool, StoreError>;

    /// Re-validates the backing store before a rescan.
    fn reload(&mut self) -> Result<(), StoreError>;
}

/// Splits a file name into stem and suffix at the final dot.
///
/// A leading dot does not start a suffix, so `.hidden` has none.
pub(crate) fn split_suffix(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => (&name[..pos], &name[pos + 1..]),
        _ => (name, ""),
    }
}

/// Appends `suffix` to `stem` with a dot, unless the suffix is empty.
pub(crate) fn join_suffix(stem: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        stem.to_string()
    } else {
        format!("{stem}.{suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_split_at_last_dot() {
        assert_eq!(split_suffix("list.src"), ("list", "src"));
        assert_eq!(split_suffix("archive.tar.gz"), ("archive.tar", "gz"));
        assert_eq!(split_suffix("Makefile"), ("Makefile", ""));
        assert_eq!(split_suffix(".hidden"), (".hidden", ""));
    }

    #[test]
    fn suffix_join_skips_empty() {
        assert_eq!(join_suffix("list", "il"), "list.il");
        assert_eq!(join_suffix("README", ""), "README");
    }
}
