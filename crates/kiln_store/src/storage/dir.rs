//! Live directory storage.

use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use kiln_common::{Location, PathId};
use tracing::debug;

use super::{join_suffix, split_suffix, Listing, Storage};
use crate::error::StoreError;

/// A store backed by a mutable directory tree.
///
/// Nothing is cached here; every listing goes to the filesystem, and the
/// owning root decides when to rescan. A read-only directory store serves
/// external libraries that are unpacked on disk.
#[derive(Debug, Clone)]
pub struct DirStorage {
    base: PathBuf,
    read_only: bool,
}

impl DirStorage {
    /// Creates a writable store rooted at `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            read_only: false,
        }
    }

    /// Creates a store rooted at `base` that rejects writes and deletes.
    pub fn read_only(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            read_only: true,
        }
    }

    fn dir_path(&self, dir: &PathId) -> PathBuf {
        let mut path = self.base.clone();
        path.extend(dir.segments());
        path
    }

    fn file_path<'a>(&self, location: &'a Location) -> Result<&'a Path, StoreError> {
        location.as_file().ok_or_else(|| StoreError::NotFound {
            location: location.clone(),
        })
    }

    fn check_writable(&self, location: &Location) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly {
                location: location.clone(),
            });
        }
        Ok(())
    }
}

impl Storage for DirStorage {
    fn base(&self) -> &Path {
        &self.base
    }

    fn is_live(&self) -> bool {
        true
    }

    fn list(&self, dir: &PathId) -> Result<Vec<Listing>, StoreError> {
        let path = self.dir_path(dir);
        let read_dir = match fs::read_dir(&path) {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(path, e)),
        };

        let mut out = Vec::new();
        for item in read_dir {
            let item = item.map_err(|e| StoreError::io(&path, e))?;
            let child = item.path();
            let Some(name) = item.file_name().to_str().map(str::to_string) else {
                debug!(path = %child.display(), "skipping non-UTF-8 name");
                continue;
            };
            if child.is_dir() {
                out.push(Listing::Folder(name));
            } else if child.is_file() {
                let (stem, suffix) = split_suffix(&name);
                out.push(Listing::File {
                    stem: stem.to_string(),
                    suffix: suffix.to_string(),
                    location: Location::File(child.clone()),
                });
            }
        }
        Ok(out)
    }

    fn read(&self, location: &Location) -> Result<Vec<u8>, StoreError> {
        let path = self.file_path(location)?;
        fs::read(path).map_err(|e| StoreError::io(path, e))
    }

    fn peek(&self, location: &Location, len: usize) -> Option<Vec<u8>> {
        let path = location.as_file()?;
        let file = fs::File::open(path).ok()?;
        let mut buf = Vec::with_capacity(len);
        file.take(len as u64).read_to_end(&mut buf).ok()?;
        Some(buf)
    }

    fn exists(&self, location: &Location) -> bool {
        location.as_file().is_some_and(Path::is_file)
    }

    fn modified(&self, location: &Location) -> Option<SystemTime> {
        fs::metadata(location.as_file()?).ok()?.modified().ok()
    }

    fn locate(&self, id: &PathId, suffix: &str) -> Location {
        let mut path = self.base.clone();
        if let Some(parent) = id.parent() {
            path.extend(parent.segments());
        }
        if let Some(stem) = id.last() {
            path.push(join_suffix(stem, suffix));
        }
        Location::File(path)
    }

    fn resolve(&self, location: &Location) -> Option<(PathId, String)> {
        let relative = location.as_file()?.strip_prefix(&self.base).ok()?;
        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(s) => segments.push(s.to_str()?.to_string()),
                _ => return None,
            }
        }
        let name = segments.pop()?;
        let (stem, suffix) = split_suffix(&name);
        segments.push(stem.to_string());
        Some((PathId::from_segments(segments), suffix.to_string()))
    }

    fn prepare(&mut self, location: &Location) -> Result<(), StoreError> {
        self.check_writable(location)?;
        let path = self.file_path(location)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        Ok(())
    }

    fn write(&mut self, location: &Location, bytes: &[u8]) -> Result<(), StoreError> {
        self.prepare(location)?;
        let path = self.file_path(location)?;
        fs::write(path, bytes).map_err(|e| StoreError::io(path, e))
    }

    fn delete(&mut self, location: &Location) -> Result<bool, StoreError> {
        self.check_writable(location)?;
        let path = self.file_path(location)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    fn reload(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}
