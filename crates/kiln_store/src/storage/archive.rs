//! Immutable archive snapshot storage.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use flate2::read::GzDecoder;
use kiln_common::{Location, PathId};
use tracing::debug;

use super::{join_suffix, split_suffix, Listing, Storage};
use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Zip,
    Tar,
    TarGz,
}

impl Format {
    fn detect(path: &Path) -> Option<Format> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".zip") || name.ends_with(".jar") {
            Some(Format::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Format::TarGz)
        } else if name.ends_with(".tar") {
            Some(Format::Tar)
        } else {
            None
        }
    }
}

/// A read-only store holding a snapshot of a packaged library.
///
/// All members are read into memory when the store is opened; later
/// changes to the archive file are not observed. Writes and deletes fail.
#[derive(Debug, Clone)]
pub struct ArchiveStorage {
    path: PathBuf,
    members: BTreeMap<String, Vec<u8>>,
    modified: Option<SystemTime>,
}

impl ArchiveStorage {
    /// Returns `true` if `path` has a suffix of a supported archive format.
    pub fn is_archive(path: &Path) -> bool {
        Format::detect(path).is_some()
    }

    /// Opens the archive at `path` and snapshots its members.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let format = Format::detect(&path).ok_or_else(|| StoreError::Archive {
            path: path.clone(),
            reason: "unsupported archive format".to_string(),
        })?;
        let file = File::open(&path).map_err(|e| StoreError::io(&path, e))?;
        let modified = file.metadata().ok().and_then(|m| m.modified().ok());

        let members = match format {
            Format::Zip => read_zip(&path, file)?,
            Format::Tar => read_tar(&path, file)?,
            Format::TarGz => read_tar(&path, GzDecoder::new(file))?,
        };
        debug!(archive = %path.display(), members = members.len(), "opened archive");

        Ok(Self {
            path,
            members,
            modified,
        })
    }

    /// Returns the number of file members in the snapshot.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if the snapshot holds no files.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn member<'a>(&self, location: &'a Location) -> Option<&'a str> {
        match location {
            Location::Archived { archive, entry } if *archive == self.path => Some(entry),
            _ => None,
        }
    }

    fn read_only(&self, location: &Location) -> StoreError {
        StoreError::ReadOnly {
            location: location.clone(),
        }
    }
}

fn archive_error(path: &Path, reason: impl ToString) -> StoreError {
    StoreError::Archive {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn read_zip(path: &Path, file: File) -> Result<BTreeMap<String, Vec<u8>>, StoreError> {
    let mut archive = zip::ZipArchive::new(file).map_err(|e| archive_error(path, e))?;
    let mut members = BTreeMap::new();
    for i in 0..archive.len() {
        let mut member = archive.by_index(i).map_err(|e| archive_error(path, e))?;
        if !member.is_file() {
            continue;
        }
        let name = member.name().trim_start_matches('/').to_string();
        let mut bytes = Vec::with_capacity(member.size() as usize);
        member
            .read_to_end(&mut bytes)
            .map_err(|e| StoreError::io(path, e))?;
        members.insert(name, bytes);
    }
    Ok(members)
}

fn read_tar<R: Read>(path: &Path, reader: R) -> Result<BTreeMap<String, Vec<u8>>, StoreError> {
    let mut archive = tar::Archive::new(reader);
    let mut members = BTreeMap::new();
    let entries = archive.entries().map_err(|e| archive_error(path, e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| archive_error(path, e))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = {
            let member_path = entry.path().map_err(|e| archive_error(path, e))?;
            let Some(name) = member_path.to_str() else {
                continue;
            };
            name.trim_start_matches("./").to_string()
        };
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| StoreError::io(path, e))?;
        members.insert(name, bytes);
    }
    Ok(members)
}

impl Storage for ArchiveStorage {
    fn base(&self) -> &Path {
        &self.path
    }

    fn is_live(&self) -> bool {
        false
    }

    fn list(&self, dir: &PathId) -> Result<Vec<Listing>, StoreError> {
        let prefix = if dir.is_root() {
            String::new()
        } else {
            format!("{dir}/")
        };
        let mut folders = Vec::new();
        let mut out = Vec::new();
        for name in self.members.keys() {
            let Some(rest) = name.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((folder, _)) => {
                    if folders.last().map(String::as_str) != Some(folder) {
                        folders.push(folder.to_string());
                    }
                }
                None => {
                    let (stem, suffix) = split_suffix(rest);
                    out.push(Listing::File {
                        stem: stem.to_string(),
                        suffix: suffix.to_string(),
                        location: Location::Archived {
                            archive: self.path.clone(),
                            entry: name.clone(),
                        },
                    });
                }
            }
        }
        out.extend(folders.into_iter().map(Listing::Folder));
        Ok(out)
    }

    fn read(&self, location: &Location) -> Result<Vec<u8>, StoreError> {
        self.member(location)
            .and_then(|name| self.members.get(name))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                location: location.clone(),
            })
    }

    fn peek(&self, location: &Location, len: usize) -> Option<Vec<u8>> {
        let bytes = self.members.get(self.member(location)?)?;
        Some(bytes[..len.min(bytes.len())].to_vec())
    }

    fn exists(&self, location: &Location) -> bool {
        self.member(location)
            .is_some_and(|name| self.members.contains_key(name))
    }

    fn modified(&self, location: &Location) -> Option<SystemTime> {
        if self.exists(location) {
            self.modified
        } else {
            None
        }
    }

    fn locate(&self, id: &PathId, suffix: &str) -> Location {
        let mut segments: Vec<String> = id
            .parent()
            .map(|p| p.segments().to_vec())
            .unwrap_or_default();
        if let Some(stem) = id.last() {
            segments.push(join_suffix(stem, suffix));
        }
        Location::Archived {
            archive: self.path.clone(),
            entry: segments.join("/"),
        }
    }

    fn resolve(&self, _location: &Location) -> Option<(PathId, String)> {
        // Archives never gain members, so nothing outside the snapshot
        // can be claimed.
        None
    }

    fn prepare(&mut self, location: &Location) -> Result<(), StoreError> {
        Err(self.read_only(location))
    }

    fn write(&mut self, location: &Location, _bytes: &[u8]) -> Result<(), StoreError> {
        Err(self.read_only(location))
    }

    fn delete(&mut self, location: &Location) -> Result<bool, StoreError> {
        Err(self.read_only(location))
    }

    fn reload(&mut self) -> Result<(), StoreError> {
        if self.path.is_file() {
            Ok(())
        } else {
            Err(StoreError::io(
                &self.path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "archive no longer exists"),
            ))
        }
    }
}
