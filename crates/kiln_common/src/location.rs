//! Physical locations of artifacts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Where an artifact physically lives.
///
/// Live roots place entries in ordinary files; archive roots place them
/// inside a packaged snapshot. The `Display` form is what external tools
/// report in error messages, so it is also what structured errors are
/// matched against.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Location {
    /// A file on the local filesystem.
    File(PathBuf),
    /// A member of an archive, written `archive!/entry`.
    Archived {
        /// Path of the archive file.
        archive: PathBuf,
        /// `/`-separated member name within the archive.
        entry: String,
    },
}

impl Location {
    /// Returns the filesystem path if this is a plain file.
    pub fn as_file(&self) -> Option<&Path> {
        match self {
            Location::File(path) => Some(path),
            Location::Archived { .. } => None,
        }
    }

    /// Parses a filename as reported by an external tool, the inverse of
    /// the `Display` form.
    pub fn from_reported(filename: &str) -> Location {
        match filename.split_once("!/") {
            Some((archive, entry)) if !archive.is_empty() => Location::Archived {
                archive: PathBuf::from(archive),
                entry: entry.to_string(),
            },
            _ => Location::File(PathBuf::from(filename)),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::File(path) => write!(f, "{}", path.display()),
            Location::Archived { archive, entry } => {
                write!(f, "{}!/{entry}", archive.display())
            }
        }
    }
}
