//! Hierarchical artifact names used as keys within a root.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An immutable hierarchical name: an ordered sequence of string segments.
///
/// A `PathId` identifies an artifact within the namespace of a single root,
/// independent of its physical suffix. `src/util/list.src` and
/// `bin/util/list.il` both carry the id `util/list`. Equality is structural.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct PathId {
    segments: Vec<String>,
}

impl PathId {
    /// The empty id naming the top of a root's folder tree.
    pub const ROOT: PathId = PathId {
        segments: Vec::new(),
    };

    /// Creates an id from a sequence of segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses a `/`-separated id, ignoring empty segments.
    ///
    /// `"a/b/c"`, `"/a/b/c"` and `"a//b/c/"` all parse to the same id.
    pub fn parse(s: &str) -> Self {
        Self::from_segments(s.split('/').filter(|seg| !seg.is_empty()))
    }

    /// Returns a new id with `segment` appended.
    pub fn append(&self, segment: impl Into<String>) -> PathId {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        PathId { segments }
    }

    /// Returns the segments of this id.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns `true` if this is the root id.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the segment at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(String::as_str)
    }

    /// Returns the final segment, or `None` for the root id.
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Returns the id of the enclosing folder, or `None` for the root id.
    pub fn parent(&self) -> Option<PathId> {
        if self.segments.is_empty() {
            return None;
        }
        Some(PathId {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Returns the id formed by segments `start..end`.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds.
    pub fn subpath(&self, start: usize, end: usize) -> PathId {
        PathId {
            segments: self.segments[start..end].to_vec(),
        }
    }

    /// Returns `true` if `prefix` is a (not necessarily strict) prefix of this id.
    pub fn starts_with(&self, prefix: &PathId) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Returns `true` if this id names a folder strictly enclosing `other`.
    pub fn is_ancestor_of(&self, other: &PathId) -> bool {
        self.segments.len() < other.segments.len() && other.starts_with(self)
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl fmt::Debug for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathId({self})")
    }
}

impl FromStr for PathId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(PathId::parse(s))
    }
}
