//! Semantic content types.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// An opaque tag naming what an artifact holds, independent of its suffix.
///
/// The engine only compares content types; encoding and decoding the bytes
/// behind a type is the business of the transform that produces or consumes
/// it.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentType(Cow<'static, str>);

impl ContentType {
    /// Source files written by the user.
    pub const SOURCE: ContentType = ContentType(Cow::Borrowed("source"));
    /// Verification-condition files.
    pub const VERIFICATION: ContentType = ContentType(Cow::Borrowed("verification"));
    /// Compiled intermediate form.
    pub const INTERMEDIATE: ContentType = ContentType(Cow::Borrowed("intermediate"));
    /// Packaged binary output.
    pub const BINARY: ContentType = ContentType(Cow::Borrowed("binary"));
    /// Anything the registry does not recognize.
    pub const UNTYPED: ContentType = ContentType(Cow::Borrowed("untyped"));

    /// Creates a content type from a name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        match name.as_str() {
            "source" => Self::SOURCE,
            "verification" => Self::VERIFICATION,
            "intermediate" => Self::INTERMEDIATE,
            "binary" => Self::BINARY,
            "untyped" => Self::UNTYPED,
            _ => ContentType(Cow::Owned(name)),
        }
    }

    /// Returns the name of this content type.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the catch-all type of unrecognized suffixes.
    pub fn is_untyped(&self) -> bool {
        *self == Self::UNTYPED
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentType({})", self.0)
    }
}
