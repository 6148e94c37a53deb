//! The boundary to the external compiler.
//!
//! A [`Transform`] receives a batch of sources and returns the products to
//! store under the same ids. It knows nothing about roots or the delta.

use std::fmt;

use kiln_common::{Location, PathId};
use kiln_store::EntryKey;

/// One source handed to a transform.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    /// The source entry.
    pub key: EntryKey,
    /// Where the source is stored.
    pub location: Location,
    /// The source bytes.
    pub content: Vec<u8>,
}

/// One artifact produced by a transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    /// Id of the source it was produced from, and of the target entry.
    pub id: PathId,
    /// The bytes to write.
    pub content: Vec<u8>,
}

/// A problem the transform could pin to a range of one file.
///
/// `end` is the offset of the last offending byte, as tools report it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredError {
    /// The file as the tool names it.
    pub filename: String,
    /// First offending byte.
    pub start: usize,
    /// Last offending byte.
    pub end: usize,
    /// The tool's message.
    pub message: String,
    /// The entry the problem belongs to, when the transform knows it.
    pub origin: Option<EntryKey>,
}

impl StructuredError {
    /// Creates an error naming only a file.
    pub fn new(
        filename: impl Into<String>,
        start: usize,
        end: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            start,
            end,
            message: message.into(),
            origin: None,
        }
    }

    /// Attaches the originating entry.
    pub fn with_origin(mut self, origin: EntryKey) -> Self {
        self.origin = Some(origin);
        self
    }
}

impl fmt::Display for StructuredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}: {}", self.filename, self.start, self.end, self.message)
    }
}

impl std::error::Error for StructuredError {}

/// Why a transform gave up on a batch.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// A problem located in one of the sources.
    #[error(transparent)]
    Structured(StructuredError),
    /// Anything else.
    #[error(transparent)]
    Failed(Box<dyn std::error::Error + Send + Sync>),
}

impl From<StructuredError> for TransformError {
    fn from(err: StructuredError) -> Self {
        TransformError::Structured(err)
    }
}

/// An opaque batch transform.
pub trait Transform {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Transforms `batch`, returning one product per source it handled.
    fn apply(&mut self, batch: &[SourceUnit]) -> Result<Vec<Product>, TransformError>;
}
