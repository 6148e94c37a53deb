//! Problem markers attached to a resource.

use kiln_common::Location;
use serde::{Deserialize, Serialize};

use crate::severity::{Priority, Severity};

/// Kind label given to markers raised by a failing transform.
pub const TRANSFORM_PROBLEM: &str = "transform";

/// A problem recorded against one artifact.
///
/// Offsets are byte offsets into the artifact. `end` is exclusive, so a
/// problem at a single byte `n` spans `n..n + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    /// The artifact the problem is reported against.
    pub resource: Location,
    /// First byte of the offending range.
    pub start: usize,
    /// One past the last byte of the offending range.
    pub end: usize,
    /// Human-readable description.
    pub message: String,
    /// How serious the problem is.
    pub severity: Severity,
    /// How urgently it should be surfaced.
    pub priority: Priority,
    /// What raised the marker.
    pub kind: String,
}

impl Marker {
    /// Creates a high-priority error marker for a transform failure.
    ///
    /// `last` is the offset of the final offending byte as reported by the
    /// transform; the marker's range ends one past it.
    pub fn error(resource: Location, start: usize, last: usize, message: impl Into<String>) -> Self {
        Self {
            resource,
            start,
            end: last.saturating_add(1),
            message: message.into(),
            severity: Severity::Error,
            priority: Priority::High,
            kind: TRANSFORM_PROBLEM.to_string(),
        }
    }

    /// Overrides the severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Returns the length of the marked range, at least one byte.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start).max(1)
    }

    /// Returns `true` if the range is empty. Markers always cover at least
    /// one byte when rendered, so this only reflects the stored offsets.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}
