//! Problem markers reported against artifacts, and their rendering.
//!
//! A build maps each structured transform failure to a [`Marker`] on the
//! artifact it came from. Markers accumulate in a [`MarkerLog`] keyed by
//! resource so that a rebuild can clear exactly the markers of the artifacts
//! it is about to reprocess. [`TerminalRenderer`] formats them for humans.

#![warn(missing_docs)]

pub mod log;
pub mod marker;
pub mod renderer;
pub mod severity;

pub use log::MarkerLog;
pub use marker::Marker;
pub use renderer::{MarkerRenderer, TerminalRenderer};
pub use severity::{Priority, Severity};
