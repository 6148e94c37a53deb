//! Shared foundational types used across the kiln build engine.
//!
//! This crate provides the hierarchical [`PathId`] used to name artifacts
//! within a root, the physical [`Location`] of an artifact, and the
//! [`ContentHash`] used for change detection.

#![warn(missing_docs)]

pub mod hash;
pub mod location;
pub mod path_id;

pub use hash::ContentHash;
pub use location::Location;
pub use path_id::PathId;
