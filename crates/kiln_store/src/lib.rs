//! Uniform artifact model over heterogeneous stores.
//!
//! A [`Root`] is a namespace of typed [`Entry`] values organized in a lazily
//! scanned [`Folder`] tree. Physical access is delegated to a [`Storage`]
//! strategy: a live directory that is rescanned on refresh, or an immutable
//! archive snapshot read once at construction. Content types are assigned by
//! an explicit, immutable [`Registry`] shared by every root of a project.

#![warn(missing_docs)]

pub mod content;
pub mod entry;
pub mod error;
pub mod filter;
pub mod folder;
pub mod registry;
pub mod root;
pub mod storage;

pub use content::ContentType;
pub use entry::Entry;
pub use error::StoreError;
pub use filter::Filter;
pub use folder::Folder;
pub use registry::{Association, Registry};
pub use root::{EntryKey, Root, RootId, RootKind, RootSet};
pub use storage::{ArchiveStorage, DirStorage, Listing, Storage};
