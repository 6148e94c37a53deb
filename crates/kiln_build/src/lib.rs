//! The kiln incremental build engine.
//!
//! A [`Project`] tracks which sources changed since the last build, computes
//! the dependency closure of that delta through its [`BuildRule`]s and runs
//! each rule's [`Transform`] over exactly the stale entries. Located
//! transform failures are recorded as markers against the source they name.

#![warn(missing_docs)]

pub mod closure;
pub mod error;
pub mod layout;
pub mod project;
pub mod rule;
pub mod transform;
pub mod transforms;

pub use closure::dependency_closure;
pub use error::BuildError;
pub use layout::{build_workspace, ConfigLayout, Layout, Workspace};
pub use project::{BuildKind, BuildReport, Notification, Project};
pub use rule::BuildRule;
pub use transform::{Product, SourceUnit, StructuredError, Transform, TransformError};
pub use transforms::{Builtins, CommandTransform, CopyTransform, TransformFactory, TransformSpec};
