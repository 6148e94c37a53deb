//! Parsing, validation and resolution of `kiln.toml` build-path declarations.
//!
//! The declaration names the project's containers (source folders, output
//! folders, external libraries) and the ordered rules that transform one
//! container's artifacts into another's. [`resolve_layout`] turns a
//! validated [`ProjectConfig`] into a [`ResolvedLayout`] with every default
//! filled in, ready for the build engine to instantiate.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE};
pub use resolve::{resolve_layout, ResolvedContainer, ResolvedLayout, ResolvedRule, RuleOptions};
pub use types::*;
