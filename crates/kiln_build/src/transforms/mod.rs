//! Transforms shipped with kiln and the factory that instantiates them per
//! rule.

mod command;
mod copy;

use std::path::Path;

use kiln_config::{ConfigError, RuleOptions};

pub use command::{parse_diagnostic, CommandTransform};
pub use copy::CopyTransform;

use crate::error::BuildError;
use crate::transform::Transform;

/// Builder id of [`CopyTransform`].
pub const COPY: &str = "copy";

/// Builder id of [`CommandTransform`].
pub const COMMAND: &str = "command";

/// What a factory needs to instantiate one rule's transform.
#[derive(Debug, Clone, Copy)]
pub struct TransformSpec<'a> {
    /// The builder id named by the rule.
    pub builder: &'a str,
    /// Per-rule compiler options.
    pub options: RuleOptions,
    /// Program and arguments, for builders that run one.
    pub command: &'a [String],
    /// Directory external programs run in.
    pub project_dir: &'a Path,
}

/// Creates transforms by builder id.
pub trait TransformFactory {
    /// Instantiates the transform for one rule.
    fn create(&self, spec: &TransformSpec<'_>) -> Result<Box<dyn Transform>, BuildError>;
}

/// Factory for the built-in `copy` and `command` builders.
#[derive(Debug, Clone, Copy, Default)]
pub struct Builtins;

impl TransformFactory for Builtins {
    fn create(&self, spec: &TransformSpec<'_>) -> Result<Box<dyn Transform>, BuildError> {
        match spec.builder {
            COPY => Ok(Box::new(CopyTransform)),
            COMMAND => {
                let transform =
                    CommandTransform::new(spec.command, spec.options, spec.project_dir)
                        .ok_or_else(|| ConfigError::MissingField("command".to_string()))?;
                Ok(Box::new(transform))
            }
            other => Err(BuildError::UnknownBuilder(other.to_string())),
        }
    }
}
