//! Error types for configuration loading and validation.

/// Errors that can occur when loading or validating a `kiln.toml` declaration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A rule refers to a container id that is not declared.
    #[error("unknown container '{0}'")]
    UnknownContainer(String),

    /// Two containers share an id.
    #[error("duplicate container '{0}'")]
    DuplicateContainer(String),

    /// A required field is missing or empty.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unknown_container() {
        let err = ConfigError::UnknownContainer("lib".to_string());
        assert_eq!(format!("{err}"), "unknown container 'lib'");
    }

    #[test]
    fn display_duplicate_container() {
        let err = ConfigError::DuplicateContainer("src".to_string());
        assert_eq!(format!("{err}"), "duplicate container 'src'");
    }

    #[test]
    fn display_missing_field() {
        let err = ConfigError::MissingField("project.name".to_string());
        assert_eq!(format!("{err}"), "missing required field: project.name");
    }

    #[test]
    fn display_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ConfigError::IoError(io_err);
        assert!(format!("{err}").starts_with("failed to read configuration:"));
    }
}
