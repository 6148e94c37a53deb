//! Configuration file loading and validation.

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::ConfigError;
use crate::types::{ContainerKind, ProjectConfig, OUTPUT_CONTAINER};

/// Name of the build-path declaration file at the project root.
pub const CONFIG_FILE: &str = "kiln.toml";

/// Builder that runs an external program and needs a `command`.
const COMMAND_BUILDER: &str = "command";

/// Loads and validates `kiln.toml` from a project directory.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a declaration from a string.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn check_glob(pattern: &str, field: &str) -> Result<(), ConfigError> {
    globset::Glob::new(pattern)
        .map(|_| ())
        .map_err(|e| {
            ConfigError::ValidationError(format!(
                "{field}: invalid glob '{pattern}': {}",
                e.kind()
            ))
        })
}

/// Validates that required fields are present and references resolve.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    if config.project.output.is_empty() {
        return Err(ConfigError::MissingField("project.output".to_string()));
    }

    let mut ids = BTreeSet::new();
    for (i, container) in config.containers.iter().enumerate() {
        if container.id.is_empty() {
            return Err(ConfigError::MissingField(format!("containers[{i}].id")));
        }
        if container.path.is_empty() {
            return Err(ConfigError::MissingField(format!("containers[{i}].path")));
        }
        if !ids.insert(container.id.as_str()) {
            return Err(ConfigError::DuplicateContainer(container.id.clone()));
        }
        if container.id == OUTPUT_CONTAINER && container.path != config.project.output {
            return Err(ConfigError::ValidationError(format!(
                "container '{OUTPUT_CONTAINER}' must use the project output path '{}'",
                config.project.output
            )));
        }
        check_glob(&container.includes, &format!("containers[{i}].includes"))?;
    }

    let kind_of = |id: &str| {
        config
            .containers
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.kind)
            .or_else(|| (id == OUTPUT_CONTAINER).then_some(ContainerKind::Binary))
    };

    for (i, rule) in config.rules.iter().enumerate() {
        if rule.source.is_empty() {
            return Err(ConfigError::MissingField(format!("rules[{i}].source")));
        }
        if kind_of(rule.source.as_str()).is_none() {
            return Err(ConfigError::UnknownContainer(rule.source.clone()));
        }
        if let Some(target) = &rule.target {
            match kind_of(target.as_str()) {
                None => return Err(ConfigError::UnknownContainer(target.clone())),
                Some(ContainerKind::External) => {
                    return Err(ConfigError::ValidationError(format!(
                        "rules[{i}]: target '{target}' is an external container"
                    )))
                }
                Some(_) => {}
            }
        }
        let builder = rule
            .builder
            .as_deref()
            .unwrap_or(config.build.default_builder.as_str());
        if builder == COMMAND_BUILDER && rule.command.is_empty() {
            return Err(ConfigError::MissingField(format!("rules[{i}].command")));
        }
        check_glob(&rule.includes, &format!("rules[{i}].includes"))?;
    }

    for (i, ct) in config.content_types.iter().enumerate() {
        if ct.suffix.is_empty() {
            return Err(ConfigError::MissingField(format!("content_types[{i}].suffix")));
        }
        if ct.content_type.is_empty() {
            return Err(ConfigError::MissingField(format!(
                "content_types[{i}].content_type"
            )));
        }
    }
    Ok(())
}
