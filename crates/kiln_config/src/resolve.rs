//! Layout resolution: filling in defaults and the implicit output container.

use std::path::PathBuf;

use crate::error::ConfigError;
use crate::types::{
    ContainerKind, ContentTypeConfig, OnError, ProjectConfig, ALL, OUTPUT_CONTAINER,
};

/// Content type produced by rules that do not name one.
pub const DEFAULT_TARGET_TYPE: &str = "intermediate";

/// A container with every default applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContainer {
    /// Unique id.
    pub id: String,
    /// What the container holds.
    pub kind: ContainerKind,
    /// Directory or archive, relative to the project root.
    pub path: PathBuf,
    /// Glob selecting the container's sources.
    pub includes: String,
    /// Content type of the container's sources.
    pub content_type: String,
    /// `true` for the output container added because none was declared.
    pub implicit: bool,
}

/// Options handed to a rule's transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleOptions {
    /// Whether the transform verifies what it compiles.
    pub verify: bool,
    /// Whether the transform keeps intermediate files.
    pub emit_intermediates: bool,
}

/// A rule with every default applied and container ids checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRule {
    /// Transform to run.
    pub builder: String,
    /// Id of the container read from.
    pub source: String,
    /// Id of the container written to.
    pub target: String,
    /// Glob over source ids.
    pub includes: String,
    /// Content type read.
    pub from: String,
    /// Content type written.
    pub to: String,
    /// Transform options.
    pub options: RuleOptions,
    /// Program and arguments for the `command` builder.
    pub command: Vec<String>,
}

/// The ordered containers and rules of a project.
#[derive(Debug, Clone)]
pub struct ResolvedLayout {
    /// Project name.
    pub name: String,
    /// Containers in registration order, the implicit output container last.
    pub containers: Vec<ResolvedContainer>,
    /// Rules in registration order.
    pub rules: Vec<ResolvedRule>,
    /// Extra suffix associations.
    pub content_types: Vec<ContentTypeConfig>,
    /// Failure policy.
    pub on_error: OnError,
}

impl ResolvedLayout {
    /// Looks up a container by id.
    pub fn container(&self, id: &str) -> Option<&ResolvedContainer> {
        self.containers.iter().find(|c| c.id == id)
    }

    /// Returns `true` if some rule reads from or writes to container `id`.
    pub fn is_referenced(&self, id: &str) -> bool {
        self.rules.iter().any(|r| r.source == id || r.target == id)
    }
}

fn same_path(a: &str, b: &str) -> bool {
    let norm = |p: &str| p.trim_start_matches("./").trim_end_matches('/').to_string();
    norm(a) == norm(b)
}

/// Resolves a validated configuration into an ordered layout.
///
/// When no container covers `project.output`, a binary container with id
/// `output` is appended for it. When no rule is declared, every source
/// container gets one rule into the output container using the default
/// builder.
pub fn resolve_layout(config: &ProjectConfig) -> Result<ResolvedLayout, ConfigError> {
    let build = &config.build;
    let mut containers: Vec<ResolvedContainer> = config
        .containers
        .iter()
        .map(|c| ResolvedContainer {
            id: c.id.clone(),
            kind: c.kind,
            path: PathBuf::from(&c.path),
            includes: c.includes.clone(),
            content_type: c
                .content_type
                .clone()
                .unwrap_or_else(|| build.source_type.clone()),
            implicit: false,
        })
        .collect();

    let output_id = match config
        .containers
        .iter()
        .find(|c| same_path(&c.path, &config.project.output))
    {
        Some(c) if c.kind == ContainerKind::External => {
            return Err(ConfigError::ValidationError(format!(
                "output path '{}' is declared as external container '{}'",
                config.project.output, c.id
            )));
        }
        Some(c) => c.id.clone(),
        None => {
            containers.push(ResolvedContainer {
                id: OUTPUT_CONTAINER.to_string(),
                kind: ContainerKind::Binary,
                path: PathBuf::from(&config.project.output),
                includes: ALL.to_string(),
                content_type: DEFAULT_TARGET_TYPE.to_string(),
                implicit: true,
            });
            OUTPUT_CONTAINER.to_string()
        }
    };

    let source_type_of = |id: &str| -> Result<String, ConfigError> {
        containers
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.content_type.clone())
            .ok_or_else(|| ConfigError::UnknownContainer(id.to_string()))
    };

    let mut rules = Vec::new();
    if config.rules.is_empty() {
        for c in containers.iter().filter(|c| c.kind == ContainerKind::Source) {
            rules.push(ResolvedRule {
                builder: build.default_builder.clone(),
                source: c.id.clone(),
                target: output_id.clone(),
                includes: ALL.to_string(),
                from: c.content_type.clone(),
                to: DEFAULT_TARGET_TYPE.to_string(),
                options: RuleOptions {
                    verify: build.verification,
                    emit_intermediates: build.emit_intermediates,
                },
                command: Vec::new(),
            });
        }
    } else {
        for rule in &config.rules {
            let from = match &rule.from {
                Some(from) => from.clone(),
                None => source_type_of(&rule.source)?,
            };
            rules.push(ResolvedRule {
                builder: rule
                    .builder
                    .clone()
                    .unwrap_or_else(|| build.default_builder.clone()),
                source: rule.source.clone(),
                target: rule.target.clone().unwrap_or_else(|| output_id.clone()),
                includes: rule.includes.clone(),
                from,
                to: rule
                    .to
                    .clone()
                    .unwrap_or_else(|| DEFAULT_TARGET_TYPE.to_string()),
                options: RuleOptions {
                    verify: rule.verify.unwrap_or(build.verification),
                    emit_intermediates: rule.emit_intermediates.unwrap_or(build.emit_intermediates),
                },
                command: rule.command.clone(),
            });
        }
    }

    Ok(ResolvedLayout {
        name: config.project.name.clone(),
        containers,
        rules,
        content_types: config.content_types.clone(),
        on_error: build.on_error,
    })
}
