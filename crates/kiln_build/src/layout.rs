//! Turning a build-path declaration into roots and rules.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_config::{
    load_config, resolve_layout, ContainerKind, ConfigError, OnError, ResolvedLayout, CONFIG_FILE,
};
use kiln_store::{
    ArchiveStorage, Association, ContentType, Filter, Registry, Root, RootId, RootKind, RootSet,
};
use tracing::{debug, warn};

use crate::error::BuildError;
use crate::rule::BuildRule;
use crate::transforms::{Builtins, TransformFactory, TransformSpec};

/// Everything an engine runs on.
#[derive(Debug, Default)]
pub struct Workspace {
    /// Roots in registration order.
    pub roots: RootSet,
    /// Source-capable roots and the filter selecting their sources.
    pub sources: Vec<(RootId, Filter)>,
    /// Rules in registration order.
    pub rules: Vec<BuildRule>,
    /// What a located transform error does to the build.
    pub on_error: OnError,
}

/// A source of [`Workspace`]s the engine can reload on reconfiguration.
pub trait Layout {
    /// The file whose change forces a reconfiguration, if any.
    fn config_file(&self) -> Option<&Path>;

    /// Builds a fresh workspace.
    fn load(&mut self) -> Result<Workspace, BuildError>;
}

/// Loads the workspace from `kiln.toml` in a project directory.
pub struct ConfigLayout {
    project_dir: PathBuf,
    config_file: PathBuf,
    factory: Box<dyn TransformFactory>,
}

impl ConfigLayout {
    /// Creates a layout using the built-in transforms.
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self::with_factory(project_dir, Box::new(Builtins))
    }

    /// Creates a layout whose rules get their transforms from `factory`.
    pub fn with_factory(project_dir: impl Into<PathBuf>, factory: Box<dyn TransformFactory>) -> Self {
        let project_dir = project_dir.into();
        let config_file = project_dir.join(CONFIG_FILE);
        Self {
            project_dir,
            config_file,
            factory,
        }
    }

    /// Returns the project directory.
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }
}

impl Layout for ConfigLayout {
    fn config_file(&self) -> Option<&Path> {
        Some(&self.config_file)
    }

    fn load(&mut self) -> Result<Workspace, BuildError> {
        let config = load_config(&self.project_dir)?;
        let layout = resolve_layout(&config)?;
        build_workspace(&self.project_dir, &layout, self.factory.as_ref())
    }
}

fn registry_for(layout: &ResolvedLayout) -> Result<Registry, BuildError> {
    let mut registry = layout
        .content_types
        .iter()
        .fold(Registry::standard(), |registry, ct| {
            let assoc = Association::new(&ct.suffix, ContentType::new(&ct.content_type));
            let assoc = match &ct.magic {
                Some(magic) => assoc.with_magic(magic.as_bytes()),
                None => assoc,
            };
            registry.with(assoc)
        });

    // Every type a rule or container names needs a suffix that maps back to it.
    let named = layout
        .containers
        .iter()
        .map(|c| c.content_type.as_str())
        .chain(layout.rules.iter().flat_map(|r| [r.from.as_str(), r.to.as_str()]));
    for name in named {
        let content_type = ContentType::new(name);
        if registry.materializes(&content_type) {
            continue;
        }
        if content_type.is_untyped()
            || name.is_empty()
            || name.contains(['.', '/', '\\'])
            || registry.is_recognized(name)
        {
            return Err(ConfigError::ValidationError(format!(
                "content type '{name}' has no suffix; declare one in [[content_types]]"
            ))
            .into());
        }
        debug!(content_type = %name, "using the type name as its suffix");
        registry = registry.with(Association::new(name, content_type));
    }
    Ok(registry)
}

/// Instantiates roots and rules for a resolved layout.
///
/// Container paths are taken relative to `project_dir`. An external
/// archive that cannot be opened is skipped unless a rule uses it.
pub fn build_workspace(
    project_dir: &Path,
    layout: &ResolvedLayout,
    factory: &dyn TransformFactory,
) -> Result<Workspace, BuildError> {
    let registry = Arc::new(registry_for(layout)?);
    let mut workspace = Workspace {
        on_error: layout.on_error,
        ..Workspace::default()
    };

    for container in &layout.containers {
        let path = project_dir.join(&container.path);
        let kind = match container.kind {
            ContainerKind::Source => RootKind::Source,
            ContainerKind::Binary => RootKind::Binary,
            ContainerKind::External => RootKind::External,
        };
        let root = if kind == RootKind::External && ArchiveStorage::is_archive(&path) {
            match Root::archive(&container.id, &path, Arc::clone(&registry)) {
                Ok(root) => root,
                Err(source) if layout.is_referenced(&container.id) => {
                    return Err(BuildError::Unavailable {
                        id: container.id.clone(),
                        source,
                    });
                }
                Err(e) => {
                    warn!(container = %container.id, error = %e, "skipping unavailable library");
                    continue;
                }
            }
        } else {
            Root::live(&container.id, kind, path, Arc::clone(&registry))
        };
        let id = workspace.roots.add(root);
        debug!(container = %container.id, %kind, "registered root");
        if kind == RootKind::Source {
            let filter = Filter::new(
                &container.includes,
                Some(ContentType::new(&container.content_type)),
            )?;
            workspace.sources.push((id, filter));
        }
    }

    let root_id = |name: &str| {
        workspace
            .roots
            .by_name(name)
            .ok_or_else(|| ConfigError::UnknownContainer(name.to_string()))
    };
    let mut rules = Vec::with_capacity(layout.rules.len());
    for rule in &layout.rules {
        let source = root_id(&rule.source)?;
        let target = root_id(&rule.target)?;
        let transform = factory.create(&TransformSpec {
            builder: &rule.builder,
            options: rule.options,
            command: &rule.command,
            project_dir,
        })?;
        rules.push(BuildRule::new(
            source,
            ContentType::new(&rule.from),
            Filter::new(&rule.includes, None)?,
            target,
            ContentType::new(&rule.to),
            transform,
        ));
    }
    workspace.rules = rules;
    Ok(workspace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_config::load_config_from_str;

    fn layout(toml: &str) -> ResolvedLayout {
        resolve_layout(&load_config_from_str(toml).unwrap()).unwrap()
    }

    #[test]
    fn containers_become_roots_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(
            r#"
[project]
name = "demo"

[[containers]]
id = "src"
path = "src"

[[containers]]
id = "lib"
kind = "external"
path = "lib"
"#,
        );
        let ws = build_workspace(dir.path(), &layout, &Builtins).unwrap();
        let names: Vec<_> = ws.roots.iter().map(|r| r.name().to_string()).collect();
        assert_eq!(names, ["src", "lib", "output"]);
        assert_eq!(ws.sources.len(), 1);
        assert_eq!(ws.rules.len(), 1);
        assert_eq!(ws.rules[0].source(), ws.sources[0].0);
        assert_eq!(ws.roots.get(ws.rules[0].target()).unwrap().kind(), RootKind::Binary);
        assert_eq!(ws.roots.get(RootId(1)).unwrap().kind(), RootKind::External);
    }

    #[test]
    fn missing_unreferenced_archive_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(
            r#"
[project]
name = "demo"

[[containers]]
id = "src"
path = "src"

[[containers]]
id = "std"
kind = "external"
path = "lib/std.zip"
"#,
        );
        let ws = build_workspace(dir.path(), &layout, &Builtins).unwrap();
        assert!(ws.roots.by_name("std").is_none());
        assert_eq!(ws.roots.len(), 2);
    }

    #[test]
    fn missing_referenced_archive_fails() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(
            r#"
[project]
name = "demo"

[[containers]]
id = "std"
kind = "external"
path = "lib/std.zip"

[[rules]]
source = "std"
"#,
        );
        let err = build_workspace(dir.path(), &layout, &Builtins).unwrap_err();
        assert!(matches!(err, BuildError::Unavailable { id, .. } if id == "std"));
    }

    #[test]
    fn unknown_builder_fails_loading() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(
            r#"
[project]
name = "demo"

[[containers]]
id = "src"
path = "src"

[[rules]]
builder = "javac"
source = "src"
"#,
        );
        assert!(matches!(
            build_workspace(dir.path(), &layout, &Builtins),
            Err(BuildError::UnknownBuilder(_))
        ));
    }

    #[test]
    fn undeclared_types_get_their_own_suffix() {
        let layout = layout(
            r#"
[project]
name = "demo"

[[containers]]
id = "src"
path = "src"

[[rules]]
source = "src"
to = "js"

[[rules]]
source = "src"
to = "map"

[[content_types]]
suffix = "jsmap"
content_type = "map"
"#,
        );
        let registry = registry_for(&layout).unwrap();
        let js = ContentType::new("js");
        assert_eq!(registry.suffix_for(&js), "js");
        assert_eq!(registry.associate("js", || None), js);
        assert_eq!(registry.suffix_for(&ContentType::new("map")), "jsmap");
    }

    #[test]
    fn type_named_after_a_taken_suffix_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(
            r#"
[project]
name = "demo"

[[containers]]
id = "src"
path = "src"

[[rules]]
source = "src"
to = "il"
"#,
        );
        assert!(matches!(
            build_workspace(dir.path(), &layout, &Builtins),
            Err(BuildError::Config(ConfigError::ValidationError(_)))
        ));
    }

    #[test]
    fn config_layout_reads_project_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[project]\nname = \"demo\"\n\n[[containers]]\nid = \"src\"\npath = \"src\"\n",
        )
        .unwrap();
        let mut layout = ConfigLayout::new(dir.path());
        assert_eq!(layout.config_file(), Some(dir.path().join(CONFIG_FILE).as_path()));
        let ws = layout.load().unwrap();
        assert_eq!(ws.rules.len(), 1);
        assert_eq!(ws.on_error, OnError::Report);
    }
}
