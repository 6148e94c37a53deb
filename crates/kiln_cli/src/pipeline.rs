//! Shared helpers for CLI commands: project root resolution, opening the
//! engine and the change tracker, and marker output.

use std::path::{Path, PathBuf};

use kiln_build::{ConfigLayout, Notification, Project};
use kiln_cache::{ChangeSet, ChangeTracker, CACHE_DIR};
use kiln_common::ContentHash;
use kiln_config::CONFIG_FILE;
use kiln_diagnostics::{MarkerRenderer, TerminalRenderer};

use crate::GlobalArgs;

/// Walks up from `start` looking for the nearest directory containing
/// `kiln.toml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Resolves the absolute project root from global CLI args.
///
/// If `--config` is specified, uses that path (file → parent dir, dir →
/// itself). Otherwise walks up from the current directory.
pub fn resolve_project_root(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let root = match &global.config {
        Some(config_path) => {
            let p = PathBuf::from(config_path);
            if p.is_file() {
                p.parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."))
            } else {
                p
            }
        }
        None => find_project_root(&std::env::current_dir()?)?,
    };
    // Tools report absolute paths; locations must match them.
    Ok(std::fs::canonicalize(&root)
        .map_err(|e| format!("cannot open project at {}: {e}", root.display()))?)
}

/// Loads the engine for the project in `project_dir`.
pub fn open_project(project_dir: &Path) -> Result<Project, Box<dyn std::error::Error>> {
    Ok(Project::open(Box::new(ConfigLayout::new(project_dir)))?)
}

/// Opens the snapshot of the last successful build.
pub fn open_tracker(project_dir: &Path) -> ChangeTracker {
    ChangeTracker::open(&project_dir.join(CACHE_DIR), env!("CARGO_PKG_VERSION"))
}

/// Hashes the build-path declaration, if it can be read.
pub fn config_hash(project_dir: &Path) -> Option<ContentHash> {
    std::fs::read(project_dir.join(CONFIG_FILE))
        .ok()
        .map(|bytes| ContentHash::from_bytes(&bytes))
}

/// Turns a snapshot diff into engine notifications, removals first.
pub fn notifications(changes: &ChangeSet) -> Vec<Notification> {
    let removed = changes.deleted_files.iter().cloned().map(Notification::Removed);
    let added = changes.new_files.iter().cloned().map(Notification::Added);
    let changed = changes.modified_files.iter().cloned().map(Notification::Changed);
    removed.chain(added).chain(changed).collect()
}

/// Returns `path` relative to `base` for display.
pub fn display_path(path: &Path, base: &Path) -> String {
    path.strip_prefix(base).unwrap_or(path).display().to_string()
}

/// Prints every recorded marker to stderr. Returns how many were printed.
pub fn render_markers(project: &Project, global: &GlobalArgs) -> usize {
    let renderer = TerminalRenderer::new(global.color);
    let mut count = 0;
    for marker in project.markers().iter() {
        let text = marker
            .resource
            .as_file()
            .and_then(|p| std::fs::read_to_string(p).ok());
        eprint!("{}", renderer.render(marker, text.as_deref()));
        count += 1;
    }
    count
}
