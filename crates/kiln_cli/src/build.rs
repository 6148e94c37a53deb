//! `kiln build`: full and incremental builds.
//!
//! There is no watcher between runs, so the change feed is recovered by
//! diffing the sources against the snapshot of the last successful build:
//! new files are added, modified files changed and missing files removed.
//! A changed `kiln.toml` reconfigures the project. Without a usable
//! snapshot, or with `--all`, every source is rebuilt.

use std::path::Path;

use kiln_build::{BuildKind, Project};
use kiln_cache::ChangeTracker;
use kiln_common::ContentHash;
use kiln_config::{load_config, CONFIG_FILE};
use tracing::debug;

use crate::pipeline::{
    config_hash, notifications, open_project, open_tracker, render_markers, resolve_project_root,
};
use crate::{BuildArgs, GlobalArgs};

/// Runs the `kiln build` command.
///
/// Returns exit code 0 on success and 1 if a transform reported errors.
/// The snapshot is only recorded after a clean build, so failed sources are
/// retried next time.
pub fn run(args: &BuildArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project_dir = resolve_project_root(global)?;
    let config = load_config(&project_dir)?;
    if !global.quiet {
        eprintln!("   Building {} v{}", config.project.name, config.project.version);
    }

    let mut project = open_project(&project_dir)?;
    let mut tracker = open_tracker(&project_dir);
    let config_hash = config_hash(&project_dir);

    let kind = plan(args, &tracker, config_hash, &mut project, &project_dir)?;
    debug!(?kind, delta = project.delta().len(), "starting build");
    let result = project.run(kind);
    let errors = render_markers(&project, global);
    let report = result?;

    if errors > 0 || !report.is_success() {
        eprintln!("error: build failed with {errors} error(s)");
        return Ok(1);
    }
    tracker.record(config_hash, &project.source_files()?)?;
    if !global.quiet {
        eprintln!("    Finished {} artifact(s) written", report.written.len());
    }
    Ok(0)
}

/// Feeds the engine the changes since the snapshot and picks the build kind.
fn plan(
    args: &BuildArgs,
    tracker: &ChangeTracker,
    config_hash: Option<ContentHash>,
    project: &mut Project,
    project_dir: &Path,
) -> Result<BuildKind, Box<dyn std::error::Error>> {
    if args.all || !tracker.has_snapshot() {
        return Ok(BuildKind::Full);
    }
    if tracker.config_changed(config_hash) {
        project.changed(&project_dir.join(CONFIG_FILE))?;
        return Ok(BuildKind::Incremental);
    }
    let changes = tracker.detect(&project.source_files()?);
    debug!(
        dirty = changes.dirty_count(),
        deleted = changes.deleted_files.len(),
        "detected changes"
    );
    for notification in notifications(&changes) {
        project.notify(&notification)?;
    }
    Ok(BuildKind::Incremental)
}
