//! `kiln status`: lists what the next build would pick up.

use kiln_config::CONFIG_FILE;

use crate::pipeline::{
    config_hash, display_path, open_project, open_tracker, resolve_project_root,
};
use crate::GlobalArgs;

/// Runs the `kiln status` command.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project_dir = resolve_project_root(global)?;
    let mut project = open_project(&project_dir)?;
    let tracker = open_tracker(&project_dir);

    if !tracker.has_snapshot() {
        println!("no previous build; the next build rebuilds everything");
        return Ok(0);
    }
    if tracker.config_changed(config_hash(&project_dir)) {
        println!("{CONFIG_FILE} changed; the next build rebuilds everything");
        return Ok(0);
    }

    let changes = tracker.detect(&project.source_files()?);
    if changes.is_empty() {
        println!("up to date");
        return Ok(0);
    }
    let groups = [
        ("new", &changes.new_files),
        ("modified", &changes.modified_files),
        ("deleted", &changes.deleted_files),
    ];
    for (label, files) in groups {
        for file in files {
            println!("{label:>9}: {}", display_path(file, &project_dir));
        }
    }
    Ok(0)
}
