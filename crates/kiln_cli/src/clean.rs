//! `kiln clean`: deletes generated artifacts and forgets the snapshot.

use crate::pipeline::{open_project, open_tracker, resolve_project_root};
use crate::GlobalArgs;

/// Runs the `kiln clean` command.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project_dir = resolve_project_root(global)?;
    let mut project = open_project(&project_dir)?;
    let deleted = project.clean()?;
    open_tracker(&project_dir).discard()?;
    if !global.quiet {
        eprintln!("     Cleaned {deleted} artifact(s)");
    }
    Ok(0)
}
