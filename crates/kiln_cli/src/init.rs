//! `kiln init`: project scaffolding command.
//!
//! Creates a `kiln.toml` declaring one source container `src` compiled into
//! the default `bin` output folder, plus a sample source file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use kiln_config::CONFIG_FILE;

use crate::GlobalArgs;

const SAMPLE_SOURCE: &str = "// Sources in src/ are compiled into bin/.\nmain {\n}\n";

/// Runs the `kiln init` command.
///
/// If `name` is `Some`, creates a new subdirectory with that name.
/// Otherwise initializes in the current working directory.
pub fn run(name: Option<String>, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project_dir = match &name {
        Some(n) => {
            let dir = PathBuf::from(n);
            if dir.exists() {
                return Err(format!("directory '{n}' already exists").into());
            }
            fs::create_dir_all(&dir)?;
            dir
        }
        None => std::env::current_dir()?,
    };
    if project_dir.join(CONFIG_FILE).exists() {
        return Err(format!("{CONFIG_FILE} already exists in {}", project_dir.display()).into());
    }

    let project_name = project_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("my_project")
        .to_string();

    if !global.quiet {
        eprintln!("  Creating new kiln project `{project_name}`");
    }
    let created = scaffold(&project_dir, &project_name)?;
    if !global.quiet {
        for path in created {
            eprintln!("     Created {}", path.display());
        }
    }
    Ok(0)
}

/// Writes the project files into `root`. Returns the files created.
pub(crate) fn scaffold(root: &Path, name: &str) -> io::Result<Vec<PathBuf>> {
    fs::create_dir_all(root.join("src"))?;

    let config = root.join(CONFIG_FILE);
    fs::write(&config, config_template(name))?;

    let sample = root.join("src").join("main.src");
    fs::write(&sample, SAMPLE_SOURCE)?;

    let ignore = root.join(".gitignore");
    if !ignore.exists() {
        fs::write(&ignore, "/bin/\n/.kiln/\n")?;
    }
    Ok(vec![config, sample])
}

fn config_template(name: &str) -> String {
    format!(
        r#"[project]
name = "{name}"
version = "0.1.0"
output = "bin"

[[containers]]
id = "src"
path = "src"

# Without rules, every source container is copied into the output folder.
# [[rules]]
# builder = "command"
# source = "src"
# command = ["mycompiler", "--verify={{verify}}", "{{input}}"]

[build]
verification = true
on_error = "report"
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_config::{load_config, resolve_layout};

    #[test]
    fn scaffold_creates_project_files() {
        let dir = tempfile::tempdir().unwrap();
        let created = scaffold(dir.path(), "demo").unwrap();
        assert_eq!(created.len(), 2);
        assert!(dir.path().join(CONFIG_FILE).is_file());
        assert!(dir.path().join("src/main.src").is_file());
        assert!(dir.path().join(".gitignore").is_file());
    }

    #[test]
    fn generated_config_resolves() {
        let dir = tempfile::tempdir().unwrap();
        scaffold(dir.path(), "demo").unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.project.name, "demo");
        let layout = resolve_layout(&config).unwrap();
        assert_eq!(layout.rules.len(), 1);
        assert_eq!(layout.rules[0].source, "src");
    }

    #[test]
    fn template_keeps_placeholders_literal() {
        let text = config_template("x");
        assert!(text.contains("\"{input}\""));
        assert!(text.contains("--verify={verify}"));
    }

    #[test]
    fn init_existing_dir_error() {
        let dir = tempfile::tempdir().unwrap();
        let global = GlobalArgs {
            quiet: true,
            color: false,
            config: None,
        };
        let err = run(Some(dir.path().display().to_string()), &global).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn init_named_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("fresh");
        let global = GlobalArgs {
            quiet: true,
            color: false,
            config: None,
        };
        assert_eq!(run(Some(target.display().to_string()), &global).unwrap(), 0);
        assert!(target.join(CONFIG_FILE).is_file());
        let config = load_config(&target).unwrap();
        assert_eq!(config.project.name, "fresh");
    }
}
