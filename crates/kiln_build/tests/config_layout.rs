//! Projects loaded from `kiln.toml`.

use std::fs;
use std::path::Path;

use kiln_build::{BuildError, ConfigLayout, Project};
use kiln_common::Location;
use kiln_config::CONFIG_FILE;

fn project_dir(config: &str, sources: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(CONFIG_FILE), config).unwrap();
    for (rel, content) in sources {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    dir
}

fn open(dir: &Path) -> Project {
    Project::open(Box::new(ConfigLayout::new(dir))).unwrap()
}

const MINIMAL: &str = r#"
[project]
name = "demo"

[[containers]]
id = "src"
path = "src"
"#;

#[test]
fn default_rule_copies_into_output() {
    let dir = project_dir(MINIMAL, &[("src/a.src", "alpha"), ("src/pkg/b.src", "beta")]);
    let mut project = open(dir.path());
    assert!(project.is_config(&dir.path().join(CONFIG_FILE)));

    let report = project.build_all().unwrap();
    assert_eq!(report.written.len(), 2);
    assert_eq!(fs::read_to_string(dir.path().join("bin/a.il")).unwrap(), "alpha");
    assert_eq!(fs::read_to_string(dir.path().join("bin/pkg/b.il")).unwrap(), "beta");
}

#[test]
fn includes_restrict_sources() {
    let config = r#"
[project]
name = "demo"

[[containers]]
id = "src"
path = "src"
includes = "app/**"
"#;
    let dir = project_dir(config, &[("src/app/a.src", "a"), ("src/scratch/b.src", "b")]);
    let mut project = open(dir.path());
    project.build_all().unwrap();
    assert!(dir.path().join("bin/app/a.il").is_file());
    assert!(!dir.path().join("bin/scratch/b.il").exists());
}

#[test]
fn config_change_reconfigures_and_cleans() {
    let dir = project_dir(MINIMAL, &[("src/a.src", "alpha")]);
    let mut project = open(dir.path());
    project.build_all().unwrap();
    assert!(dir.path().join("bin/a.il").is_file());

    let config_path = dir.path().join(CONFIG_FILE);
    fs::write(&config_path, format!("{MINIMAL}\n[build]\nverification = false\n")).unwrap();
    project.changed(&config_path).unwrap();

    assert_eq!(project.delta().len(), 1);
    assert!(!dir.path().join("bin/a.il").exists());
    project.build().unwrap();
    assert!(dir.path().join("bin/a.il").is_file());
}

#[test]
fn custom_target_type_is_cleaned_by_a_fresh_project() {
    let config = format!("{MINIMAL}\n[[rules]]\nsource = \"src\"\nto = \"js\"\n");
    let dir = project_dir(&config, &[("src/a.src", "alpha")]);
    open(dir.path()).build_all().unwrap();
    let output = dir.path().join("bin/a.js");
    assert_eq!(fs::read_to_string(&output).unwrap(), "alpha");

    let mut project = open(dir.path());
    assert_eq!(project.clean().unwrap(), 1);
    assert!(!output.exists());
    assert!(fs::read_dir(dir.path().join("bin")).unwrap().next().is_none());
}

#[test]
fn broken_config_change_is_reported() {
    let dir = project_dir(MINIMAL, &[("src/a.src", "alpha")]);
    let mut project = open(dir.path());
    let config_path = dir.path().join(CONFIG_FILE);
    fs::write(&config_path, "[project\n").unwrap();
    assert!(matches!(
        project.changed(&config_path),
        Err(BuildError::Config(_))
    ));
}

#[cfg(unix)]
#[test]
fn command_builder_errors_map_to_sources() {
    let config = r#"
[project]
name = "demo"

[[containers]]
id = "src"
path = "src"

[[rules]]
builder = "command"
source = "src"
command = ["sh", "-c", "if grep -q oops; then echo \"$0:3:6: no oops allowed\" >&2; exit 1; fi; echo ok", "{input}"]
"#;
    let dir = project_dir(config, &[("src/a.src", "fine"), ("src/b.src", "an oops")]);
    let mut project = open(dir.path());

    let report = project.build_all().unwrap();
    assert_eq!(report.errors, 1);
    let b = Location::File(dir.path().join("src/b.src"));
    let markers = project.markers().for_resource(&b);
    assert_eq!(markers.len(), 1);
    assert_eq!((markers[0].start, markers[0].end), (3, 7));
    assert_eq!(markers[0].message, "no oops allowed");
}
