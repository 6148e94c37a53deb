//! Engine scenarios over live directory roots.
//!
//! Each test lays out a scratch project with a source root `S` and a binary
//! root `O`, drives the lifecycle operations and checks what lands on disk,
//! what stays in the delta and which markers are recorded.

use std::cell::RefCell;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::SystemTime;

use kiln_build::{
    BuildError, BuildKind, BuildRule, Notification, Product, Project, SourceUnit,
    StructuredError, Transform, TransformError, Workspace,
};
use kiln_common::{Location, PathId};
use kiln_config::OnError;
use kiln_store::{ContentType, EntryKey, Filter, Registry, Root, RootId, RootKind, RootSet};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helper: a transform that records its batches
// ---------------------------------------------------------------------------

type BatchLog = Rc<RefCell<Vec<Vec<String>>>>;

/// Wraps every source in brackets. A source containing `ERROR` raises a
/// structured error pointing at the word; one containing `FATAL` fails
/// outright.
struct Recorder {
    log: BatchLog,
    reported_file: Option<String>,
    with_origin: bool,
}

impl Recorder {
    fn new(log: &BatchLog) -> Self {
        Self {
            log: Rc::clone(log),
            reported_file: None,
            with_origin: false,
        }
    }

    fn reporting(mut self, filename: &str) -> Self {
        self.reported_file = Some(filename.to_string());
        self
    }

    fn with_origin(mut self) -> Self {
        self.with_origin = true;
        self
    }
}

impl Transform for Recorder {
    fn name(&self) -> &str {
        "record"
    }

    fn apply(&mut self, batch: &[SourceUnit]) -> Result<Vec<Product>, TransformError> {
        self.log
            .borrow_mut()
            .push(batch.iter().map(|u| u.key.id.to_string()).collect());
        let mut products = Vec::new();
        for unit in batch {
            let text = String::from_utf8_lossy(&unit.content);
            if let Some(at) = text.find("ERROR") {
                let filename = self
                    .reported_file
                    .clone()
                    .unwrap_or_else(|| unit.location.to_string());
                let err = StructuredError::new(filename, at, at + 4, "unexpected ERROR");
                let err = if self.with_origin {
                    err.with_origin(unit.key.clone())
                } else {
                    err
                };
                return Err(err.into());
            }
            if text.contains("FATAL") {
                return Err(TransformError::Failed("transform crashed".into()));
            }
            products.push(Product {
                id: unit.key.id.clone(),
                content: format!("[{text}]").into_bytes(),
            });
        }
        Ok(products)
    }
}

// ---------------------------------------------------------------------------
// Helper: scratch project
// ---------------------------------------------------------------------------

struct Fixture {
    dir: TempDir,
    s: RootId,
    o: RootId,
}

impl Fixture {
    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).unwrap()
    }

    fn mtime(&self, rel: &str) -> SystemTime {
        fs::metadata(self.path(rel)).unwrap().modified().unwrap()
    }

    fn source(&self, id: &str) -> EntryKey {
        EntryKey::new(self.s, PathId::parse(id), ContentType::SOURCE)
    }
}

fn registry() -> Arc<Registry> {
    Arc::new(Registry::standard())
}

/// `S(source) -> O(intermediate)` over `src/` and `out/`, with `a` and `b`
/// already written.
fn single_rule(transform: impl Transform + 'static, on_error: OnError) -> (Fixture, Project) {
    let dir = tempfile::tempdir().unwrap();
    let mut roots = RootSet::new();
    let s = roots.add(Root::live("S", RootKind::Source, dir.path().join("src"), registry()));
    let o = roots.add(Root::live("O", RootKind::Binary, dir.path().join("out"), registry()));
    let fx = Fixture { dir, s, o };
    fx.write("src/a.src", "alpha");
    fx.write("src/b.src", "beta");

    let rules = vec![BuildRule::new(
        s,
        ContentType::SOURCE,
        Filter::new("**", None).unwrap(),
        o,
        ContentType::INTERMEDIATE,
        Box::new(transform),
    )];
    let project = Project::new(Workspace {
        roots,
        sources: vec![(s, Filter::all(ContentType::SOURCE))],
        rules,
        on_error,
    });
    (fx, project)
}

fn marker_count(project: &Project, path: &Path) -> usize {
    project
        .markers()
        .for_resource(&Location::File(path.to_path_buf()))
        .len()
}

// ===========================================================================
// Full and incremental builds
// ===========================================================================

#[test]
fn build_all_builds_every_source() {
    let log = BatchLog::default();
    let (fx, mut project) = single_rule(Recorder::new(&log), OnError::Report);

    let report = project.build_all().unwrap();
    assert!(report.is_success());
    assert_eq!(report.written.len(), 2);
    assert_eq!(fx.read("out/a.il"), "[alpha]");
    assert_eq!(fx.read("out/b.il"), "[beta]");
    assert!(project.delta().is_empty());
    assert_eq!(*log.borrow(), [vec!["a".to_string(), "b".to_string()]]);
}

#[test]
fn changed_rebuilds_only_that_source() {
    let log = BatchLog::default();
    let (fx, mut project) = single_rule(Recorder::new(&log), OnError::Report);
    project.build_all().unwrap();
    let b_before = fx.mtime("out/b.il");

    let a = fx.write("src/a.src", "alpha2");
    project.changed(&a).unwrap();
    assert_eq!(project.delta().iter().collect::<Vec<_>>(), [&fx.source("a")]);

    let report = project.build().unwrap();
    assert_eq!(report.written, [EntryKey::new(fx.o, PathId::parse("a"), ContentType::INTERMEDIATE)]);
    assert_eq!(fx.read("out/a.il"), "[alpha2]");
    assert_eq!(fx.mtime("out/b.il"), b_before);
    assert_eq!(log.borrow().last().unwrap(), &["a".to_string()]);
    assert!(project.delta().is_empty());
}

#[test]
fn empty_delta_build_writes_nothing() {
    let log = BatchLog::default();
    let (fx, mut project) = single_rule(Recorder::new(&log), OnError::Report);
    project.build_all().unwrap();
    let before = (fx.mtime("out/a.il"), fx.mtime("out/b.il"));

    let report = project.build().unwrap();
    assert_eq!(report.batches, 0);
    assert!(report.written.is_empty());
    assert_eq!((fx.mtime("out/a.il"), fx.mtime("out/b.il")), before);
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn run_dispatches_build_kinds() {
    let log = BatchLog::default();
    let (fx, mut project) = single_rule(Recorder::new(&log), OnError::Report);
    assert_eq!(project.run(BuildKind::Incremental).unwrap().batches, 0);
    assert_eq!(project.run(BuildKind::Full).unwrap().written.len(), 2);
    assert!(fx.path("out/a.il").is_file());
}

// ===========================================================================
// Notifications
// ===========================================================================

#[test]
fn added_source_enters_delta() {
    let log = BatchLog::default();
    let (fx, mut project) = single_rule(Recorder::new(&log), OnError::Report);
    project.build_all().unwrap();

    let c = fx.write("src/pkg/c.src", "gamma");
    project.notify(&Notification::Added(c)).unwrap();
    assert!(project.delta().contains(&fx.source("pkg/c")));

    project.build().unwrap();
    assert_eq!(fx.read("out/pkg/c.il"), "[gamma]");
}

#[test]
fn unrelated_resources_are_ignored() {
    let log = BatchLog::default();
    let (fx, mut project) = single_rule(Recorder::new(&log), OnError::Report);

    let notes = fx.write("src/notes.txt", "hello");
    project.added(&notes).unwrap();
    project.changed(&notes).unwrap();
    let outside = fx.write("elsewhere/x.src", "x");
    project.added(&outside).unwrap();
    project.changed(&outside).unwrap();
    assert!(project.delta().is_empty());
}

#[test]
fn removed_cleans_and_drops_orphans() {
    let log = BatchLog::default();
    let (fx, mut project) = single_rule(Recorder::new(&log), OnError::Report);
    project.build_all().unwrap();

    let b = fx.path("src/b.src");
    fs::remove_file(&b).unwrap();
    project.notify(&Notification::Removed(b)).unwrap();

    assert!(!fx.path("out/a.il").exists());
    assert!(!fx.path("out/b.il").exists());
    assert_eq!(project.delta().iter().collect::<Vec<_>>(), [&fx.source("a")]);

    project.build().unwrap();
    assert!(fx.path("out/a.il").is_file());
    assert!(!fx.path("out/b.il").exists());
}

// ===========================================================================
// Clean
// ===========================================================================

#[test]
fn clean_deletes_targets_and_marks_every_source() {
    let log = BatchLog::default();
    let (fx, mut project) = single_rule(Recorder::new(&log), OnError::Report);
    project.build_all().unwrap();

    assert_eq!(project.clean().unwrap(), 2);
    assert!(!fx.path("out/a.il").exists());
    assert!(!fx.path("out/b.il").exists());
    assert!(fx.path("src/a.src").is_file());
    let delta: Vec<_> = project.delta().iter().cloned().collect();
    assert_eq!(delta, [fx.source("a"), fx.source("b")]);
}

// ===========================================================================
// Transform failures
// ===========================================================================

#[test]
fn located_error_becomes_one_marker() {
    let log = BatchLog::default();
    let (fx, mut project) = single_rule(Recorder::new(&log), OnError::Report);
    let b = fx.write("src/b.src", "let ERROR here");

    let report = project.build_all().unwrap();
    assert_eq!(report.errors, 1);
    assert!(!report.is_success());
    assert!(project.delta().is_empty());

    let markers = project
        .markers()
        .for_resource(&Location::File(b.clone()));
    assert_eq!(markers.len(), 1);
    assert_eq!((markers[0].start, markers[0].end), (4, 9));
    assert_eq!(markers[0].message, "unexpected ERROR");
    assert_eq!(project.markers().len(), 1);

    fx.write("src/b.src", "fixed");
    project.changed(&b).unwrap();
    assert!(project.build().unwrap().is_success());
    assert_eq!(marker_count(&project, &b), 0);
}

#[test]
fn fail_policy_propagates_after_marking() {
    let log = BatchLog::default();
    let (fx, mut project) = single_rule(Recorder::new(&log).with_origin(), OnError::Fail);
    let b = fx.write("src/b.src", "ERROR");

    let err = project.build_all().unwrap_err();
    assert!(matches!(err, BuildError::Transform(e) if e.start == 0));
    assert_eq!(marker_count(&project, &b), 1);
    assert!(project.delta().is_empty());
}

#[test]
fn unmapped_error_is_fatal() {
    let log = BatchLog::default();
    let recorder = Recorder::new(&log).reporting("/nowhere/x.src");
    let (fx, mut project) = single_rule(recorder, OnError::Report);
    fx.write("src/a.src", "ERROR");

    let err = project.build_all().unwrap_err();
    assert!(matches!(err, BuildError::UnmappedError { filename, .. } if filename == "/nowhere/x.src"));
    assert!(project.markers().is_empty());
    assert!(project.delta().is_empty());
}

#[test]
fn unlocated_failure_clears_delta() {
    let log = BatchLog::default();
    let (fx, mut project) = single_rule(Recorder::new(&log), OnError::Report);
    project.build_all().unwrap();
    let a = fx.write("src/a.src", "FATAL");
    project.changed(&a).unwrap();

    let err = project.build().unwrap_err();
    assert!(matches!(err, BuildError::Fatal { .. }));
    assert!(project.delta().is_empty());
}

#[test]
fn error_in_archive_member_is_mapped_by_rescan() {
    let log = BatchLog::default();
    let dir = tempfile::tempdir().unwrap();
    let zip_path = dir.path().join("std.zip");
    {
        let file = fs::File::create(&zip_path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("util/list.src", zip::write::FileOptions::<()>::default())
            .unwrap();
        zip.write_all(b"fn list").unwrap();
        zip.finish().unwrap();
    }
    let reported = format!("{}!/util/list.src", zip_path.display());

    let recorder = Recorder::new(&log).reporting(&reported);
    let (fx, mut project) = single_rule(recorder, OnError::Report);
    let lib = Root::archive("std", &zip_path, registry()).unwrap();
    project.roots_mut().add(lib);
    fx.write("src/a.src", "ERROR");

    let report = project.build_all().unwrap();
    assert_eq!(report.errors, 1);
    let marked = Location::from_reported(&reported);
    assert_eq!(project.markers().for_resource(&marked).len(), 1);
}

// ===========================================================================
// Chained rules
// ===========================================================================

/// `S(source) -> V(verification) -> O(intermediate)`, rules registered in
/// the given order.
fn chained(log: &BatchLog, downstream_first: bool) -> (TempDir, Project) {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/a.src"), "alpha").unwrap();

    let mut roots = RootSet::new();
    let s = roots.add(Root::live("S", RootKind::Source, dir.path().join("src"), registry()));
    let v = roots.add(Root::live("V", RootKind::Binary, dir.path().join("vc"), registry()));
    let o = roots.add(Root::live("O", RootKind::Binary, dir.path().join("out"), registry()));
    let first = BuildRule::new(
        s,
        ContentType::SOURCE,
        Filter::new("**", None).unwrap(),
        v,
        ContentType::VERIFICATION,
        Box::new(Recorder::new(log)),
    );
    let second = BuildRule::new(
        v,
        ContentType::VERIFICATION,
        Filter::new("**", None).unwrap(),
        o,
        ContentType::INTERMEDIATE,
        Box::new(Recorder::new(log)),
    );
    let rules = if downstream_first {
        vec![second, first]
    } else {
        vec![first, second]
    };
    let project = Project::new(Workspace {
        roots,
        sources: vec![(s, Filter::all(ContentType::SOURCE))],
        rules,
        on_error: OnError::Report,
    });
    (dir, project)
}

#[test]
fn chained_rules_update_every_stage() {
    let log = BatchLog::default();
    let (dir, mut project) = chained(&log, false);
    let report = project.build_all().unwrap();

    assert_eq!(report.written.len(), 2);
    assert_eq!(fs::read_to_string(dir.path().join("vc/a.vc")).unwrap(), "[alpha]");
    assert_eq!(fs::read_to_string(dir.path().join("out/a.il")).unwrap(), "[[alpha]]");
}

#[test]
fn registration_order_does_not_starve_downstream_rules() {
    let log = BatchLog::default();
    let (dir, mut project) = chained(&log, true);
    project.build_all().unwrap();
    let stale = fs::metadata(dir.path().join("out/a.il")).unwrap().modified().unwrap();

    fs::write(dir.path().join("src/a.src"), "alpha2").unwrap();
    project.changed(&dir.path().join("src/a.src")).unwrap();
    let report = project.build().unwrap();

    assert_eq!(report.batches, 2);
    assert_eq!(fs::read_to_string(dir.path().join("out/a.il")).unwrap(), "[[alpha2]]");
    assert!(fs::metadata(dir.path().join("out/a.il")).unwrap().modified().unwrap() >= stale);
}

#[test]
fn cyclic_rules_still_build_the_dirty_source() {
    let log = BatchLog::default();
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("a")).unwrap();
    fs::write(dir.path().join("a/x.src"), "alpha").unwrap();

    let mut roots = RootSet::new();
    let a = roots.add(Root::live("A", RootKind::Source, dir.path().join("a"), registry()));
    let b = roots.add(Root::live("B", RootKind::Binary, dir.path().join("b"), registry()));
    let rule = |from, to| {
        BuildRule::new(
            from,
            ContentType::SOURCE,
            Filter::new("**", None).unwrap(),
            to,
            ContentType::SOURCE,
            Box::new(Recorder::new(&log)),
        )
    };
    let rules = vec![rule(a, b), rule(b, a)];
    let mut project = Project::new(Workspace {
        roots,
        sources: vec![(a, Filter::all(ContentType::SOURCE))],
        rules,
        on_error: OnError::Report,
    });

    let report = project.build_all().unwrap();
    assert_eq!(report.batches, 2);
    assert_eq!(report.written.len(), 2);
    assert_eq!(fs::read_to_string(dir.path().join("b/x.src")).unwrap(), "[alpha]");
    assert_eq!(fs::read_to_string(dir.path().join("a/x.src")).unwrap(), "[[alpha]]");
    assert!(project.delta().is_empty());
}

#[test]
fn clean_reaches_every_stage() {
    let log = BatchLog::default();
    let (dir, mut project) = chained(&log, false);
    project.build_all().unwrap();
    assert_eq!(project.clean().unwrap(), 2);
    assert!(!dir.path().join("vc/a.vc").exists());
    assert!(!dir.path().join("out/a.il").exists());
}

// ===========================================================================
// Entry round trip through the engine's roots
// ===========================================================================

#[test]
fn write_refresh_read_through_project() {
    let log = BatchLog::default();
    let (fx, mut project) = single_rule(Recorder::new(&log), OnError::Report);
    let root = project.roots_mut().get_mut(fx.o).unwrap();
    let id = PathId::parse("deep/x");
    root.write(&id, &ContentType::BINARY, b"\x00\x01payload".to_vec())
        .unwrap();
    root.refresh().unwrap();
    assert_eq!(
        root.read(&id, &ContentType::BINARY).unwrap(),
        b"\x00\x01payload"
    );
}
