//! The build engine.
//!
//! A [`Project`] owns the roots and rules of one workspace and a single piece
//! of mutable state, the delta: the entries known to need rebuilding.
//! Notifications grow the delta, [`Project::build`] drains it.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use kiln_common::Location;
use kiln_config::OnError;
use kiln_diagnostics::{Marker, MarkerLog};
use kiln_store::{EntryKey, Filter, RootId, RootKind, RootSet};
use tracing::{debug, info, warn};

use crate::closure::{dependency_closure, produced};
use crate::error::BuildError;
use crate::layout::{Layout, Workspace};
use crate::rule::BuildRule;
use crate::transform::StructuredError;

/// A resource-change notification from whatever watches the sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The resource's content changed.
    Changed(PathBuf),
    /// The resource appeared.
    Added(PathBuf),
    /// The resource disappeared.
    Removed(PathBuf),
}

/// What a build request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildKind {
    /// Rebuild every source.
    Full,
    /// Rebuild what the delta and its dependents cover.
    Incremental,
}

/// Outcome of a build that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Targets written, in the order they were written.
    pub written: Vec<EntryKey>,
    /// Number of batches handed to transforms.
    pub batches: usize,
    /// Number of markers recorded.
    pub errors: usize,
}

impl BuildReport {
    /// Returns `true` if no marker was recorded.
    pub fn is_success(&self) -> bool {
        self.errors == 0
    }
}

/// An incremental build engine over one workspace.
pub struct Project {
    layout: Option<Box<dyn Layout>>,
    roots: RootSet,
    sources: Vec<(RootId, Filter)>,
    rules: Vec<BuildRule>,
    on_error: OnError,
    delta: BTreeSet<EntryKey>,
    markers: MarkerLog,
}

impl Project {
    /// Creates an engine over a fixed workspace. Without a layout, there is
    /// nothing to reconfigure from.
    pub fn new(workspace: Workspace) -> Self {
        let Workspace {
            roots,
            sources,
            rules,
            on_error,
        } = workspace;
        Self {
            layout: None,
            roots,
            sources,
            rules,
            on_error,
            delta: BTreeSet::new(),
            markers: MarkerLog::new(),
        }
    }

    /// Loads the workspace from `layout` and keeps it for reconfiguration.
    pub fn open(mut layout: Box<dyn Layout>) -> Result<Self, BuildError> {
        let workspace = layout.load()?;
        let mut project = Self::new(workspace);
        project.layout = Some(layout);
        Ok(project)
    }

    /// Returns the roots in registration order.
    pub fn roots(&self) -> &RootSet {
        &self.roots
    }

    /// Returns the roots for direct entry access.
    pub fn roots_mut(&mut self) -> &mut RootSet {
        &mut self.roots
    }

    /// Returns the rules in registration order.
    pub fn rules(&self) -> &[BuildRule] {
        &self.rules
    }

    /// Returns the entries waiting to be rebuilt.
    pub fn delta(&self) -> &BTreeSet<EntryKey> {
        &self.delta
    }

    /// Returns the problems recorded so far.
    pub fn markers(&self) -> &MarkerLog {
        &self.markers
    }

    /// Returns `true` if `resource` is the build-path declaration.
    pub fn is_config(&self, resource: &Path) -> bool {
        self.layout
            .as_ref()
            .and_then(|l| l.config_file())
            .is_some_and(|c| c == resource)
    }

    /// Returns the key of every source in every source-capable root.
    pub fn source_keys(&mut self) -> Result<Vec<EntryKey>, BuildError> {
        let mut keys = Vec::new();
        for (id, filter) in &self.sources {
            let root = self.roots.get_mut(*id).ok_or(BuildError::MissingRoot(*id))?;
            keys.extend(root.get_all(filter)?);
        }
        Ok(keys)
    }

    /// Returns the physical files of every source.
    pub fn source_files(&mut self) -> Result<Vec<PathBuf>, BuildError> {
        let mut files = Vec::new();
        for key in self.source_keys()? {
            if let Some(Location::File(path)) = self.location_of(&key)? {
                files.push(path);
            }
        }
        Ok(files)
    }

    fn location_of(&mut self, key: &EntryKey) -> Result<Option<Location>, BuildError> {
        let Some(root) = self.roots.get_mut(key.root) else {
            return Ok(None);
        };
        Ok(root
            .get(&key.id, &key.content_type)?
            .map(|e| e.location().clone()))
    }

    fn is_referenced(&self, root: RootId) -> bool {
        self.rules
            .iter()
            .any(|r| r.source() == root || r.target() == root)
    }

    /// Dispatches a notification.
    pub fn notify(&mut self, notification: &Notification) -> Result<(), BuildError> {
        match notification {
            Notification::Changed(path) => self.changed(path),
            Notification::Added(path) => self.added(path),
            Notification::Removed(path) => self.removed(path),
        }
    }

    /// Marks the source stored at `resource` dirty.
    ///
    /// A change to the build-path declaration reloads the workspace and
    /// cleans it instead. Resources no source root tracks are ignored.
    pub fn changed(&mut self, resource: &Path) -> Result<(), BuildError> {
        if self.is_config(resource) {
            info!(resource = %resource.display(), "build path changed, reconfiguring");
            self.reconfigure()?;
            self.clean()?;
            return Ok(());
        }
        let location = Location::File(resource.to_path_buf());
        for (id, filter) in &self.sources {
            let root = self.roots.get_mut(*id).ok_or(BuildError::MissingRoot(*id))?;
            let Some(key) = root.find_by_location(&location)? else {
                continue;
            };
            if !filter.matches(&key.id, &key.content_type) {
                continue;
            }
            root.refresh_entry(&key.id, &key.content_type)?;
            debug!(resource = %location, entry = %key, "source changed");
            self.delta.insert(key);
            return Ok(());
        }
        debug!(resource = %location, "ignoring change to untracked resource");
        Ok(())
    }

    /// Enters a new source into the first source root that claims it and
    /// marks it dirty.
    pub fn added(&mut self, resource: &Path) -> Result<(), BuildError> {
        if self.is_config(resource) {
            return self.changed(resource);
        }
        let location = Location::File(resource.to_path_buf());
        for (id, filter) in &self.sources {
            let root = self.roots.get_mut(*id).ok_or(BuildError::MissingRoot(*id))?;
            let Some(key) = root.claim(&location)? else {
                continue;
            };
            if !filter.matches(&key.id, &key.content_type) {
                continue;
            }
            debug!(resource = %location, entry = %key, "source added");
            self.delta.insert(key);
            return Ok(());
        }
        debug!(resource = %location, "ignoring unclaimed resource");
        Ok(())
    }

    /// Refreshes every root and cleans the project.
    ///
    /// Working out which targets a deletion invalidates costs about as much
    /// as rebuilding, so every source is marked dirty. Targets of the removed
    /// source are deleted along with the rest.
    pub fn removed(&mut self, resource: &Path) -> Result<(), BuildError> {
        info!(resource = %resource.display(), "resource removed, refreshing every root");
        let location = Location::File(resource.to_path_buf());
        let mut previous = self.source_keys()?;
        for (id, filter) in &self.sources {
            let key = self.roots.get(*id).and_then(|r| r.key_for(&location));
            if let Some(key) = key.filter(|k| filter.matches(&k.id, &k.content_type)) {
                previous.push(key);
            }
        }
        self.refresh_roots()?;
        self.clean_from(previous)?;
        Ok(())
    }

    fn refresh_roots(&mut self) -> Result<(), BuildError> {
        let mut failed = Vec::new();
        for root in self.roots.iter_mut() {
            if let Err(e) = root.refresh() {
                failed.push((root.id(), root.name().to_string(), e));
            }
        }
        for (id, name, e) in failed {
            if self.is_referenced(id) {
                return Err(e.into());
            }
            warn!(root = %name, error = %e, "skipping unavailable root");
        }
        Ok(())
    }

    fn reconfigure(&mut self) -> Result<(), BuildError> {
        let Some(layout) = self.layout.as_mut() else {
            debug!("no layout to reload");
            return Ok(());
        };
        let Workspace {
            roots,
            sources,
            rules,
            on_error,
        } = layout.load()?;
        self.roots = roots;
        self.sources = sources;
        self.rules = rules;
        self.on_error = on_error;
        self.delta.clear();
        Ok(())
    }

    /// Deletes every generated target and marks every source dirty.
    ///
    /// Returns the number of artifacts deleted.
    pub fn clean(&mut self) -> Result<usize, BuildError> {
        self.clean_from(Vec::new())
    }

    /// Cleans, also deleting the targets of `previous` sources that may no
    /// longer exist.
    fn clean_from(&mut self, previous: Vec<EntryKey>) -> Result<usize, BuildError> {
        self.delta.clear();
        let sources = self.source_keys()?;
        self.delta.extend(sources);

        let seed = self.delta.iter().cloned().chain(previous);
        let targets = produced(&self.rules, &dependency_closure(&self.rules, seed));
        let mut deleted = 0;
        for key in targets.difference(&self.delta) {
            let root = self
                .roots
                .get_mut(key.root)
                .ok_or(BuildError::MissingRoot(key.root))?;
            if root.kind() == RootKind::External {
                continue;
            }
            if root.delete(&key.id, &key.content_type)? {
                deleted += 1;
            }
        }
        info!(deleted, delta = self.delta.len(), "cleaned project");
        Ok(deleted)
    }

    /// Rebuilds the delta and everything downstream of it.
    ///
    /// The delta is empty afterwards, whatever the outcome.
    pub fn build(&mut self) -> Result<BuildReport, BuildError> {
        let result = self.build_delta();
        self.delta.clear();
        result
    }

    /// Marks every source dirty and builds.
    pub fn build_all(&mut self) -> Result<BuildReport, BuildError> {
        self.delta.clear();
        let keys = self.source_keys()?;
        self.delta.extend(keys);
        self.build()
    }

    /// Runs a build of the given kind.
    pub fn run(&mut self, kind: BuildKind) -> Result<BuildReport, BuildError> {
        match kind {
            BuildKind::Full => self.build_all(),
            BuildKind::Incremental => self.build(),
        }
    }

    fn build_delta(&mut self) -> Result<BuildReport, BuildError> {
        let mut report = BuildReport::default();
        if self.delta.is_empty() {
            debug!("nothing to build");
            return Ok(report);
        }
        info!(delta = self.delta.len(), "building");

        let delta: Vec<EntryKey> = self.delta.iter().cloned().collect();
        for key in &delta {
            if let Some(location) = self.location_of(key)? {
                self.markers.clear(&location);
            }
        }

        let affected = dependency_closure(&self.rules, delta.iter().cloned());
        // Targets produced in this build wait until they have been written.
        // Dirty entries are current already, even when a cycle produces them.
        let pending: BTreeSet<EntryKey> = produced(&self.rules, &affected)
            .difference(&self.delta)
            .cloned()
            .collect();
        let mut written: BTreeSet<EntryKey> = BTreeSet::new();
        let mut applied: Vec<BTreeSet<EntryKey>> = vec![BTreeSet::new(); self.rules.len()];

        let failure = 'passes: loop {
            let mut progress = false;
            for (i, rule) in self.rules.iter_mut().enumerate() {
                let mut batch = Vec::new();
                for key in &affected {
                    if !rule.accepts(key) || applied[i].contains(key) {
                        continue;
                    }
                    if pending.contains(key) && !written.contains(key) {
                        continue;
                    }
                    let root = self
                        .roots
                        .get_mut(key.root)
                        .ok_or(BuildError::MissingRoot(key.root))?;
                    if root.exists(&key.id, &key.content_type)? {
                        batch.push(key.clone());
                    }
                }
                if batch.is_empty() {
                    continue;
                }
                applied[i].extend(batch.iter().cloned());
                report.batches += 1;
                match rule.apply(&batch, &mut self.roots) {
                    Ok(keys) => {
                        for key in keys {
                            if written.insert(key.clone()) {
                                progress = true;
                                report.written.push(key);
                            }
                        }
                    }
                    Err(BuildError::Transform(err)) => break 'passes Some(err),
                    Err(e) => return Err(e),
                }
            }
            if !progress {
                break None;
            }
        };

        if let Some(err) = failure {
            return self.record_error(err, report);
        }
        info!(
            written = report.written.len(),
            batches = report.batches,
            "build finished"
        );
        Ok(report)
    }

    fn record_error(
        &mut self,
        err: StructuredError,
        mut report: BuildReport,
    ) -> Result<BuildReport, BuildError> {
        let Some(location) = self.locate_error(&err)? else {
            return Err(BuildError::UnmappedError {
                filename: err.filename,
                message: err.message,
            });
        };
        warn!(resource = %location, message = %err.message, "transform reported an error");
        self.markers.report(Marker::error(
            location,
            err.start,
            err.end,
            err.message.clone(),
        ));
        report.errors += 1;
        match self.on_error {
            OnError::Report => Ok(report),
            OnError::Fail => Err(BuildError::Transform(err)),
        }
    }

    /// Finds where a transform error belongs: the entry it names, or else
    /// whichever entry is stored under the reported filename.
    fn locate_error(&mut self, err: &StructuredError) -> Result<Option<Location>, BuildError> {
        if let Some(origin) = &err.origin {
            if let Some(location) = self.location_of(origin)? {
                return Ok(Some(location));
            }
        }
        let reported = Location::from_reported(&err.filename);
        for root in self.roots.iter_mut() {
            if let Some(key) = root.find_by_location(&reported)? {
                debug!(entry = %key, "mapped transform error by location");
                return Ok(Some(reported));
            }
        }
        Ok(None)
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("roots", &self.roots.len())
            .field("rules", &self.rules)
            .field("delta", &self.delta)
            .finish()
    }
}
