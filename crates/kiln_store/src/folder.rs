//! Lazily scanned folder tree.

use std::collections::BTreeMap;

use kiln_common::{Location, PathId};
use tracing::debug;

use crate::content::ContentType;
use crate::entry::Entry;
use crate::error::StoreError;
use crate::filter::Filter;
use crate::registry::Registry;
use crate::storage::{Listing, Storage};

/// Children of a scanned folder, keyed for deterministic traversal.
#[derive(Debug, Clone, Default)]
pub(crate) struct Contents {
    pub(crate) folders: BTreeMap<String, Folder>,
    pub(crate) entries: BTreeMap<(String, ContentType), Entry>,
}

impl Contents {
    fn load(id: &PathId, storage: &dyn Storage, registry: &Registry) -> Result<Self, StoreError> {
        let mut listing = storage.list(id)?;
        listing.sort_by(|a, b| listing_key(a).cmp(&listing_key(b)));

        let peek_len = registry.peek_len();
        let mut contents = Contents::default();
        for item in listing {
            match item {
                Listing::Folder(name) => {
                    let child = Folder::new(id.append(name.clone()));
                    contents.folders.insert(name, child);
                }
                Listing::File {
                    stem,
                    suffix,
                    location,
                } => {
                    let content_type =
                        registry.associate(&suffix, || storage.peek(&location, peek_len));
                    let key = (stem.clone(), content_type.clone());
                    if contents.entries.contains_key(&key) {
                        debug!(%location, "shadowed by an artifact with the same id and type");
                        continue;
                    }
                    let modified = storage.modified(&location);
                    let entry = Entry::new(id.append(stem), content_type, suffix, location, modified);
                    contents.entries.insert(key, entry);
                }
            }
        }
        Ok(contents)
    }
}

fn listing_key(item: &Listing) -> (&str, &str) {
    match item {
        Listing::Folder(name) => (name.as_str(), ""),
        Listing::File { stem, suffix, .. } => (stem.as_str(), suffix.as_str()),
    }
}

/// An internal node of a root's tree.
///
/// A folder lists its store on first access and keeps the result until it is
/// invalidated.
#[derive(Debug, Clone)]
pub struct Folder {
    id: PathId,
    contents: Option<Contents>,
}

impl Folder {
    /// Creates an unscanned folder.
    pub fn new(id: PathId) -> Self {
        Self { id, contents: None }
    }

    /// Returns the folder's id.
    pub fn id(&self) -> &PathId {
        &self.id
    }

    /// Returns `true` if the folder's children have been listed.
    pub fn is_scanned(&self) -> bool {
        self.contents.is_some()
    }

    /// Forgets the folder's children so the next access rescans.
    pub fn invalidate(&mut self) {
        self.contents = None;
    }

    pub(crate) fn scan(
        &mut self,
        storage: &dyn Storage,
        registry: &Registry,
    ) -> Result<&mut Contents, StoreError> {
        if self.contents.is_none() {
            let loaded = Contents::load(&self.id, storage, registry)?;
            self.contents = Some(loaded);
        }
        Ok(self.contents.get_or_insert_with(Contents::default))
    }

    /// Walks down `path`, scanning folders on the way. With `create`, folders
    /// missing from the tree are inserted unscanned.
    pub(crate) fn descend(
        &mut self,
        path: &[String],
        create: bool,
        storage: &dyn Storage,
        registry: &Registry,
    ) -> Result<Option<&mut Folder>, StoreError> {
        let Some((head, rest)) = path.split_first() else {
            return Ok(Some(self));
        };
        let child_id = self.id.append(head.clone());
        let contents = self.scan(storage, registry)?;
        let child = if create {
            contents
                .folders
                .entry(head.clone())
                .or_insert_with(|| Folder::new(child_id))
        } else {
            match contents.folders.get_mut(head) {
                Some(child) => child,
                None => return Ok(None),
            }
        };
        child.descend(rest, create, storage, registry)
    }

    /// Appends the id and type of every entry below this folder that
    /// `filter` selects. Entries precede subfolders; both are visited in
    /// name order.
    pub(crate) fn collect(
        &mut self,
        filter: &Filter,
        storage: &dyn Storage,
        registry: &Registry,
        out: &mut Vec<(PathId, ContentType)>,
    ) -> Result<(), StoreError> {
        let contents = self.scan(storage, registry)?;
        out.extend(
            contents
                .entries
                .values()
                .filter(|e| filter.matches(e.id(), e.content_type()))
                .map(|e| (e.id().clone(), e.content_type().clone())),
        );
        for folder in contents.folders.values_mut() {
            folder.collect(filter, storage, registry, out)?;
        }
        Ok(())
    }

    /// Searches the whole subtree for the entry stored at `location`.
    pub(crate) fn find_location(
        &mut self,
        location: &Location,
        storage: &dyn Storage,
        registry: &Registry,
    ) -> Result<Option<(PathId, ContentType)>, StoreError> {
        let contents = self.scan(storage, registry)?;
        if let Some(entry) = contents.entries.values().find(|e| e.location() == location) {
            return Ok(Some((entry.id().clone(), entry.content_type().clone())));
        }
        for folder in contents.folders.values_mut() {
            if let Some(hit) = folder.find_location(location, storage, registry)? {
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DirStorage;
    use std::fs;

    fn fixture() -> (tempfile::TempDir, DirStorage) {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("util/deep")).unwrap();
        fs::write(tmp.path().join("main.src"), "m").unwrap();
        fs::write(tmp.path().join("notes.txt"), "n").unwrap();
        fs::write(tmp.path().join("util/list.src"), "l").unwrap();
        fs::write(tmp.path().join("util/deep/x.src"), "x").unwrap();
        let store = DirStorage::new(tmp.path());
        (tmp, store)
    }

    #[test]
    fn scan_is_lazy() {
        let (_tmp, store) = fixture();
        let registry = Registry::standard();
        let mut root = Folder::new(PathId::ROOT);
        assert!(!root.is_scanned());

        let util = root
            .descend(&["util".to_string()], false, &store, &registry)
            .unwrap()
            .unwrap();
        assert!(!util.is_scanned());
        assert!(root.is_scanned());
    }

    #[test]
    fn collect_filters_and_orders() {
        let (_tmp, store) = fixture();
        let registry = Registry::standard();
        let mut root = Folder::new(PathId::ROOT);
        let mut out = Vec::new();
        root.collect(&Filter::all(ContentType::SOURCE), &store, &registry, &mut out)
            .unwrap();
        let ids: Vec<String> = out.iter().map(|(id, _)| id.to_string()).collect();
        assert_eq!(ids, ["main", "util/list", "util/deep/x"]);
    }

    #[test]
    fn untyped_files_are_tracked_but_not_selected() {
        let (_tmp, store) = fixture();
        let registry = Registry::standard();
        let mut root = Folder::new(PathId::ROOT);
        let contents = root.scan(&store, &registry).unwrap();
        assert!(contents
            .entries
            .contains_key(&("notes".to_string(), ContentType::UNTYPED)));
    }

    #[test]
    fn find_location_walks_subtree() {
        let (tmp, store) = fixture();
        let registry = Registry::standard();
        let mut root = Folder::new(PathId::ROOT);
        let loc = Location::File(tmp.path().join("util/deep/x.src"));
        let hit = root.find_location(&loc, &store, &registry).unwrap();
        assert_eq!(hit, Some((PathId::parse("util/deep/x"), ContentType::SOURCE)));
    }

    #[test]
    fn invalidate_forces_rescan() {
        let (tmp, store) = fixture();
        let registry = Registry::standard();
        let mut root = Folder::new(PathId::ROOT);
        root.scan(&store, &registry).unwrap();
        fs::write(tmp.path().join("late.src"), "l").unwrap();
        assert_eq!(root.scan(&store, &registry).unwrap().entries.len(), 2);
        root.invalidate();
        assert_eq!(root.scan(&store, &registry).unwrap().entries.len(), 3);
    }
}
