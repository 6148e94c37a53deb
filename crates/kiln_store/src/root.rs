//! Roots: namespaces of entries over one backing store.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_common::{Location, PathId};
use tracing::debug;

use crate::content::ContentType;
use crate::entry::Entry;
use crate::error::StoreError;
use crate::filter::Filter;
use crate::folder::Folder;
use crate::registry::Registry;
use crate::storage::{ArchiveStorage, DirStorage, Storage};

/// Index of a root within its [`RootSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RootId(pub u32);

impl RootId {
    /// Placeholder for a root not yet added to a set.
    pub const UNBOUND: RootId = RootId(u32::MAX);
}

/// What a root is used for in a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootKind {
    /// User sources; the only roots scanned for changes and dirty entries.
    Source,
    /// Generated output; emptied by a clean.
    Binary,
    /// A library the build reads but never modifies.
    External,
}

impl fmt::Display for RootKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootKind::Source => write!(f, "source"),
            RootKind::Binary => write!(f, "binary"),
            RootKind::External => write!(f, "external"),
        }
    }
}

/// Names one entry across all roots of a project.
///
/// Entries are identified by value, so a key stays meaningful across
/// rescans and can name artifacts that do not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryKey {
    /// The root the entry belongs to.
    pub root: RootId,
    /// The entry's id within that root.
    pub id: PathId,
    /// The entry's content type.
    pub content_type: ContentType,
}

impl EntryKey {
    /// Creates a key.
    pub fn new(root: RootId, id: PathId, content_type: ContentType) -> Self {
        Self {
            root,
            id,
            content_type,
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.id, self.content_type)
    }
}

/// A namespace of typed entries organized in a lazily populated tree.
pub struct Root {
    id: RootId,
    name: String,
    kind: RootKind,
    storage: Box<dyn Storage>,
    registry: Arc<Registry>,
    tree: Folder,
}

impl Root {
    /// Creates a root over an arbitrary storage strategy.
    pub fn with_storage(
        name: impl Into<String>,
        kind: RootKind,
        storage: Box<dyn Storage>,
        registry: Arc<Registry>,
    ) -> Self {
        Self {
            id: RootId::UNBOUND,
            name: name.into(),
            kind,
            storage,
            registry,
            tree: Folder::new(PathId::ROOT),
        }
    }

    /// Creates a live root over the directory `base`.
    pub fn live(
        name: impl Into<String>,
        kind: RootKind,
        base: impl Into<PathBuf>,
        registry: Arc<Registry>,
    ) -> Self {
        let storage: Box<dyn Storage> = if kind == RootKind::External {
            Box::new(DirStorage::read_only(base))
        } else {
            Box::new(DirStorage::new(base))
        };
        Self::with_storage(name, kind, storage, registry)
    }

    /// Creates an external root over a packaged archive.
    pub fn archive(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        registry: Arc<Registry>,
    ) -> Result<Self, StoreError> {
        let storage = ArchiveStorage::open(path)?;
        Ok(Self::with_storage(
            name,
            RootKind::External,
            Box::new(storage),
            registry,
        ))
    }

    /// Returns the root's index in its set.
    pub fn id(&self) -> RootId {
        self.id
    }

    /// Returns the root's configured name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns what the root is used for.
    pub fn kind(&self) -> RootKind {
        self.kind
    }

    /// Returns the directory or archive backing this root.
    pub fn base(&self) -> &Path {
        self.storage.base()
    }

    /// Returns `true` if the root rescans its store on refresh.
    pub fn is_live(&self) -> bool {
        self.storage.is_live()
    }

    fn lookup(
        &mut self,
        id: &PathId,
        content_type: &ContentType,
    ) -> Result<Option<&mut Entry>, StoreError> {
        let Some(stem) = id.last() else {
            return Ok(None);
        };
        let parent = id.parent().unwrap_or_default();
        let folder = self.tree.descend(
            parent.segments(),
            false,
            self.storage.as_ref(),
            &self.registry,
        )?;
        let Some(folder) = folder else {
            return Ok(None);
        };
        let contents = folder.scan(self.storage.as_ref(), &self.registry)?;
        Ok(contents
            .entries
            .get_mut(&(stem.to_string(), content_type.clone())))
    }

    /// Looks up an entry. Absence is not an error.
    pub fn get(
        &mut self,
        id: &PathId,
        content_type: &ContentType,
    ) -> Result<Option<&Entry>, StoreError> {
        Ok(self.lookup(id, content_type)?.map(|e| &*e))
    }

    /// Returns the keys of every entry `filter` selects, in a stable order.
    ///
    /// Each call walks the tree afresh, scanning folders not yet listed.
    pub fn get_all(&mut self, filter: &Filter) -> Result<Vec<EntryKey>, StoreError> {
        let mut found = Vec::new();
        self.tree
            .collect(filter, self.storage.as_ref(), &self.registry, &mut found)?;
        Ok(found
            .into_iter()
            .map(|(id, ct)| EntryKey::new(self.id, id, ct))
            .collect())
    }

    /// Returns the entry with this id and type, creating it if needed.
    ///
    /// A new entry is bound to the location the registry's suffix for
    /// `content_type` implies. Missing folders are added to the tree and
    /// created in the store, but the artifact itself is not written.
    pub fn create(
        &mut self,
        id: &PathId,
        content_type: &ContentType,
    ) -> Result<&mut Entry, StoreError> {
        let suffix = self.registry.suffix_for(content_type).to_string();
        let location = self.storage.locate(id, &suffix);
        let Some(stem) = id.last() else {
            return Err(StoreError::NotFound { location });
        };
        let parent = id.parent().unwrap_or_default();

        let exists = self.lookup(id, content_type)?.is_some();
        if !exists {
            self.storage.prepare(&location)?;
        }

        let storage = self.storage.as_ref();
        let folder = self
            .tree
            .descend(parent.segments(), true, storage, &self.registry)?
            .ok_or_else(|| StoreError::NotFound {
                location: location.clone(),
            })?;
        let contents = folder.scan(storage, &self.registry)?;
        let key = (stem.to_string(), content_type.clone());
        let entry = contents.entries.entry(key).or_insert_with(|| {
            debug!(%location, "created entry");
            let modified = storage.modified(&location);
            Entry::new(id.clone(), content_type.clone(), suffix, location, modified)
        });
        Ok(entry)
    }

    /// Returns `true` if `key` names an entry of this root.
    pub fn contains(&mut self, key: &EntryKey) -> Result<bool, StoreError> {
        if key.root != self.id {
            return Ok(false);
        }
        Ok(self.lookup(&key.id, &key.content_type)?.is_some())
    }

    /// Returns `true` if the entry is tracked and its artifact exists.
    pub fn exists(&mut self, id: &PathId, content_type: &ContentType) -> Result<bool, StoreError> {
        let storage = self.storage.as_ref();
        let Some(stem) = id.last() else {
            return Ok(false);
        };
        let parent = id.parent().unwrap_or_default();
        let Some(folder) = self
            .tree
            .descend(parent.segments(), false, storage, &self.registry)?
        else {
            return Ok(false);
        };
        let contents = folder.scan(storage, &self.registry)?;
        Ok(contents
            .entries
            .get(&(stem.to_string(), content_type.clone()))
            .is_some_and(|e| e.exists(storage)))
    }

    /// Reads an entry's content.
    pub fn read(&mut self, id: &PathId, content_type: &ContentType) -> Result<Vec<u8>, StoreError> {
        let suffix = self.registry.suffix_for(content_type).to_string();
        let location = self.storage.locate(id, &suffix);
        let Root {
            tree,
            storage,
            registry,
            ..
        } = self;
        let entry = find_entry(tree, id, content_type, &**storage, registry)?
            .ok_or(StoreError::NotFound { location })?;
        Ok(entry.read(&**storage)?.to_vec())
    }

    /// Creates the entry if needed and persists `bytes` to it.
    pub fn write(
        &mut self,
        id: &PathId,
        content_type: &ContentType,
        bytes: Vec<u8>,
    ) -> Result<(), StoreError> {
        self.create(id, content_type)?;
        let Root {
            tree,
            storage,
            registry,
            ..
        } = self;
        let found = find_entry(tree, id, content_type, &**storage, registry)?;
        match found {
            Some(entry) => entry.write(&mut **storage, bytes),
            None => Ok(()),
        }
    }

    /// Deletes an entry's artifact and forgets the entry. Returns `false`
    /// if the root had no such entry.
    pub fn delete(&mut self, id: &PathId, content_type: &ContentType) -> Result<bool, StoreError> {
        let Some(location) = self
            .lookup(id, content_type)?
            .map(|e| e.location().clone())
        else {
            return Ok(false);
        };
        self.storage.delete(&location)?;
        if let (Some(stem), Some(parent)) = (id.last(), id.parent()) {
            let storage = self.storage.as_ref();
            if let Some(folder) =
                self.tree
                    .descend(parent.segments(), false, storage, &self.registry)?
            {
                let contents = folder.scan(storage, &self.registry)?;
                contents
                    .entries
                    .remove(&(stem.to_string(), content_type.clone()));
            }
        }
        debug!(%location, "deleted entry");
        Ok(true)
    }

    /// Re-derives the root from its store.
    ///
    /// A live root drops its tree and rescans on next access. An archive
    /// root keeps its snapshot, but fails if the archive has disappeared.
    pub fn refresh(&mut self) -> Result<(), StoreError> {
        self.storage.reload()?;
        if self.storage.is_live() {
            self.tree.invalidate();
        }
        Ok(())
    }

    /// Refreshes a single entry. Returns `false` if it is not tracked.
    pub fn refresh_entry(
        &mut self,
        id: &PathId,
        content_type: &ContentType,
    ) -> Result<bool, StoreError> {
        let Root {
            tree,
            storage,
            registry,
            ..
        } = self;
        match find_entry(tree, id, content_type, &**storage, registry)? {
            Some(entry) => {
                entry.refresh(&**storage);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Finds the entry whose artifact is stored at `location`.
    pub fn find_by_location(&mut self, location: &Location) -> Result<Option<EntryKey>, StoreError> {
        let storage = self.storage.as_ref();
        let hit = self.tree.find_location(location, storage, &self.registry)?;
        Ok(hit.map(|(id, ct)| EntryKey::new(self.id, id, ct)))
    }

    /// Returns the key an artifact at `location` would have, without
    /// entering it into the tree. The artifact need not exist.
    pub fn key_for(&self, location: &Location) -> Option<EntryKey> {
        let (id, suffix) = self.storage.resolve(location)?;
        if id.is_root() || !self.registry.is_recognized(&suffix) {
            return None;
        }
        let content_type = self
            .registry
            .associate(&suffix, || self.storage.peek(location, self.registry.peek_len()));
        Some(EntryKey::new(self.id, id, content_type))
    }

    /// Takes ownership of a newly appeared artifact at `location`.
    ///
    /// Succeeds when the location lies inside this root's store and has a
    /// suffix the registry recognizes. The artifact is entered into the tree
    /// and its key returned.
    pub fn claim(&mut self, location: &Location) -> Result<Option<EntryKey>, StoreError> {
        let storage = self.storage.as_ref();
        let Some((id, suffix)) = storage.resolve(location) else {
            return Ok(None);
        };
        if !self.registry.is_recognized(&suffix) {
            return Ok(None);
        }
        let Some(stem) = id.last().map(str::to_string) else {
            return Ok(None);
        };
        let content_type = self
            .registry
            .associate(&suffix, || storage.peek(location, self.registry.peek_len()));
        let parent = id.parent().unwrap_or_default();
        let Some(folder) = self
            .tree
            .descend(parent.segments(), true, storage, &self.registry)?
        else {
            return Ok(None);
        };
        let contents = folder.scan(storage, &self.registry)?;
        let entry = contents
            .entries
            .entry((stem, content_type.clone()))
            .or_insert_with(|| {
                let modified = storage.modified(location);
                Entry::new(id.clone(), content_type.clone(), suffix, location.clone(), modified)
            });
        entry.refresh(storage);
        Ok(Some(EntryKey::new(self.id, id, content_type)))
    }
}

fn find_entry<'a>(
    tree: &'a mut Folder,
    id: &PathId,
    content_type: &ContentType,
    storage: &dyn Storage,
    registry: &Registry,
) -> Result<Option<&'a mut Entry>, StoreError> {
    let Some(stem) = id.last() else {
        return Ok(None);
    };
    let parent = id.parent().unwrap_or_default();
    let Some(folder) = tree.descend(parent.segments(), false, storage, registry)? else {
        return Ok(None);
    };
    let contents = folder.scan(storage, registry)?;
    Ok(contents
        .entries
        .get_mut(&(stem.to_string(), content_type.clone())))
}

impl fmt::Debug for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Root")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("base", &self.storage.base())
            .finish()
    }
}

/// The roots of a project, in registration order.
#[derive(Debug, Default)]
pub struct RootSet {
    roots: Vec<Root>,
}

impl RootSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `root` and returns its id.
    pub fn add(&mut self, mut root: Root) -> RootId {
        let id = RootId(self.roots.len() as u32);
        root.id = id;
        self.roots.push(root);
        id
    }

    /// Returns the root with this id.
    pub fn get(&self, id: RootId) -> Option<&Root> {
        self.roots.get(id.0 as usize)
    }

    /// Returns the root with this id, mutably.
    pub fn get_mut(&mut self, id: RootId) -> Option<&mut Root> {
        self.roots.get_mut(id.0 as usize)
    }

    /// Looks a root up by its configured name.
    pub fn by_name(&self, name: &str) -> Option<RootId> {
        self.roots.iter().find(|r| r.name == name).map(|r| r.id)
    }

    /// Iterates roots in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Root> {
        self.roots.iter()
    }

    /// Iterates roots mutably in registration order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Root> {
        self.roots.iter_mut()
    }

    /// Returns the number of roots.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Returns `true` if no roots are registered.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}
