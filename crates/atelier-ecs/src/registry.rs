//! Entity names, ids, and tags.
//!
//! The [`EntityRegistry`] is a bijection between unique names and dense
//! integer ids. Removed ids land on a free list and are handed out again
//! before any fresh id, so the id space stays compact. A tag index maps
//! free-form labels to sets of ids for group queries.
//!
//! Lookups never fail: an unknown name resolves to [`NO_ENTITY`], an unknown
//! id to the empty string.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Value as Json;
use tracing::warn;
use walkdir::WalkDir;

use crate::EcsError;

/// Sentinel id for "no such entity".
pub const NO_ENTITY: i32 = -1;

// ---------------------------------------------------------------------------
// EntityRegistry
// ---------------------------------------------------------------------------

struct RegistryInner {
    /// Name -> id, ordered so prefix blocks are contiguous.
    ids: BTreeMap<String, i32>,
    /// Dense id -> name sequence. Slots of removed ids keep their stale name
    /// until the id is reissued; the stale entry is unreachable by name.
    names: Vec<String>,
    /// Ids freed by removal, reissued FIFO.
    free: VecDeque<i32>,
    /// Highest id ever issued.
    count: i32,
    /// Tag -> member ids.
    tags: HashMap<String, HashSet<i32>>,
}

/// The entity registry: name/id bijection plus the tag index.
pub struct EntityRegistry {
    inner: Mutex<RegistryInner>,
    root: Option<PathBuf>,
}

impl EntityRegistry {
    /// Creates an empty registry with no backing directory.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                ids: BTreeMap::new(),
                names: Vec::new(),
                free: VecDeque::new(),
                count: -1,
                tags: HashMap::new(),
            }),
            root: None,
        }
    }

    /// Creates a registry seeded from every entity file under `root`
    /// (subdirectories included). Unreadable or malformed files are skipped
    /// with a diagnostic.
    ///
    /// An entity file is a JSON document with `name` (or `names`), optional
    /// `tags`, and an optional `generate` count that expands each name into
    /// `<name>0 .. <name>(generate-1)`.
    pub fn from_dir(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut registry = Self::new();
        registry.root = Some(root.clone());

        for entry in WalkDir::new(&root).into_iter() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(%err, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if let Err(err) = registry.load_entity_file(entry.path()) {
                warn!(path = %entry.path().display(), %err, "skipping entity file");
            }
        }

        registry
    }

    fn load_entity_file(&self, path: &Path) -> Result<(), EcsError> {
        let text = fs::read_to_string(path).map_err(|source| EcsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let doc: Json = serde_json::from_str(&text).map_err(|source| EcsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let names: Vec<String> = if let Some(name) = doc.get("name").and_then(Json::as_str) {
            vec![name.to_owned()]
        } else if let Some(list) = doc.get("names").and_then(Json::as_array) {
            list.iter()
                .filter_map(Json::as_str)
                .map(str::to_owned)
                .collect()
        } else {
            // Not an entity file; other kinds of documents may share the tree.
            return Ok(());
        };

        let tags: Vec<String> = doc
            .get("tags")
            .and_then(Json::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Json::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        let generate = doc.get("generate").and_then(Json::as_u64);

        for name in &names {
            match generate {
                Some(n) => {
                    for i in 0..n {
                        self.create_tagged(&format!("{name}{i}"), &tags);
                    }
                }
                None => self.create_tagged(name, &tags),
            }
        }

        Ok(())
    }

    fn create_tagged(&self, name: &str, tags: &[String]) {
        let id = self.create(name, false);
        if id != NO_ENTITY {
            for tag in tags {
                self.add_tag(id, tag);
            }
        }
    }

    /// Creates an entity and returns its id, or [`NO_ENTITY`] when the name
    /// is already taken.
    ///
    /// Freed ids are reissued (FIFO) before any fresh id. With `create_file`
    /// set, a `<root>/<name>.json` entity file is written as well.
    pub fn create(&self, name: &str, create_file: bool) -> i32 {
        let mut inner = self.inner.lock();
        if inner.ids.contains_key(name) {
            return NO_ENTITY;
        }

        if create_file {
            self.write_entity_file(name);
        }

        let id = match inner.free.pop_front() {
            Some(id) => {
                inner.names[id as usize] = name.to_owned();
                id
            }
            None => {
                inner.count += 1;
                inner.names.push(name.to_owned());
                inner.count
            }
        };
        inner.ids.insert(name.to_owned(), id);
        id
    }

    fn write_entity_file(&self, name: &str) {
        let Some(root) = &self.root else {
            warn!(entity = name, "registry has no backing directory, entity file not written");
            return;
        };
        let path = root.join(format!("{name}.json"));
        let doc = serde_json::json!({ "name": name });
        let text = serde_json::to_string_pretty(&doc).unwrap_or_default();
        if let Err(err) = fs::write(&path, text) {
            warn!(path = %path.display(), %err, "could not write entity file");
        }
    }

    /// Removes an entity by name: the id joins the free list and leaves every
    /// tag set. Unknown names are ignored.
    pub fn remove(&self, name: &str) {
        let mut inner = self.inner.lock();
        let Some(id) = inner.ids.remove(name) else {
            return;
        };
        inner.free.push_back(id);
        for members in inner.tags.values_mut() {
            members.remove(&id);
        }
        // The dense name slot is left as-is; it is unreachable until the id
        // is reissued, at which point it is overwritten.
    }

    /// The id of a named entity, or [`NO_ENTITY`].
    pub fn id_of(&self, name: &str) -> i32 {
        self.inner
            .lock()
            .ids
            .get(name)
            .copied()
            .unwrap_or(NO_ENTITY)
    }

    /// The name of an entity id, or `""`.
    pub fn name_of(&self, id: i32) -> String {
        let inner = self.inner.lock();
        if id >= 0 && (id as usize) < inner.names.len() {
            inner.names[id as usize].clone()
        } else {
            String::new()
        }
    }

    /// All current names, in map (lexicographic) order. Snapshot copy.
    pub fn names(&self) -> Vec<String> {
        self.inner.lock().ids.keys().cloned().collect()
    }

    /// Group query by name prefix or by tag.
    ///
    /// With `is_prefix`, an empty string selects every entity (the
    /// broadcast-resync affordance) and a non-empty string selects the
    /// contiguous block of names starting with it. Otherwise the string is a
    /// tag and the result is that tag's members (empty for an unknown tag or
    /// an empty string).
    pub fn entities(&self, prefix_or_tag: &str, is_prefix: bool) -> Vec<i32> {
        let inner = self.inner.lock();
        if prefix_or_tag.is_empty() {
            if is_prefix {
                return inner.ids.values().copied().collect();
            }
            return Vec::new();
        }

        if is_prefix {
            inner
                .ids
                .range(prefix_or_tag.to_owned()..)
                .take_while(|(name, _)| name.starts_with(prefix_or_tag))
                .map(|(_, &id)| id)
                .collect()
        } else {
            inner
                .tags
                .get(prefix_or_tag)
                .map(|members| members.iter().copied().collect())
                .unwrap_or_default()
        }
    }

    /// Adds a tag to an entity id. Idempotent.
    pub fn add_tag(&self, id: i32, tag: &str) {
        self.inner
            .lock()
            .tags
            .entry(tag.to_owned())
            .or_default()
            .insert(id);
    }

    /// Whether the entity id carries the tag.
    pub fn has_tag(&self, id: i32, tag: &str) -> bool {
        self.inner
            .lock()
            .tags
            .get(tag)
            .map(|members| members.contains(&id))
            .unwrap_or(false)
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        for (name, id) in &inner.ids {
            let tags: Vec<&str> = inner
                .tags
                .iter()
                .filter(|(_, members)| members.contains(id))
                .map(|(tag, _)| tag.as_str())
                .collect();
            writeln!(f, "Name: {}, ID: {}, tags: [{}]", name, id, tags.join(", "))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
