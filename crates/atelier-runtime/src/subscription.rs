//! Declarative entity/component wiring from subscription files.
//!
//! A subscription file binds a selection of entities to component instances
//! with initial values. Selection is by exact entity name, by generated-name
//! prefix, or by tag union:
//!
//! ```json
//! { "entity": "enemy", "generated": true,
//!   "state": true,
//!   "components": [ { "name": "HP", "data": { "hp": 10 } } ] }
//! ```
//!
//! The loader walks the subscription root once at bootstrap, borrowing the
//! registry and the store map for the duration of the walk. Afterwards it
//! keeps only the `entity name -> file path` index, so a later
//! [`save`](Subscriptions::save) can overwrite the file an entity's
//! subscription came from.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Value as Json;
use tracing::warn;
use walkdir::WalkDir;

use atelier_ecs::registry::{EntityRegistry, NO_ENTITY};
use atelier_ecs::store::ComponentStore;
use atelier_ecs::value::Value;
use atelier_ecs::EcsError;

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

/// The subscription loader/saver: a root directory plus the index of which
/// file each named single-entity subscription came from.
pub struct Subscriptions {
    root: PathBuf,
    paths: Mutex<HashMap<String, PathBuf>>,
}

impl Subscriptions {
    /// Walks every regular file under `root` and applies each subscription
    /// to the given registry and stores. Unreadable or malformed files are
    /// skipped with a diagnostic.
    pub fn load(
        root: impl Into<PathBuf>,
        registry: &EntityRegistry,
        stores: &HashMap<String, ComponentStore>,
    ) -> Self {
        let root = root.into();
        let subscriptions = Self {
            root: root.clone(),
            paths: Mutex::new(HashMap::new()),
        };

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
            if let Err(err) = subscriptions.load_file(entry.path(), registry, stores) {
                warn!(path = %entry.path().display(), %err, "skipping subscription file");
            }
        }

        subscriptions
    }

    fn load_file(
        &self,
        path: &Path,
        registry: &EntityRegistry,
        stores: &HashMap<String, ComponentStore>,
    ) -> Result<(), EcsError> {
        let text = fs::read_to_string(path).map_err(|source| EcsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let doc: Json = serde_json::from_str(&text).map_err(|source| EcsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let entity = doc.get("entity").and_then(Json::as_str);
        let generated = doc.get("generated").is_some();

        // Single-entity files are indexed for save() before anything else --
        // even when the entity is (still) unknown.
        if let (Some(name), false) = (entity, generated) {
            self.paths
                .lock()
                .insert(name.to_owned(), path.to_path_buf());
            if registry.id_of(name) == NO_ENTITY {
                return Ok(());
            }
        }

        let ids: Vec<i32> = if let Some(tags) = doc.get("tags").and_then(Json::as_array) {
            let mut ids = Vec::new();
            for tag in tags.iter().filter_map(Json::as_str) {
                ids.extend(registry.entities(tag, false));
            }
            ids
        } else if let Some(name) = entity {
            if doc.get("generated").and_then(Json::as_bool).unwrap_or(false) {
                registry.entities(name, true)
            } else {
                match registry.id_of(name) {
                    NO_ENTITY => Vec::new(),
                    id => vec![id],
                }
            }
        } else {
            return Err(EcsError::ValueShape {
                expected: "subscription selector".to_owned(),
                doc: doc.to_string(),
            });
        };

        let state = doc.get("state").and_then(Json::as_bool).unwrap_or(true);
        let Some(components) = doc.get("components").and_then(Json::as_array) else {
            return Ok(());
        };

        for component in components {
            let Some(component_name) = component.get("name").and_then(Json::as_str) else {
                continue;
            };
            let Some(store) = stores.get(component_name) else {
                // Unknown component kinds are skipped wholesale.
                continue;
            };

            let mut data: Vec<(String, Value)> = Vec::new();
            if let Some(fields) = component.get("data").and_then(Json::as_object) {
                for (field, raw) in fields {
                    match Value::from_doc(raw, &store.field_type(field)) {
                        Ok(value) => data.push((field.clone(), value)),
                        Err(err) => {
                            warn!(
                                component = component_name,
                                field = %field,
                                %err,
                                "skipping field with unloadable value"
                            );
                        }
                    }
                }
            }

            for &id in &ids {
                store.subscribe_with(id, &data);
                if !state {
                    store.set_state(id, false);
                }
            }
        }

        Ok(())
    }

    /// Writes one entity's subscription back to disk: its active components
    /// and their current values, at the file the subscription originally
    /// came from, or `<root>/<name>.json` otherwise.
    pub fn save(
        &self,
        entity: i32,
        registry: &EntityRegistry,
        stores: &HashMap<String, ComponentStore>,
    ) -> Result<(), EcsError> {
        let name = registry.name_of(entity);
        let path = self
            .paths
            .lock()
            .get(&name)
            .cloned()
            .unwrap_or_else(|| self.root.join(format!("{name}.json")));

        let mut doc = serde_json::Map::new();
        doc.insert("entity".to_owned(), Json::String(name));

        let mut components = Vec::new();
        for store in stores.values() {
            if !store.has_entity(entity) {
                continue;
            }
            let data = store
                .with_component(entity, |component| {
                    let mut data = serde_json::Map::new();
                    for (field, slot) in component.fields() {
                        data.insert(field.clone(), slot.value.to_doc());
                    }
                    data
                })
                .unwrap_or_default();

            let mut entry = serde_json::Map::new();
            entry.insert("name".to_owned(), Json::String(store.name().to_owned()));
            entry.insert("data".to_owned(), Json::Object(data));
            components.push(Json::Object(entry));
        }
        doc.insert("components".to_owned(), Json::Array(components));

        let text = serde_json::to_string_pretty(&Json::Object(doc)).map_err(|source| {
            EcsError::Parse {
                path: path.clone(),
                source,
            }
        })?;
        fs::write(&path, text).map_err(|source| EcsError::Io {
            path: path.clone(),
            source,
        })
    }
}
