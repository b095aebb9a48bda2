//! The environment facade.
//!
//! [`Environment`] is the unified mutation API over one
//! [`EntityRegistry`] and a set of [`ComponentStore`]s. It is deliberately
//! forgiving: lookups on unknown targets return sentinels and mutations on
//! missing targets are no-ops, so callers can drive it optimistically.
//!
//! Every mutator takes a trailing `share` flag; when set, the environment
//! fans the touched entity id out to every registered notification callback
//! on the caller's thread. Cross-store operations compose per-store locks
//! and are not atomic as a whole; a concurrent reader may observe an entity
//! present in some stores and absent from others.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::warn;
use walkdir::WalkDir;

use atelier_ecs::component::Component;
use atelier_ecs::registry::{EntityRegistry, NO_ENTITY};
use atelier_ecs::store::{ComponentHandle, ComponentStore};
use atelier_ecs::EcsError;

use crate::snapshot::Snapshot;
use crate::subscription::Subscriptions;

// ---------------------------------------------------------------------------
// EntityKey
// ---------------------------------------------------------------------------

/// An entity reference: either the id itself or the entity's name.
///
/// Most environment operations accept `impl Into<EntityKey>` so callers can
/// pass whichever they hold. Names resolve through the registry; an unknown
/// name resolves to [`NO_ENTITY`], which downstream operations treat as a
/// no-op target.
#[derive(Debug, Clone)]
pub enum EntityKey {
    Id(i32),
    Name(String),
}

impl EntityKey {
    pub(crate) fn resolve(&self, registry: &EntityRegistry) -> i32 {
        match self {
            EntityKey::Id(id) => *id,
            EntityKey::Name(name) => registry.id_of(name),
        }
    }

    fn describe(&self, registry: &EntityRegistry) -> String {
        match self {
            EntityKey::Id(id) => registry.name_of(*id),
            EntityKey::Name(name) => name.clone(),
        }
    }
}

impl From<i32> for EntityKey {
    fn from(id: i32) -> Self {
        EntityKey::Id(id)
    }
}

impl From<&str> for EntityKey {
    fn from(name: &str) -> Self {
        EntityKey::Name(name.to_owned())
    }
}

impl From<String> for EntityKey {
    fn from(name: String) -> Self {
        EntityKey::Name(name)
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

pub(crate) type Callback = Arc<dyn Fn(i32) + Send + Sync>;

/// The facade over the entity registry and the component stores.
///
/// The environment owns its parts; systems hold an `Arc<Environment>` and
/// everything here takes `&self`, composing the per-object locks of the
/// members it delegates to.
pub struct Environment {
    pub(crate) stores: RwLock<HashMap<String, ComponentStore>>,
    pub(crate) registry: EntityRegistry,
    pub(crate) subscriptions: Option<Subscriptions>,
    /// Notification callbacks keyed by system id. Fan-out follows key order,
    /// but callers must not depend on any particular order.
    notifiers: Mutex<BTreeMap<u64, Callback>>,
    pub(crate) snapshots: Mutex<HashMap<String, Snapshot>>,
    next_system_id: AtomicU64,
}

impl Environment {
    /// Creates an environment around an existing registry, with no stores
    /// and no subscription root.
    pub fn new(registry: EntityRegistry) -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
            registry,
            subscriptions: None,
            notifiers: Mutex::new(BTreeMap::new()),
            snapshots: Mutex::new(HashMap::new()),
            next_system_id: AtomicU64::new(0),
        }
    }

    /// Bootstraps a full environment from three directory roots: entity
    /// files, component schema files, and subscription files.
    ///
    /// Loading is forgiving: unreadable or malformed files are skipped with
    /// a diagnostic and the rest of the tree is still loaded.
    pub fn from_dirs(
        entities: impl AsRef<Path>,
        components: impl AsRef<Path>,
        subscriptions: impl AsRef<Path>,
    ) -> Self {
        let mut env = Self::new(EntityRegistry::from_dir(entities.as_ref()));

        for entry in WalkDir::new(components.as_ref()).into_iter() {
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
            match load_schema_file(entry.path()) {
                Ok(schema) => env.add_manager(ComponentStore::new(schema)),
                Err(err) => {
                    warn!(path = %entry.path().display(), %err, "skipping component schema file");
                }
            }
        }

        let stores = env.stores.read().clone();
        env.subscriptions = Some(Subscriptions::load(
            subscriptions.as_ref(),
            &env.registry,
            &stores,
        ));
        env
    }

    // -- schema store access ------------------------------------------------

    /// Registers a component store. A store whose name is already registered
    /// is left in place.
    pub fn add_manager(&self, store: ComponentStore) {
        self.stores
            .write()
            .entry(store.name().to_owned())
            .or_insert(store);
    }

    /// Every registered store. Snapshot copy.
    pub fn managers(&self) -> Vec<ComponentStore> {
        self.stores.read().values().cloned().collect()
    }

    /// The store managing the named component kind, if registered.
    pub fn manager_by_name(&self, name: &str) -> Option<ComponentStore> {
        self.stores.read().get(name).cloned()
    }

    /// The entity registry.
    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// The id of a named entity, or [`NO_ENTITY`].
    pub fn entity_id(&self, name: &str) -> i32 {
        self.registry.id_of(name)
    }

    /// The name of an entity id, or `""`.
    pub fn entity_name(&self, id: i32) -> String {
        self.registry.name_of(id)
    }

    // -- entity and component state -----------------------------------------

    /// Sets the active flag on every store that holds the entity (raw
    /// presence, so a fully deactivated entity can be reactivated), then
    /// notifies once.
    pub fn set_entity_state(&self, entity: impl Into<EntityKey>, state: bool, share: bool) {
        let id = entity.into().resolve(&self.registry);
        for store in self.managers() {
            if store.contains(id) {
                store.set_state(id, state);
            }
        }
        if share {
            self.notify(id);
        }
    }

    /// [`set_entity_state`](Self::set_entity_state) over a prefix or tag
    /// group.
    pub fn set_entities_state(
        &self,
        prefix_or_tag: &str,
        state: bool,
        is_prefix: bool,
        share: bool,
    ) {
        for id in self.registry.entities(prefix_or_tag, is_prefix) {
            self.set_entity_state(id, state, share);
        }
    }

    /// Sets the active flag of one component on one entity; no-op when the
    /// store is unknown or the entity is not subscribed.
    pub fn set_state(&self, entity: impl Into<EntityKey>, component: &str, state: bool, share: bool) {
        let id = entity.into().resolve(&self.registry);
        let Some(store) = self.manager_by_name(component) else {
            return;
        };
        if !store.contains(id) {
            return;
        }
        store.set_state(id, state);
        if share {
            self.notify(id);
        }
    }

    /// [`set_state`](Self::set_state) over a prefix or tag group.
    pub fn set_states(
        &self,
        prefix_or_tag: &str,
        component: &str,
        state: bool,
        is_prefix: bool,
        share: bool,
    ) {
        for id in self.registry.entities(prefix_or_tag, is_prefix) {
            self.set_state(id, component, state, share);
        }
    }

    /// The active flag of one component on one entity; `false` when the
    /// store is unknown or the entity is not subscribed.
    pub fn get_state(&self, entity: impl Into<EntityKey>, component: &str) -> bool {
        let id = entity.into().resolve(&self.registry);
        self.manager_by_name(component)
            .map(|store| store.state(id))
            .unwrap_or(false)
    }

    // -- lookup --------------------------------------------------------------

    /// A handle to the named component of an entity.
    ///
    /// This is the one lookup that raises instead of returning a sentinel:
    /// the returned handle must be usable, so an unknown store or an entity
    /// without an active instance is [`EcsError::NotAttached`].
    pub fn component(
        &self,
        entity: impl Into<EntityKey>,
        component: &str,
    ) -> Result<ComponentHandle, EcsError> {
        let key = entity.into();
        let id = key.resolve(&self.registry);
        match self.manager_by_name(component) {
            Some(store) if store.has_entity(id) => store.component(id),
            _ => Err(EcsError::NotAttached {
                entity: key.describe(&self.registry),
                component: component.to_owned(),
            }),
        }
    }

    /// Handles to every active component of an entity. Snapshot copy.
    pub fn components(&self, entity: impl Into<EntityKey>) -> Vec<ComponentHandle> {
        let id = entity.into().resolve(&self.registry);
        self.managers()
            .into_iter()
            .filter(|store| store.has_entity(id))
            .filter_map(|store| store.component(id).ok())
            .collect()
    }

    /// Whether the entity carries an active instance of the component.
    pub fn has_component(&self, entity: impl Into<EntityKey>, component: &str) -> bool {
        let id = entity.into().resolve(&self.registry);
        self.manager_by_name(component)
            .map(|store| store.has_entity(id))
            .unwrap_or(false)
    }

    /// Whether the entity carries the tag.
    pub fn has_tag(&self, entity: impl Into<EntityKey>, tag: &str) -> bool {
        let id = entity.into().resolve(&self.registry);
        self.registry.has_tag(id, tag)
    }

    /// Adds a tag to the entity; no-op on unknown names.
    pub fn add_tag(&self, entity: impl Into<EntityKey>, tag: &str, share: bool) {
        let id = entity.into().resolve(&self.registry);
        if id == NO_ENTITY {
            return;
        }
        self.registry.add_tag(id, tag);
        if share {
            self.notify(id);
        }
    }

    // -- lifecycle -----------------------------------------------------------

    /// Creates an entity; returns its id, or [`NO_ENTITY`] when the name is
    /// taken.
    pub fn create_entity(&self, name: &str, create_file: bool, share: bool) -> i32 {
        let id = self.registry.create(name, create_file);
        if share {
            self.notify(id);
        }
        id
    }

    /// Removes an entity by name and unsubscribes its id from every store,
    /// inactive instances included.
    pub fn remove_entity(&self, name: &str, share: bool) {
        let id = self.registry.id_of(name);
        self.registry.remove(name);
        for store in self.managers() {
            store.unsubscribe(id);
        }
        if share {
            self.notify(id);
        }
    }

    // -- ownership -----------------------------------------------------------

    /// Creates a new entity that carries a copy of every component instance
    /// (state included) the original holds, active or not. Returns the new
    /// id, or [`NO_ENTITY`] when the requested name is taken.
    pub fn copy(&self, original: &str, copy: &str, create_file: bool, share: bool) -> i32 {
        let new_id = self.create_entity(copy, create_file, false);
        if new_id == NO_ENTITY {
            return NO_ENTITY;
        }
        let src = self.registry.id_of(original);
        for store in self.managers() {
            if store.contains(src) {
                store.give(src, new_id, true);
            }
        }
        if share {
            self.notify(new_id);
        }
        new_id
    }

    /// Transfers (or copies) one component instance between entities through
    /// the owning store; when sharing, both ids are notified.
    pub fn give(&self, component: &str, giver: i32, receiver: i32, copy: bool, share: bool) {
        let Some(store) = self.manager_by_name(component) else {
            return;
        };
        store.give(giver, receiver, copy);
        if share {
            self.notify(giver);
            self.notify(receiver);
        }
    }

    // -- persistence ---------------------------------------------------------

    /// Writes the entity's current subscription (active components and their
    /// values) back to disk through the subscription index.
    pub fn save(&self, entity: impl Into<EntityKey>) -> Result<(), EcsError> {
        let key = entity.into();
        let id = key.resolve(&self.registry);
        if id == NO_ENTITY {
            return Err(EcsError::NoSuchEntity {
                name: key.describe(&self.registry),
            });
        }
        match &self.subscriptions {
            Some(subscriptions) => {
                let stores = self.stores.read().clone();
                subscriptions.save(id, &self.registry, &stores)
            }
            None => {
                warn!(entity = id, "environment has no subscription root, nothing saved");
                Ok(())
            }
        }
    }

    // -- notification --------------------------------------------------------

    /// Registers a notification callback under a system id, replacing any
    /// callback already registered there.
    pub fn join(&self, id: u64, callback: impl Fn(i32) + Send + Sync + 'static) {
        self.notifiers.lock().insert(id, Arc::new(callback));
    }

    /// Fans one entity id out to every registered callback, synchronously on
    /// the caller's thread. Callbacks are cloned out first so none of the
    /// environment's locks are held while user code runs.
    pub fn notify(&self, entity: i32) {
        let callbacks: Vec<Callback> = self.notifiers.lock().values().cloned().collect();
        for callback in callbacks {
            callback(entity);
        }
    }

    /// Replays every currently known entity id to one system's callback --
    /// the resync path a system uses after changing its filters. Unknown ids
    /// do nothing.
    pub fn notify_system(&self, id: u64) {
        let Some(callback) = self.notifiers.lock().get(&id).cloned() else {
            return;
        };
        for entity in self.registry.entities("", true) {
            callback(entity);
        }
    }

    /// Issues a fresh system id. Monotone per environment instance.
    pub fn next_system_id(&self) -> u64 {
        self.next_system_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Reads and parses one component schema file.
fn load_schema_file(path: &Path) -> Result<Component, EcsError> {
    let text = std::fs::read_to_string(path).map_err(|source| EcsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let doc: serde_json::Value =
        serde_json::from_str(&text).map_err(|source| EcsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Component::from_schema(&doc)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_ecs::value::Value;
    use serde_json::json;

    fn env_with_store(name: &str, data: serde_json::Value) -> Environment {
        let env = Environment::new(EntityRegistry::new());
        let schema = Component::from_schema(&json!({ "name": name, "data": data })).unwrap();
        env.add_manager(ComponentStore::new(schema));
        env
    }

    #[test]
    fn manager_lookup_polarity() {
        let env = env_with_store("HP", json!({ "hp": "int" }));
        assert!(env.manager_by_name("HP").is_some());
        assert!(env.manager_by_name("Mana").is_none());
        assert_eq!(env.managers().len(), 1);
    }

    #[test]
    fn add_manager_keeps_the_first_registration() {
        let env = env_with_store("HP", json!({ "hp": "int" }));
        let other = Component::from_schema(&json!({ "name": "HP", "data": { "x": "float" } }))
            .unwrap();
        env.add_manager(ComponentStore::new(other));
        assert_eq!(env.manager_by_name("HP").unwrap().field_type("hp"), "int");
    }

    #[test]
    fn component_lookup_accepts_id_or_name() {
        let env = env_with_store("HP", json!({ "hp": "int" }));
        let id = env.create_entity("hero", false, true);
        env.manager_by_name("HP").unwrap().subscribe(id);

        assert_eq!(env.component(id, "HP").unwrap().get::<i32>("hp"), 0);
        assert_eq!(env.component("hero", "HP").unwrap().get::<i32>("hp"), 0);
        assert!(env.component("hero", "Mana").is_err());
        assert!(env.component("ghost", "HP").is_err());
    }

    #[test]
    fn inactive_component_is_not_attached() {
        let env = env_with_store("HP", json!({ "hp": "int" }));
        let id = env.create_entity("hero", false, true);
        env.manager_by_name("HP").unwrap().subscribe(id);
        env.set_state(id, "HP", false, true);

        assert!(!env.has_component(id, "HP"));
        assert!(env.component(id, "HP").is_err());
        assert!(env.components(id).is_empty());
        // The flag itself is still readable and flips back.
        assert!(!env.get_state(id, "HP"));
        env.set_state(id, "HP", true, true);
        assert!(env.has_component(id, "HP"));
    }

    #[test]
    fn entity_state_flips_every_store_and_back() {
        let env = env_with_store("HP", json!({ "hp": "int" }));
        let mana = Component::from_schema(&json!({ "name": "Mana", "data": { "mp": "int" } }))
            .unwrap();
        env.add_manager(ComponentStore::new(mana));

        let id = env.create_entity("hero", false, true);
        env.manager_by_name("HP").unwrap().subscribe(id);
        env.manager_by_name("Mana").unwrap().subscribe(id);

        env.set_entity_state(id, false, true);
        assert!(!env.has_component(id, "HP"));
        assert!(!env.has_component(id, "Mana"));

        // A fully deactivated entity can still be reactivated wholesale.
        env.set_entity_state("hero", true, true);
        assert!(env.has_component(id, "HP"));
        assert!(env.has_component(id, "Mana"));
    }

    #[test]
    fn group_state_updates_by_prefix_and_tag() {
        let env = env_with_store("HP", json!({ "hp": "int" }));
        let store = env.manager_by_name("HP").unwrap();
        for i in 0..3 {
            let id = env.create_entity(&format!("enemy{i}"), false, true);
            store.subscribe(id);
        }
        let tagged = env.create_entity("boss", false, true);
        store.subscribe(tagged);
        env.add_tag(tagged, "elite", true);

        env.set_entities_state("enemy", false, true, true);
        for i in 0..3 {
            assert!(!env.has_component(format!("enemy{i}").as_str(), "HP"));
        }
        assert!(env.has_component("boss", "HP"));

        env.set_states("elite", "HP", false, false, true);
        assert!(!env.has_component("boss", "HP"));
    }

    #[test]
    fn remove_entity_unsubscribes_even_inactive_instances() {
        let env = env_with_store("HP", json!({ "hp": "int" }));
        let store = env.manager_by_name("HP").unwrap();
        let id = env.create_entity("hero", false, true);
        store.subscribe(id);
        env.set_state(id, "HP", false, true);

        env.remove_entity("hero", true);
        assert!(!store.contains(id));
        assert_eq!(env.entity_id("hero"), NO_ENTITY);

        // A recycled id starts clean.
        let recycled = env.create_entity("other", false, true);
        assert_eq!(recycled, id);
        assert!(!store.contains(recycled));
    }

    #[test]
    fn copy_duplicates_components_and_state() {
        let env = env_with_store("HP", json!({ "hp": "int" }));
        let store = env.manager_by_name("HP").unwrap();
        let hero = env.create_entity("hero", false, true);
        store.subscribe_with(hero, &[("hp".to_owned(), Value::Int(7))]);
        store.set_state(hero, false);

        let clone = env.copy("hero", "hero_copy", false, true);
        assert_ne!(clone, NO_ENTITY);
        assert!(store.contains(clone));
        assert!(!store.state(clone));
        assert_eq!(
            store.component(clone).unwrap().get::<i32>("hp"),
            7
        );
        // The original keeps its instance on a copy.
        assert!(store.contains(hero));
    }

    #[test]
    fn copy_to_a_taken_name_creates_nothing() {
        let env = env_with_store("HP", json!({ "hp": "int" }));
        env.create_entity("a", false, true);
        env.create_entity("b", false, true);
        assert_eq!(env.copy("a", "b", false, true), NO_ENTITY);
    }

    #[test]
    fn notify_reaches_every_callback() {
        let env = Environment::new(EntityRegistry::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        for id in 0..2u64 {
            let seen = Arc::clone(&seen);
            env.join(id, move |entity| seen.lock().push((id, entity)));
        }
        env.notify(41);

        let seen = seen.lock();
        assert!(seen.contains(&(0, 41)));
        assert!(seen.contains(&(1, 41)));
    }

    #[test]
    fn notify_system_replays_all_entities() {
        let env = Environment::new(EntityRegistry::new());
        for name in ["a", "b", "c"] {
            env.create_entity(name, false, false);
        }
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            env.join(9, move |entity| seen.lock().push(entity));
        }

        env.notify_system(9);
        assert_eq!(seen.lock().len(), 3);

        // Unknown system ids are ignored.
        env.notify_system(1234);
        assert_eq!(seen.lock().len(), 3);
    }

    #[test]
    fn share_flag_suppresses_broadcast() {
        let env = env_with_store("HP", json!({ "hp": "int" }));
        let hits = Arc::new(Mutex::new(0));
        {
            let hits = Arc::clone(&hits);
            env.join(0, move |_| *hits.lock() += 1);
        }

        let id = env.create_entity("hero", false, false);
        env.manager_by_name("HP").unwrap().subscribe(id);
        env.set_state(id, "HP", false, false);
        env.add_tag(id, "quiet", false);
        assert_eq!(*hits.lock(), 0);

        env.set_state(id, "HP", true, true);
        assert_eq!(*hits.lock(), 1);
    }

    #[test]
    fn system_ids_are_monotone() {
        let env = Environment::new(EntityRegistry::new());
        assert_eq!(env.next_system_id(), 0);
        assert_eq!(env.next_system_id(), 1);
        assert_eq!(env.next_system_id(), 2);
    }
}
