//! Per-kind component storage.
//!
//! A [`ComponentStore`] owns every instance of one component kind, keyed by
//! entity id, together with a per-instance active flag. The store's reference
//! schema supplies the field set and default values cloned into each new
//! subscription.
//!
//! A `ComponentStore` value is a cheap handle over shared state: clones refer
//! to the same instance table, so the environment and any caller it hands a
//! store to always observe the same subscriptions.
//!
//! The headline quirk of the active flag: [`ComponentStore::has_entity`]
//! answers *present AND active*, so an inactive instance is invisible to
//! default queries without being deleted. Raw presence is
//! [`ComponentStore::contains`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::component::Component;
use crate::value::{FieldValue, Value};
use crate::EcsError;

// ---------------------------------------------------------------------------
// ComponentStore
// ---------------------------------------------------------------------------

/// One entity's entry: the owned instance and its active flag.
#[derive(Debug, Clone)]
struct Slot {
    component: Component,
    active: bool,
}

#[derive(Debug)]
struct StoreInner {
    schema: Component,
    slots: Mutex<HashMap<i32, Slot>>,
}

/// The registry of all instances of one component kind.
///
/// Instances are exclusively owned by the store; shared access happens either
/// as a scoped borrow under the store lock
/// ([`with_component`](Self::with_component)) or through a
/// [`ComponentHandle`] that re-resolves the entity on every call.
#[derive(Debug, Clone)]
pub struct ComponentStore {
    inner: Arc<StoreInner>,
}

impl ComponentStore {
    /// Creates a store whose subscriptions clone the given reference schema.
    pub fn new(schema: Component) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                schema,
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The name of the component kind this store manages.
    pub fn name(&self) -> &str {
        self.inner.schema.name()
    }

    /// The declared type tag of a schema field, or `""` for unknown fields.
    pub fn field_type(&self, field: &str) -> String {
        self.inner.schema.type_of(field).to_owned()
    }

    /// Subscribes an entity, cloning the schema's defaults. Idempotent: an
    /// already subscribed entity is left untouched.
    pub fn subscribe(&self, entity: i32) {
        let mut slots = self.inner.slots.lock();
        slots.entry(entity).or_insert_with(|| Slot {
            component: self.inner.schema.clone(),
            active: true,
        });
    }

    /// Subscribes an entity and then applies each `(field, value)` override.
    pub fn subscribe_with(&self, entity: i32, overrides: &[(String, Value)]) {
        self.subscribe(entity);
        let mut slots = self.inner.slots.lock();
        if let Some(slot) = slots.get_mut(&entity) {
            for (field, value) in overrides {
                slot.component.set(field, value.clone());
            }
        }
    }

    /// Removes an entity's instance; no-op when absent.
    pub fn unsubscribe(&self, entity: i32) {
        self.inner.slots.lock().remove(&entity);
    }

    /// `true` iff the entity is present AND its instance is active. Inactive
    /// instances are invisible here; use [`contains`](Self::contains) for raw
    /// presence.
    pub fn has_entity(&self, entity: i32) -> bool {
        self.inner
            .slots
            .lock()
            .get(&entity)
            .map(|slot| slot.active)
            .unwrap_or(false)
    }

    /// Raw presence check, ignoring the active flag.
    pub fn contains(&self, entity: i32) -> bool {
        self.inner.slots.lock().contains_key(&entity)
    }

    /// The active flag of an entity's instance; `false` when absent.
    pub fn state(&self, entity: i32) -> bool {
        self.inner
            .slots
            .lock()
            .get(&entity)
            .map(|slot| slot.active)
            .unwrap_or(false)
    }

    /// Sets the active flag of an entity's instance; no-op when absent.
    pub fn set_state(&self, entity: i32, state: bool) {
        if let Some(slot) = self.inner.slots.lock().get_mut(&entity) {
            slot.active = state;
        }
    }

    /// Runs `f` against the entity's instance under the store lock.
    ///
    /// This is the scoped-borrow access path; the active flag is not
    /// consulted.
    pub fn with_component<R>(
        &self,
        entity: i32,
        f: impl FnOnce(&mut Component) -> R,
    ) -> Result<R, EcsError> {
        let mut slots = self.inner.slots.lock();
        match slots.get_mut(&entity) {
            Some(slot) => Ok(f(&mut slot.component)),
            None => Err(EcsError::NotSubscribed {
                entity,
                store: self.name().to_owned(),
            }),
        }
    }

    /// Returns a long-lived handle to the entity's instance, re-resolved on
    /// every access. Fails when the entity is not subscribed (the active
    /// flag is not checked here).
    pub fn component(&self, entity: i32) -> Result<ComponentHandle, EcsError> {
        if self.contains(entity) {
            Ok(ComponentHandle {
                store: self.clone(),
                entity,
            })
        } else {
            Err(EcsError::NotSubscribed {
                entity,
                store: self.name().to_owned(),
            })
        }
    }

    /// The subscribed entity ids. Inactive entries are skipped unless
    /// `include_inactive` is set. Ordering is unspecified; the result is a
    /// snapshot copy.
    pub fn entities(&self, include_inactive: bool) -> Vec<i32> {
        self.inner
            .slots
            .lock()
            .iter()
            .filter(|(_, slot)| include_inactive || slot.active)
            .map(|(&entity, _)| entity)
            .collect()
    }

    /// Transfers the giver's instance (component and state together) to the
    /// receiver, replacing any entry the receiver already had. With
    /// `copy == false` the giver's entry is erased. No-op when the giver is
    /// absent -- raw presence, so an inactive instance still transfers.
    pub fn give(&self, giver: i32, receiver: i32, copy: bool) {
        let mut slots = self.inner.slots.lock();
        let slot = if copy {
            slots.get(&giver).cloned()
        } else {
            slots.remove(&giver)
        };
        if let Some(slot) = slot {
            slots.insert(receiver, slot);
        }
    }
}

impl fmt::Display for ComponentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.name())?;
        let slots = self.inner.slots.lock();
        for (entity, slot) in slots.iter() {
            writeln!(
                f,
                "    ID: {}, State: {}",
                entity,
                if slot.active { "Active" } else { "Inactive" }
            )?;
            writeln!(f, "        {}", slot.component)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ComponentHandle
// ---------------------------------------------------------------------------

/// A `(store, entity)` pair standing in for a component instance.
///
/// Every call re-resolves the entity inside the store, so a handle never
/// keeps an instance alive: once the entity is unsubscribed, reads return
/// defaults and writes are dropped, with a diagnostic.
#[derive(Clone)]
pub struct ComponentHandle {
    store: ComponentStore,
    entity: i32,
}

impl ComponentHandle {
    /// The entity this handle points at.
    pub fn entity(&self) -> i32 {
        self.entity
    }

    /// The component kind's name.
    pub fn name(&self) -> String {
        self.store.name().to_owned()
    }

    /// The names of every field, or empty when the entity is gone.
    pub fn field_names(&self) -> Vec<String> {
        self.store
            .with_component(self.entity, |c| c.field_names())
            .unwrap_or_default()
    }

    /// The declared type tag of a field, `""` for unknown fields.
    pub fn type_of(&self, field: &str) -> String {
        self.store.field_type(field)
    }

    /// Snapshot copy of the instance's `(field, tag, value)` triples.
    pub fn fields(&self) -> Vec<(String, String, Value)> {
        self.store
            .with_component(self.entity, |c| {
                c.fields()
                    .iter()
                    .map(|(field, slot)| (field.clone(), slot.tag.clone(), slot.value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Reads a field as `T`; defaults (with a diagnostic) when the entity is
    /// no longer subscribed.
    pub fn get<T: FieldValue>(&self, field: &str) -> T {
        match self.store.with_component(self.entity, |c| c.get::<T>(field)) {
            Ok(value) => value,
            Err(err) => {
                warn!(%err, field, "read through a stale component handle");
                T::default()
            }
        }
    }

    /// Writes a field value; dropped (with a diagnostic) when the entity is
    /// no longer subscribed.
    pub fn set(&self, field: &str, value: Value) {
        if let Err(err) = self
            .store
            .with_component(self.entity, |c| c.set(field, value))
        {
            warn!(%err, field, "write through a stale component handle");
        }
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("store", &self.store.name())
            .field("entity", &self.entity)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
