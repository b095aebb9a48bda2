//! Named in-memory snapshots of component field values.
//!
//! A [`Snapshot`] captures `(entity, component, field -> value)` triples,
//! keyed by entity NAME rather than id so a capture survives id recycling.
//! Restoring writes the captured values back into whatever instances still
//! exist; it never creates entities or subscriptions.

use std::collections::HashMap;

use atelier_ecs::registry::NO_ENTITY;
use atelier_ecs::value::Value;

use crate::environment::Environment;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Captured component fields per entity name.
///
/// Layout: entity name -> list of (component name, list of (field, value)).
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub(crate) entities: HashMap<String, Vec<(String, Vec<(String, Value)>)>>,
}

impl Environment {
    /// Captures a snapshot under `name`, replacing any existing snapshot with
    /// that name.
    ///
    /// An empty `entities` subset means every current entity name; an empty
    /// `components` subset means every registered store. A component is
    /// captured for an entity whenever the store holds an instance for it,
    /// active or not.
    pub fn make_snapshot(&self, name: &str, entities: &[String], components: &[String]) {
        let names = if entities.is_empty() {
            self.registry.names()
        } else {
            entities.to_vec()
        };
        let stores = if components.is_empty() {
            self.managers()
        } else {
            components
                .iter()
                .filter_map(|component| self.manager_by_name(component))
                .collect()
        };

        let mut snapshot = Snapshot::default();
        for entity_name in names {
            let id = self.registry.id_of(&entity_name);
            let mut captured = Vec::new();
            for store in &stores {
                if !store.contains(id) {
                    continue;
                }
                let fields = store
                    .with_component(id, |component| {
                        component
                            .fields()
                            .iter()
                            .map(|(field, slot)| (field.clone(), slot.value.clone()))
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                captured.push((store.name().to_owned(), fields));
            }
            snapshot.entities.insert(entity_name, captured);
        }

        self.snapshots.lock().insert(name.to_owned(), snapshot);
    }

    /// Restores the named snapshot, if it exists.
    ///
    /// Captured values overwrite the fields of instances that still exist:
    /// entity names that no longer resolve, stores that are gone, and
    /// entities no longer subscribed are silently skipped.
    pub fn load_snapshot(&self, name: &str) {
        let snapshot = match self.snapshots.lock().get(name) {
            Some(snapshot) => snapshot.clone(),
            None => return,
        };

        for (entity_name, components) in &snapshot.entities {
            let id = self.registry.id_of(entity_name);
            if id == NO_ENTITY {
                continue;
            }
            for (component_name, fields) in components {
                let Some(store) = self.manager_by_name(component_name) else {
                    continue;
                };
                if !store.contains(id) {
                    continue;
                }
                let _ = store.with_component(id, |component| {
                    for (field, value) in fields {
                        component.set(field, value.clone());
                    }
                });
            }
        }
    }

    /// Drops the named snapshot, if it exists.
    pub fn clear_snapshot(&self, name: &str) {
        self.snapshots.lock().remove(name);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
