//! Atelier ECS -- dynamically typed entity/component registry core.
//!
//! This crate provides the data layer of the Atelier runtime. Entities are
//! dense integer ids paired with unique names; components are named bags of
//! dynamically typed fields drawn from a closed value set; each component
//! kind lives in its own [`ComponentStore`](store::ComponentStore) keyed by
//! entity id. Everything is guarded by coarse per-object locks so stores can
//! be shared across threads.
//!
//! # Quick Start
//!
//! ```
//! use atelier_ecs::prelude::*;
//!
//! let schema = Component::from_schema(&serde_json::json!({
//!     "name": "Position",
//!     "data": { "x": "float", "y": "float" }
//! }))
//! .unwrap();
//!
//! let registry = EntityRegistry::new();
//! let hero = registry.create("hero", false);
//!
//! let store = ComponentStore::new(schema);
//! store.subscribe(hero);
//!
//! let position = store.component(hero).unwrap();
//! position.set("x", Value::Float(3.5));
//! assert_eq!(position.get::<f32>("x"), 3.5);
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod math;
pub mod registry;
pub mod store;
pub mod value;

use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by registry, store, and value-model operations.
///
/// Most of the public surface is forgiving by design (lookups return
/// sentinels, mutations on missing targets are no-ops); these variants cover
/// the calls that genuinely cannot hand back a usable result.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// A type tag outside the closed value set.
    #[error("unknown type tag '{tag}'")]
    UnknownType { tag: String },

    /// A document fragment that does not match the expected shape.
    #[error("document {doc} does not match the expected shape '{expected}'")]
    ValueShape { expected: String, doc: String },

    /// The store has no instance for the requested entity.
    #[error("entity {entity} is not subscribed to the '{store}' store")]
    NotSubscribed { entity: i32, store: String },

    /// An environment-level component lookup on an entity that does not
    /// carry that component.
    #[error("component '{component}' is not attached to '{entity}'")]
    NotAttached { entity: String, component: String },

    /// A name lookup returned no id where an id was required.
    #[error("no entity named '{name}'")]
    NoSuchEntity { name: String },

    /// A file could not be read during bootstrap.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file could not be parsed during bootstrap.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{Component, Field};
    pub use crate::math::{Vec2, Vec3};
    pub use crate::registry::{EntityRegistry, NO_ENTITY};
    pub use crate::store::{ComponentHandle, ComponentStore};
    pub use crate::value::{FieldValue, Value};
    pub use crate::EcsError;
}
