//! Atelier runtime -- the environment facade over the ECS data core.
//!
//! An [`Environment`](environment::Environment) owns one entity registry and
//! any number of component stores, and is the single mutation surface for
//! both. Every mutating call can broadcast a change notification to the
//! registered systems; a [`SystemBase`](system::SystemBase) keeps its entity
//! membership current by reconciling against its filters on each
//! notification.
//!
//! The runtime also covers declarative bootstrap (entity, component schema,
//! and subscription files under three directory roots), saving an entity's
//! subscription back to disk, and named in-memory snapshots.
//!
//! # Quick Start
//!
//! ```
//! use atelier_ecs::prelude::*;
//! use atelier_runtime::prelude::*;
//! use std::sync::Arc;
//!
//! let env = Arc::new(Environment::new(EntityRegistry::new()));
//!
//! let schema = Component::from_schema(&serde_json::json!({
//!     "name": "Position",
//!     "data": { "x": "float", "y": "float" }
//! }))
//! .unwrap();
//! env.add_manager(ComponentStore::new(schema));
//!
//! let hero = env.create_entity("hero", false, true);
//! env.manager_by_name("Position").unwrap().subscribe(hero);
//!
//! let position = env.component(hero, "Position").unwrap();
//! position.set("x", Value::Float(3.5));
//! assert_eq!(position.get::<f32>("x"), 3.5);
//! ```

#![deny(unsafe_code)]

pub mod environment;
pub mod snapshot;
pub mod subscription;
pub mod system;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::environment::{Environment, EntityKey};
    pub use crate::snapshot::Snapshot;
    pub use crate::subscription::Subscriptions;
    pub use crate::system::{System, SystemBase};
}
