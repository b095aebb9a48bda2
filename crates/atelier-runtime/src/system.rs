//! The system base protocol: filters, membership, and the change latch.
//!
//! A system declares which components it requires, which it rejects, and
//! which tags it wants, and the [`SystemBase`] keeps an entity set current by
//! reconciling one entity per notification. Business logic stays in the
//! system author's [`System::run`]; this module only maintains membership.
//!
//! Membership rule, per notified entity:
//!
//! 1. the entity is removed from the set (a state change may flip it out);
//! 2. any desired tag present inserts it back -- tags short-circuit the
//!    component filters entirely;
//! 3. any rejected component present keeps it out;
//! 4. otherwise it is inserted iff every required component is present and
//!    the required list is non-empty. A system with no filters matches
//!    nothing.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::environment::Environment;

// ---------------------------------------------------------------------------
// SystemBase
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Membership {
    entities: HashSet<i32>,
    change: bool,
    required: Vec<String>,
    rejected: Vec<String>,
    tags: Vec<String>,
}

/// Filter state and entity membership for one system.
///
/// Constructed with `auto_update`, the base registers itself with the
/// environment under a fresh system id and reconciles on every broadcast.
/// The registration holds only a weak reference, so dropping the system
/// detaches it.
pub struct SystemBase {
    environment: RwLock<Arc<Environment>>,
    id: u64,
    inner: Mutex<Membership>,
}

impl SystemBase {
    /// Creates a base bound to `environment`. With `auto_update` the base
    /// joins the environment's notification list immediately.
    pub fn new(environment: &Arc<Environment>, auto_update: bool) -> Arc<Self> {
        let id = environment.next_system_id();
        let base = Arc::new(Self {
            environment: RwLock::new(Arc::clone(environment)),
            id,
            inner: Mutex::new(Membership::default()),
        });

        if auto_update {
            let weak = Arc::downgrade(&base);
            environment.join(id, move |entity| {
                if let Some(base) = weak.upgrade() {
                    base.reconcile(entity);
                }
            });
        }

        base
    }

    /// The system id this base registered under.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The environment this base currently reconciles against.
    pub fn environment(&self) -> Arc<Environment> {
        self.environment.read().clone()
    }

    /// Rebinds the base to a different environment. The notification
    /// registration with the previous environment is left in place.
    pub fn set_environment(&self, environment: Arc<Environment>) {
        *self.environment.write() = environment;
    }

    /// Re-evaluates membership for one entity. This is the callback target
    /// for environment notifications and can also be driven by hand.
    pub fn reconcile(&self, entity: i32) {
        let env = self.environment();
        let mut inner = self.inner.lock();

        inner.entities.remove(&entity);

        for tag in &inner.tags {
            if env.has_tag(entity, tag) {
                inner.entities.insert(entity);
                inner.change = true;
                return;
            }
        }

        for component in &inner.rejected {
            if env.has_component(entity, component.as_str()) {
                return;
            }
        }

        if inner.required.is_empty() {
            return;
        }
        for component in &inner.required {
            if !env.has_component(entity, component.as_str()) {
                return;
            }
        }
        inner.entities.insert(entity);
        inner.change = true;
    }

    /// Returns the change latch and clears it, atomically.
    pub fn get_change(&self) -> bool {
        std::mem::take(&mut self.inner.lock().change)
    }

    /// Snapshot copy of the current membership.
    pub fn entities(&self) -> HashSet<i32> {
        self.inner.lock().entities.clone()
    }

    /// Whether the entity is currently a member.
    pub fn contains(&self, entity: i32) -> bool {
        self.inner.lock().entities.contains(&entity)
    }

    // -- filter mutators -----------------------------------------------------
    //
    // Each appends to its list (duplicates are tolerated) and then asks the
    // environment to replay every known entity through this system's
    // callback. The membership lock is released before the replay.

    /// Requires a component.
    pub fn add_component(&self, name: impl Into<String>) {
        self.inner.lock().required.push(name.into());
        self.resync();
    }

    /// Requires several components.
    pub fn add_components(&self, names: impl IntoIterator<Item = String>) {
        self.inner.lock().required.extend(names);
        self.resync();
    }

    /// Rejects a component.
    pub fn add_rejected(&self, name: impl Into<String>) {
        self.inner.lock().rejected.push(name.into());
        self.resync();
    }

    /// Rejects several components.
    pub fn add_rejects(&self, names: impl IntoIterator<Item = String>) {
        self.inner.lock().rejected.extend(names);
        self.resync();
    }

    /// Desires a tag.
    pub fn add_tag(&self, name: impl Into<String>) {
        self.inner.lock().tags.push(name.into());
        self.resync();
    }

    /// Desires several tags.
    pub fn add_tags(&self, names: impl IntoIterator<Item = String>) {
        self.inner.lock().tags.extend(names);
        self.resync();
    }

    fn resync(&self) {
        let env = self.environment();
        env.notify_system(self.id);
    }
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// A consumer of environment notifications.
///
/// Implementors hold a [`SystemBase`] for filters and membership and put
/// their processing in [`run`](Self::run), typically iterating
/// `self.base().entities()`.
pub trait System: Send + Sync {
    /// The membership base of this system.
    fn base(&self) -> &SystemBase;

    /// Processes this system's current entities.
    fn run(&self);
}
