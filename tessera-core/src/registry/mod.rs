//! Process-wide actor directory.
//!
//! The registry allocates actor ids, maps ids and names to live handles,
//! and maintains the live-actor count that shutdown waits on. Both lookup
//! tables sit behind [`SharedSpinlock`]s: reads take the shared mode,
//! writes the exclusive mode, and erasure swaps the handle out of the
//! table before dropping it - dropping the last reference inside the
//! critical section would re-enter `erase` through the actor's cleanup
//! functor and deadlock.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

// Layer 2: Third-party crate imports
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

// Layer 3: Internal module imports
use crate::actor::handle::ActorRef;
use crate::sync::SharedSpinlock;
use crate::util::ids::ActorId;

/// Id allocator, lookup tables, and live-actor counter.
pub struct ActorRegistry {
    next_id: AtomicU64,
    entries: SharedSpinlock<HashMap<ActorId, ActorRef>>,
    named_entries: SharedSpinlock<HashMap<String, ActorRef>>,
    running: AtomicUsize,
    running_mtx: Mutex<()>,
    running_cv: Condvar,
}

impl ActorRegistry {
    /// An empty registry; the first allocated id is 1.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: SharedSpinlock::new(HashMap::new()),
            named_entries: SharedSpinlock::new(HashMap::new()),
            running: AtomicUsize::new(0),
            running_mtx: Mutex::new(()),
            running_cv: Condvar::new(),
        }
    }

    /// Allocate the next actor id. Ids are unique within the process and
    /// never zero.
    pub fn next_actor_id(&self) -> ActorId {
        ActorId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Publish `handle` under `id`. Existing entries are not overwritten.
    pub fn put(&self, id: ActorId, handle: ActorRef) {
        if !id.is_valid() {
            return;
        }
        let mut entries = self.entries.write();
        if entries.contains_key(&id) {
            return;
        }
        entries.insert(id, handle);
        drop(entries);
        debug!(%id, "added actor");
    }

    /// Remove the entry for `id`.
    pub fn erase(&self, id: ActorId) {
        // Keep the handle alive past the critical section: releasing the
        // last reference inside it would run the actor's destructor, which
        // re-enters erase through the cleanup functor.
        let removed;
        {
            let mut entries = self.entries.write();
            removed = entries.remove(&id);
        }
        if removed.is_some() {
            trace!(%id, "erased actor");
        }
    }

    /// Look up a handle by id.
    pub fn get(&self, id: ActorId) -> Option<ActorRef> {
        let entries = self.entries.read();
        match entries.get(&id) {
            Some(handle) => Some(handle.clone()),
            None => {
                trace!(%id, "key invalid, assume actor no longer exists");
                None
            }
        }
    }

    /// Publish `handle` under `name`; passing `None` erases the name.
    pub fn put_named(&self, name: impl Into<String>, handle: Option<ActorRef>) {
        let name = name.into();
        match handle {
            Some(handle) => {
                self.named_entries.write().insert(name, handle);
            }
            None => self.erase_named(&name),
        }
    }

    /// Look up a handle by registered name.
    pub fn get_named(&self, name: &str) -> Option<ActorRef> {
        self.named_entries.read().get(name).cloned()
    }

    /// Remove a name registration.
    pub fn erase_named(&self, name: &str) {
        // same release-then-destroy pattern as erase(id)
        let removed;
        {
            let mut named = self.named_entries.write();
            removed = named.remove(name);
        }
        drop(removed);
    }

    /// Snapshot of the name table.
    pub fn named_actors(&self) -> HashMap<String, ActorRef> {
        self.named_entries.read().clone()
    }

    /// Count one more live actor.
    pub fn inc_running(&self) -> usize {
        self.running.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Count one actor down; wakes shutdown waiters when the count
    /// reaches one or zero.
    pub fn dec_running(&self) -> usize {
        let new_value = self.running.fetch_sub(1, Ordering::SeqCst) - 1;
        if new_value <= 1 {
            let _guard = self.running_mtx.lock();
            self.running_cv.notify_all();
        }
        debug!(running = new_value, "actor done");
        new_value
    }

    /// Current number of live non-hidden actors.
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Block until the live count equals `expected` (0 or 1).
    pub fn await_running_count_equal(&self, expected: usize) {
        debug_assert!(expected <= 1);
        let mut guard = self.running_mtx.lock();
        while self.running.load(Ordering::SeqCst) != expected {
            self.running_cv.wait(&mut guard);
        }
    }
}

impl Default for ActorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::actor::event::{EventActor, SpawnOptions};
    use crate::system::actor_system::ActorSystem;
    use crate::system::config::SystemConfig;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    fn system() -> ActorSystem {
        ActorSystem::new(SystemConfig::default()).unwrap()
    }

    fn spawn_noop(system: &ActorSystem) -> crate::actor::handle::ActorRef {
        EventActor::spawn(system, SpawnOptions::default(), Box::new(|_, _| None))
    }

    #[test]
    fn test_ids_are_positive_and_unique() {
        let registry = ActorRegistry::new();
        let mut seen = HashSet::new();
        for _ in 0..100 {
            let id = registry.next_actor_id();
            assert!(id.is_valid());
            assert!(seen.insert(id));
        }
    }

    #[test]
    fn test_ids_unique_across_threads() {
        let registry = Arc::new(ActorRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let registry = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                (0..250)
                    .map(|_| registry.next_actor_id())
                    .collect::<Vec<_>>()
            }));
        }
        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn test_get_after_erase_returns_none() {
        let sys = system();
        let actor = spawn_noop(&sys);
        let id = actor.id();
        assert!(sys.registry().get(id).is_some());
        sys.registry().erase(id);
        assert!(sys.registry().get(id).is_none());
    }

    #[test]
    fn test_cleanup_functor_erases_entry() {
        let sys = system();
        let actor = spawn_noop(&sys);
        let id = actor.id();
        assert!(sys.registry().get(id).is_some());
        actor.cleanup(crate::actor::exit_reason::ExitReason::Normal, None);
        assert!(sys.registry().get(id).is_none());
    }

    #[test]
    fn test_running_counter_tracks_visible_actors() {
        let sys = system();
        assert_eq!(sys.registry().running(), 0);
        let a = spawn_noop(&sys);
        let b = spawn_noop(&sys);
        let hidden = EventActor::spawn(&sys, SpawnOptions::hidden(), Box::new(|_, _| None));
        assert_eq!(sys.registry().running(), 2);
        a.cleanup(crate::actor::exit_reason::ExitReason::Normal, None);
        assert_eq!(sys.registry().running(), 1);
        b.cleanup(crate::actor::exit_reason::ExitReason::Normal, None);
        assert_eq!(sys.registry().running(), 0);
        drop(hidden);
    }

    #[test]
    fn test_await_running_count_equal_returns() {
        let sys = system();
        let actors: Vec<_> = (0..10).map(|_| spawn_noop(&sys)).collect();
        assert_eq!(sys.registry().running(), 10);
        let sys_clone = sys.clone();
        let waiter = thread::spawn(move || {
            sys_clone.registry().await_running_count_equal(0);
        });
        for actor in actors {
            actor.cleanup(crate::actor::exit_reason::ExitReason::Normal, None);
        }
        waiter.join().unwrap();
        assert_eq!(sys.registry().running(), 0);
    }

    #[test]
    fn test_named_lookup() {
        let sys = system();
        let actor = spawn_noop(&sys);
        sys.registry().put_named("config_server", Some(actor.clone()));
        assert_eq!(sys.registry().get_named("config_server"), Some(actor));
        assert!(sys.registry().get_named("nobody").is_none());
        assert_eq!(sys.registry().named_actors().len(), 1);
        // null insert means erase
        sys.registry().put_named("config_server", None);
        assert!(sys.registry().get_named("config_server").is_none());
    }

    #[test]
    fn test_double_put_keeps_first_entry() {
        let sys = system();
        let a = spawn_noop(&sys);
        let b = spawn_noop(&sys);
        sys.registry().put(a.id(), b.clone());
        // a's registration happened at spawn; the later put must not win
        assert_eq!(sys.registry().get(a.id()), Some(a));
    }
}
