//! The actor system: explicit owner of all process-wide state.
//!
//! The original design reached registry, group manager, and logger through
//! singletons; here they are fields of an [`ActorSystem`] value that every
//! actor core holds a cheap clone of. Initialization order matters: the
//! node id is derived first, then the registry, then the group manager,
//! which registers its built-in local module once the system cell exists.

// Layer 1: Standard library imports
use std::fmt;
use std::sync::{Arc, Weak};

// Layer 2: Third-party crate imports
use tracing::debug;

// Layer 3: Internal module imports
use super::config::SystemConfig;
use super::errors::SystemError;
use crate::actor::attachable::Attachable;
use crate::actor::core::flags;
use crate::actor::event::{Behavior, EventActor, SpawnOptions};
use crate::actor::handle::ActorRef;
use crate::group::manager::GroupManager;
use crate::registry::ActorRegistry;
use crate::util::ids::ActorId;
use crate::util::node_id::NodeId;

pub(crate) struct SystemState {
    node: NodeId,
    config: SystemConfig,
    registry: ActorRegistry,
    groups: GroupManager,
}

/// Handle to one actor system instance.
///
/// Cheap to clone; all clones share the same state. Multiple systems can
/// coexist in one process, each with a distinct node id.
///
/// # Example
///
/// ```rust
/// use tessera_core::system::{ActorSystem, SystemConfig};
///
/// let system = ActorSystem::new(SystemConfig::default()).unwrap();
/// assert!(system.node().is_valid());
/// assert_eq!(system.registry().running(), 0);
/// ```
#[derive(Clone)]
pub struct ActorSystem {
    state: Arc<SystemState>,
}

impl ActorSystem {
    /// Create a new actor system.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError::ConfigError`] when `config` fails
    /// validation.
    pub fn new(config: SystemConfig) -> Result<Self, SystemError> {
        config.validate().map_err(SystemError::ConfigError)?;
        let state = Arc::new_cyclic(|weak: &Weak<SystemState>| SystemState {
            node: NodeId::local(),
            config,
            registry: ActorRegistry::new(),
            groups: GroupManager::new(weak.clone()),
        });
        state.groups.init();
        let system = Self { state };
        debug!(node = %system.node(), label = %system.config().label, "actor system up");
        Ok(system)
    }

    pub(crate) fn from_state(state: Arc<SystemState>) -> Self {
        Self { state }
    }

    /// This system's node id.
    pub fn node(&self) -> NodeId {
        self.state.node
    }

    /// The system configuration.
    pub fn config(&self) -> &SystemConfig {
        &self.state.config
    }

    /// The actor registry.
    pub fn registry(&self) -> &ActorRegistry {
        &self.state.registry
    }

    /// The group manager.
    pub fn groups(&self) -> &GroupManager {
        &self.state.groups
    }

    /// Allocate the next actor id.
    pub fn next_actor_id(&self) -> ActorId {
        self.state.registry.next_actor_id()
    }

    /// Spawn a visible event-based actor with the given behavior.
    pub fn spawn(&self, behavior: Behavior) -> ActorRef {
        EventActor::spawn(self, SpawnOptions::default(), behavior)
    }

    /// Spawn a hidden event-based actor; hidden actors are not counted in
    /// the live-actor counter.
    pub fn spawn_hidden(&self, behavior: Behavior) -> ActorRef {
        EventActor::spawn(self, SpawnOptions::hidden(), behavior)
    }

    /// Spawn with explicit options.
    pub fn spawn_with(&self, options: SpawnOptions, behavior: Behavior) -> ActorRef {
        EventActor::spawn(self, options, behavior)
    }

    /// Publish `handle` in the registry and count it while alive.
    ///
    /// The handle is also attached with a functor that erases the registry
    /// entry when the actor dies, so lookups never return dead actors.
    pub(crate) fn register_actor(&self, handle: &ActorRef) {
        let core = handle.core();
        core.setf(flags::REGISTERED);
        if !core.getf(flags::HIDDEN) {
            self.state.registry.inc_running();
        }
        self.state.registry.put(core.id(), handle.clone());
        let weak = Arc::downgrade(&self.state);
        let id = core.id();
        handle.attach(Attachable::functor(move |_| {
            if let Some(state) = weak.upgrade() {
                state.registry.erase(id);
            }
        }));
    }

    /// Block until every non-hidden actor has terminated.
    pub fn await_all_actors_done(&self) {
        self.state.registry.await_running_count_equal(0);
    }

    /// Shut down: stop all groups, then wait for the remaining visible
    /// actors to terminate.
    pub fn shutdown(&self) {
        debug!(node = %self.node(), "actor system shutting down");
        self.state.groups.stop();
        self.await_all_actors_done();
    }
}

impl fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorSystem")
            .field("node", &self.state.node)
            .field("label", &self.state.config.label)
            .field("running", &self.state.registry.running())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::actor::exit_reason::ExitReason;

    #[test]
    fn test_system_creation() {
        let system = ActorSystem::new(SystemConfig::default()).unwrap();
        assert!(system.node().is_valid());
        assert_eq!(system.registry().running(), 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SystemConfig {
            label: String::new(),
            max_throughput: 0,
        };
        assert!(ActorSystem::new(config).is_err());
    }

    #[test]
    fn test_distinct_systems_have_distinct_nodes() {
        let a = ActorSystem::new(SystemConfig::default()).unwrap();
        let b = ActorSystem::new(SystemConfig::default()).unwrap();
        assert_ne!(a.node(), b.node());
    }

    #[test]
    fn test_spawn_registers_and_counts() {
        let system = ActorSystem::new(SystemConfig::default()).unwrap();
        let actor = system.spawn(Box::new(|_, _| None));
        assert_eq!(system.registry().running(), 1);
        assert!(system.registry().get(actor.id()).is_some());
        actor.cleanup(ExitReason::Normal, None);
        assert_eq!(system.registry().running(), 0);
        assert!(system.registry().get(actor.id()).is_none());
    }

    #[test]
    fn test_hidden_spawn_is_not_counted() {
        let system = ActorSystem::new(SystemConfig::default()).unwrap();
        let hidden = system.spawn_hidden(Box::new(|_, _| None));
        assert_eq!(system.registry().running(), 0);
        // still addressable by id
        assert!(system.registry().get(hidden.id()).is_some());
    }

    #[test]
    fn test_shutdown_with_no_actors_returns() {
        let system = ActorSystem::new(SystemConfig::default()).unwrap();
        system.shutdown();
    }
}
